use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ledger_core::{collect_peer_chains, Block, LedgerError, PeerChain, Transaction, TransactionRequest};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("proof search failed: {0}")]
    Mining(#[from] tokio::task::JoinError),

    #[error("invalid request body: {}", .0.body_text())]
    Body(#[from] JsonRejection),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Ledger(
                LedgerError::MissingField(_)
                | LedgerError::MalformedPeerList
                | LedgerError::InvalidPeerAddress(_),
            )
            | ApiError::Body(_) => StatusCode::BAD_REQUEST,
            ApiError::Ledger(LedgerError::EmptyChain) | ApiError::Mining(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl From<Block> for MineResponse {
    fn from(block: Block) -> Self {
        Self {
            message: "New block forged".to_string(),
            index: block.index,
            timestamp: block.timestamp,
            transactions: block.transactions,
            proof: block.proof,
            previous_hash: block.previous_hash,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub message: String,
    pub index: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub total_nodes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_chain: Option<Vec<Block>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Vec<Block>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route("/healthz", get(|| async { Json(Health { status: "ok" }) }))
        .route("/mine", get(mine))
        .route("/transactions/new", post(new_transaction))
        .route("/chain", get(full_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(consensus))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Search off the request thread, then forge on top of the tip the proof was
/// found for. If consensus swapped the chain meanwhile, search again.
async fn mine(State(state): State<AppState>) -> Result<Json<MineResponse>, ApiError> {
    loop {
        let (last_proof, tip_hash) = {
            let ledger = state.ledger.lock().await;
            let last = ledger.last_block()?;
            (last.proof, last.hash())
        };

        let pow = state.pow;
        let proof = tokio::task::spawn_blocking(move || pow.find_proof_parallel(last_proof)).await?;

        let mut ledger = state.ledger.lock().await;
        if ledger.last_block()?.hash() != tip_hash {
            warn!("chain tip moved during proof search, searching again");
            continue;
        }
        let block = ledger.forge(proof, &state.node_id)?;
        info!(index = block.index, proof, "block forged");
        return Ok(Json(block.into()));
    }
}

async fn new_transaction(
    State(state): State<AppState>,
    body: Result<Json<TransactionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let Json(req) = body?;
    let tx = req.into_transaction()?;
    let index = state.ledger.lock().await.submit(tx)?;
    Ok((
        StatusCode::CREATED,
        Json(TransactionResponse {
            message: format!("Transaction will be added to block {index}"),
            index,
        }),
    ))
}

async fn full_chain(State(state): State<AppState>) -> Json<PeerChain> {
    let ledger = state.ledger.lock().await;
    Json(PeerChain::new(ledger.chain().to_vec()))
}

/// Body: `{"nodes": ["http://host:port", ...]}`.
async fn register_nodes(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let Json(values) = body?;
    let nodes = peer_list(&values)?;
    let mut ledger = state.ledger.lock().await;
    ledger.register_nodes(Some(nodes.as_slice()))?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "New nodes have been added".to_string(),
            total_nodes: ledger.peers().iter().cloned().collect(),
        }),
    ))
}

fn peer_list(values: &Value) -> Result<Vec<&str>, LedgerError> {
    values
        .get("nodes")
        .and_then(Value::as_array)
        .ok_or(LedgerError::MalformedPeerList)?
        .iter()
        .map(|n| n.as_str().ok_or(LedgerError::MalformedPeerList))
        .collect()
}

async fn consensus(State(state): State<AppState>) -> Json<ResolveResponse> {
    let peers: Vec<String> = state.ledger.lock().await.peers().iter().cloned().collect();
    let peer_chains = collect_peer_chains(&state.fetcher, &peers).await;

    let mut ledger = state.ledger.lock().await;
    let replaced = state.resolver.resolve(&mut ledger, peer_chains);
    let chain = ledger.chain().to_vec();
    Json(if replaced {
        ResolveResponse {
            message: "Our chain was replaced".to_string(),
            replaced,
            new_chain: Some(chain),
            chain: None,
        }
    } else {
        ResolveResponse {
            message: "Our chain is authoritative".to_string(),
            replaced,
            new_chain: None,
            chain: Some(chain),
        }
    })
}
