#![allow(dead_code)]

use ledger_core::{ChainValidator, ConsensusResolver, Ledger, ProofOfWork, ValidationPolicy};
use ledger_node::{api, peer::HttpPeerFetcher, AppState};
use std::time::Duration;
use tokio::net::TcpListener;

/// Low difficulty keeps mining in tests to a few hundred hashes.
pub const TEST_DIFFICULTY: usize = 2;

pub fn test_state(node_id: &str) -> AppState {
    test_state_with(node_id, ValidationPolicy::LinkageAndProof)
}

pub fn test_state_with(node_id: &str, policy: ValidationPolicy) -> AppState {
    let pow = ProofOfWork::new(TEST_DIFFICULTY);
    AppState::new(
        Ledger::new(),
        node_id,
        pow,
        ConsensusResolver::new(ChainValidator::new(policy, pow)),
        HttpPeerFetcher::new(Duration::from_secs(2)).expect("Failed to build http client"),
    )
}

/// Mine on the node's ledger directly until it holds `len` blocks.
pub async fn grow_to(state: &AppState, len: usize) {
    let mut ledger = state.ledger.lock().await;
    while ledger.len() < len {
        ledger.mine(&state.pow, &state.node_id).expect("Failed to mine");
    }
}

/// Serve a node on an ephemeral port; returns its `http://host:port`.
pub async fn spawn_node(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, api::router(state))
            .await
            .expect("server error");
    });
    format!("http://{addr}")
}
