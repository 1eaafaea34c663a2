use clap::Parser;
use ledger_core::{constants::POW_TARGET_DIFFICULTY, ChainValidator, ProofOfWork, ValidationPolicy};
use std::{net::SocketAddr, time::Duration};
use uuid::Uuid;

#[derive(Parser, Debug, Clone)]
#[command(name = "ledger-node")]
#[command(about = "Proof-of-work ledger node with longest-chain consensus")]
pub struct Args {
    /// Address to listen on, e.g. 127.0.0.1:5000
    #[arg(long, env = "LEDGER_LISTEN", default_value = "127.0.0.1:5000")]
    pub listen: SocketAddr,

    /// Identity credited with mining rewards. Random when omitted.
    #[arg(long, env = "LEDGER_NODE_ID")]
    pub node_id: Option<String>,

    /// Leading zero hex digits a proof must produce
    #[arg(long, env = "LEDGER_DIFFICULTY", default_value_t = POW_TARGET_DIFFICULTY)]
    pub difficulty: usize,

    /// Peer to register at startup (repeatable, or comma separated)
    #[arg(long = "peer", env = "LEDGER_PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Per-request timeout when fetching a peer's chain
    #[arg(long, env = "LEDGER_FETCH_TIMEOUT_SECS", default_value_t = 5)]
    pub fetch_timeout_secs: u64,

    /// Accept peer chains on hash linkage alone, without re-checking proofs
    #[arg(long)]
    pub linkage_only: bool,
}

impl Args {
    pub fn node_id(&self) -> String {
        self.node_id.clone().unwrap_or_else(generate_node_id)
    }

    pub fn pow(&self) -> ProofOfWork {
        ProofOfWork::new(self.difficulty)
    }

    pub fn validator(&self) -> ChainValidator {
        let policy = if self.linkage_only {
            ValidationPolicy::LinkageOnly
        } else {
            ValidationPolicy::LinkageAndProof
        };
        ChainValidator::new(policy, self.pow())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// 32 hex chars, no dashes.
pub fn generate_node_id() -> String {
    Uuid::new_v4().simple().to_string()
}
