//! HTTP transport around `ledger-core`: routes, peer fetching, configuration.
pub mod api;
pub mod config;
pub mod peer;

use anyhow::Result;
use config::Args;
use ledger_core::{ConsensusResolver, Ledger, ProofOfWork};
use peer::HttpPeerFetcher;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared node state. The mutex is the single writer lock every mutating
/// route goes through.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Mutex<Ledger>>,
    pub node_id: Arc<str>,
    pub pow: ProofOfWork,
    pub resolver: ConsensusResolver,
    pub fetcher: HttpPeerFetcher,
}

impl AppState {
    pub fn new(
        ledger: Ledger,
        node_id: impl Into<Arc<str>>,
        pow: ProofOfWork,
        resolver: ConsensusResolver,
        fetcher: HttpPeerFetcher,
    ) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
            node_id: node_id.into(),
            pow,
            resolver,
            fetcher,
        }
    }

    /// Build a node from its command line, registering any startup peers.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut ledger = Ledger::new();
        ledger.register_nodes(Some(args.peers.as_slice()))?;
        Ok(Self::new(
            ledger,
            args.node_id(),
            args.pow(),
            ConsensusResolver::new(args.validator()),
            HttpPeerFetcher::new(args.fetch_timeout())?,
        ))
    }
}
