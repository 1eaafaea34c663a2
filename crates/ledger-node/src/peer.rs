use anyhow::{Context, Result};
use ledger_core::{PeerChain, PeerChainFetcher};
use reqwest::Client;
use std::time::Duration;

/// Fetches `GET http://{peer}/chain` from other nodes.
#[derive(Clone, Debug)]
pub struct HttpPeerFetcher {
    client: Client,
}

impl HttpPeerFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("building peer http client")?;
        Ok(Self { client })
    }
}

impl PeerChainFetcher for HttpPeerFetcher {
    async fn fetch_chain(&self, peer: &str) -> Result<PeerChain> {
        let url = format!("http://{peer}/chain");
        let chain = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()?
            .json::<PeerChain>()
            .await
            .with_context(|| format!("decoding chain from {peer}"))?;
        Ok(chain)
    }
}
