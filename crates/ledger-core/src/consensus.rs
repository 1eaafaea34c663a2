use crate::chain::Ledger;
use crate::validate::ChainValidator;
use crate::Block;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{debug, info, warn};

/// A peer's answer to get-chain: the full chain and the length it reports.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerChain {
    pub chain: Vec<Block>,
    pub length: usize,
}

impl PeerChain {
    pub fn new(chain: Vec<Block>) -> Self {
        let length = chain.len();
        Self { chain, length }
    }
}

/// Transport seam: how the node obtains a peer's chain. Retries and
/// timeouts are the implementor's business.
pub trait PeerChainFetcher {
    fn fetch_chain(&self, peer: &str) -> impl Future<Output = anyhow::Result<PeerChain>> + Send;
}

/// Ask every peer for its chain. A peer that fails contributes nothing.
pub async fn collect_peer_chains<F, I, S>(fetcher: &F, peers: I) -> BTreeMap<String, PeerChain>
where
    F: PeerChainFetcher,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = BTreeMap::new();
    for peer in peers {
        let peer = peer.as_ref();
        match fetcher.fetch_chain(peer).await {
            Ok(chain) => {
                debug!(%peer, length = chain.length, "fetched peer chain");
                out.insert(peer.to_string(), chain);
            }
            Err(e) => warn!(%peer, error = %e, "failed to fetch peer chain"),
        }
    }
    out
}

/// Longest-valid-chain rule.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsensusResolver {
    validator: ChainValidator,
}

impl ConsensusResolver {
    pub fn new(validator: ChainValidator) -> Self {
        Self { validator }
    }

    pub fn validator(&self) -> &ChainValidator {
        &self.validator
    }

    /// Scan every peer chain, then adopt the longest valid one that is
    /// strictly longer than ours. Returns whether the local chain was replaced.
    pub fn resolve(&self, ledger: &mut Ledger, mut peer_chains: BTreeMap<String, PeerChain>) -> bool {
        let Some(peer) = self.select(ledger.len(), &peer_chains) else {
            debug!(local = ledger.len(), peers = peer_chains.len(), "our chain is authoritative");
            return false;
        };
        let Some(winner) = peer_chains.remove(&peer) else {
            return false;
        };
        info!(%peer, length = winner.length, "adopting longer peer chain");
        ledger.replace_chain(winner.chain).is_ok()
    }

    /// The peer whose chain would win, without touching the ledger.
    pub fn select(&self, local_len: usize, peer_chains: &BTreeMap<String, PeerChain>) -> Option<String> {
        let mut max_length = local_len;
        let mut winner = None;
        for (peer, candidate) in peer_chains {
            if candidate.length <= max_length {
                continue;
            }
            if candidate.length != candidate.chain.len() {
                warn!(
                    %peer,
                    reported = candidate.length,
                    actual = candidate.chain.len(),
                    "peer chain length mismatch, skipping"
                );
                continue;
            }
            match self.validator.first_violation(&candidate.chain) {
                Ok(None) => {
                    max_length = candidate.length;
                    winner = Some(peer.clone());
                }
                Ok(Some(violation)) => warn!(%peer, %violation, "invalid peer chain, skipping"),
                Err(e) => warn!(%peer, error = %e, "unusable peer chain, skipping"),
            }
        }
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pow::ProofOfWork;
    use crate::validate::ValidationPolicy;
    use anyhow::anyhow;
    use std::collections::HashMap;

    fn pow() -> ProofOfWork {
        ProofOfWork::new(2)
    }

    fn resolver() -> ConsensusResolver {
        ConsensusResolver::new(ChainValidator::new(ValidationPolicy::LinkageAndProof, pow()))
    }

    fn ledger_of_len(len: usize, miner: &str) -> Ledger {
        let mut ledger = Ledger::new();
        while ledger.len() < len {
            ledger.mine(&pow(), miner).unwrap();
        }
        ledger
    }

    fn peer(len: usize, miner: &str) -> PeerChain {
        PeerChain::new(ledger_of_len(len, miner).chain().to_vec())
    }

    #[test]
    fn adopts_longest_valid_chain() {
        let mut local = ledger_of_len(3, "local");
        let five = peer(5, "peer-b");
        let peers = BTreeMap::from([
            ("peer-a:5000".to_string(), peer(2, "peer-a")),
            ("peer-b:5000".to_string(), five.clone()),
        ]);
        assert!(resolver().resolve(&mut local, peers));
        assert_eq!(local.len(), 5);
        assert_eq!(local.chain(), five.chain.as_slice());
    }

    #[test]
    fn keeps_local_chain_without_strictly_longer_peer() {
        let mut local = ledger_of_len(3, "local");
        let before = local.chain().to_vec();
        let peers = BTreeMap::from([
            ("peer-a:5000".to_string(), peer(3, "peer-a")),
            ("peer-b:5000".to_string(), peer(2, "peer-b")),
        ]);
        assert!(!resolver().resolve(&mut local, peers));
        assert_eq!(local.chain(), before.as_slice());
    }

    #[test]
    fn empty_peer_set_never_replaces() {
        let mut local = ledger_of_len(2, "local");
        assert!(!resolver().resolve(&mut local, BTreeMap::new()));
        assert_eq!(local.len(), 2);
    }

    #[test]
    fn skips_invalid_longer_chain() {
        let mut local = ledger_of_len(2, "local");
        let mut bad = peer(6, "peer-a");
        bad.chain[3].previous_hash = "deadbeef".into();
        let good = peer(4, "peer-b");
        let peers = BTreeMap::from([
            ("peer-a:5000".to_string(), bad),
            ("peer-b:5000".to_string(), good.clone()),
        ]);
        assert!(resolver().resolve(&mut local, peers));
        assert_eq!(local.chain(), good.chain.as_slice());
    }

    #[test]
    fn considers_every_peer_not_just_the_last() {
        let mut local = ledger_of_len(2, "local");
        let longest = peer(6, "peer-a");
        let peers = BTreeMap::from([
            ("peer-a:5000".to_string(), longest.clone()),
            ("peer-b:5000".to_string(), peer(3, "peer-b")),
            ("peer-c:5000".to_string(), peer(4, "peer-c")),
        ]);
        assert!(resolver().resolve(&mut local, peers));
        assert_eq!(local.len(), 6);
        assert_eq!(local.chain(), longest.chain.as_slice());
    }

    #[test]
    fn ignores_lying_length() {
        let mut local = ledger_of_len(3, "local");
        let mut liar = peer(2, "peer-a");
        liar.length = 10;
        let peers = BTreeMap::from([("peer-a:5000".to_string(), liar)]);
        assert!(!resolver().resolve(&mut local, peers));
        assert_eq!(local.len(), 3);
    }

    #[test]
    fn empty_peer_chain_is_skipped() {
        let mut local = ledger_of_len(1, "local");
        let empty = PeerChain {
            chain: vec![],
            length: 0,
        };
        let peers = BTreeMap::from([("peer-a:5000".to_string(), empty)]);
        assert!(!resolver().resolve(&mut local, peers));
    }

    #[test]
    fn unmined_chain_only_passes_linkage_only_policy() {
        let mut fake = Ledger::new();
        fake.new_block(1, None).unwrap();
        fake.new_block(2, None).unwrap();
        let peers = BTreeMap::from([("peer-a:5000".to_string(), PeerChain::new(fake.chain().to_vec()))]);

        let mut local = Ledger::new();
        assert!(!resolver().resolve(&mut local, peers.clone()));
        let lenient = ConsensusResolver::new(ChainValidator::linkage_only());
        assert!(lenient.resolve(&mut local, peers));
        assert_eq!(local.len(), 3);
    }

    struct MapFetcher(HashMap<String, PeerChain>);

    impl PeerChainFetcher for MapFetcher {
        async fn fetch_chain(&self, peer: &str) -> anyhow::Result<PeerChain> {
            self.0
                .get(peer)
                .cloned()
                .ok_or_else(|| anyhow!("connection refused: {peer}"))
        }
    }

    #[tokio::test]
    async fn collect_skips_unreachable_peers() {
        let fetcher = MapFetcher(HashMap::from([
            ("a:1".to_string(), peer(2, "a")),
            ("b:2".to_string(), peer(3, "b")),
        ]));
        let peers = vec!["a:1", "b:2", "down:3"];
        let chains = collect_peer_chains(&fetcher, peers).await;
        assert_eq!(chains.len(), 2);
        assert_eq!(chains["b:2"].length, 3);
        assert!(!chains.contains_key("down:3"));

        let mut local = Ledger::new();
        assert!(resolver().resolve(&mut local, chains));
        assert_eq!(local.len(), 3);
    }
}
