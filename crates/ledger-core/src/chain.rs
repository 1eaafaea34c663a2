use crate::error::{LedgerError, Result};
use crate::pow::ProofOfWork;
use crate::{Block, Transaction};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// A transaction submission as it arrives from a client; any field may be absent.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<u64>,
}

impl TransactionRequest {
    pub fn into_transaction(self) -> Result<Transaction> {
        let sender = self.sender.ok_or(LedgerError::MissingField("sender"))?;
        let recipient = self.recipient.ok_or(LedgerError::MissingField("recipient"))?;
        let amount = self.amount.ok_or(LedgerError::MissingField("amount"))?;
        Ok(Transaction::new(sender, recipient, amount))
    }
}

/// The node's chain, its pool of pending transactions and its known peers.
///
/// Not internally synchronized: callers that share a ledger across tasks
/// must serialize mutations themselves.
#[derive(Clone, Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
    peers: BTreeSet<String>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// A ledger holding only the genesis block.
    pub fn new() -> Self {
        Self {
            chain: vec![Block::genesis()],
            pending: Vec::new(),
            peers: BTreeSet::new(),
        }
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    pub fn last_block(&self) -> Result<&Block> {
        self.chain.last().ok_or(LedgerError::EmptyChain)
    }

    /// Seal the pending pool into the next block and append it.
    /// `previous_hash` defaults to the digest of the current last block.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> Result<&Block> {
        let previous_hash = match previous_hash {
            Some(hash) => hash,
            None => self.last_block()?.hash(),
        };
        let index = self.chain.len() as u64 + 1;
        let transactions = std::mem::take(&mut self.pending);
        let block = Block::new(index, transactions, proof, previous_hash);
        info!(
            index,
            proof,
            txs = block.transactions.len(),
            "new block appended"
        );
        self.chain.push(block);
        self.last_block()
    }

    /// Queue a transaction. Returns the index of the block expected to hold
    /// it; a chain replacement before the next mine can make this stale.
    pub fn new_transaction(
        &mut self,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        amount: u64,
    ) -> Result<u64> {
        self.submit(Transaction::new(sender, recipient, amount))
    }

    pub fn submit(&mut self, tx: Transaction) -> Result<u64> {
        let next = self.last_block()?.index + 1;
        debug!(sender = %tx.sender, recipient = %tx.recipient, amount = tx.amount, next, "transaction queued");
        self.pending.push(tx);
        Ok(next)
    }

    /// Add a peer by its `host:port`. Returns false if it was already known.
    pub fn register_node(&mut self, address: &str) -> Result<bool> {
        let peer = parse_peer_address(address)?;
        let added = self.peers.insert(peer.clone());
        if added {
            info!(%peer, "peer registered");
        }
        Ok(added)
    }

    /// Register a whole list. Nothing is added unless every address parses.
    pub fn register_nodes<S: AsRef<str>>(&mut self, nodes: Option<&[S]>) -> Result<usize> {
        let nodes = nodes.ok_or(LedgerError::MalformedPeerList)?;
        let parsed = nodes
            .iter()
            .map(|n| parse_peer_address(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let mut added = 0;
        for peer in parsed {
            if self.peers.insert(peer.clone()) {
                info!(%peer, "peer registered");
                added += 1;
            }
        }
        Ok(added)
    }

    /// Reward this node and seal a block on top of the current tip.
    pub fn forge(&mut self, proof: u64, miner: &str) -> Result<Block> {
        self.submit(Transaction::reward(miner))?;
        self.new_block(proof, None).cloned()
    }

    /// Search for the next proof and forge the block, all on this thread.
    pub fn mine(&mut self, pow: &ProofOfWork, miner: &str) -> Result<Block> {
        let last_proof = self.last_block()?.proof;
        let proof = pow.find_proof(last_proof);
        self.forge(proof, miner)
    }

    /// Wholesale replacement used by consensus. Pending transactions stay queued.
    pub(crate) fn replace_chain(&mut self, chain: Vec<Block>) -> Result<()> {
        if chain.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        info!(old = self.chain.len(), new = chain.len(), "chain replaced");
        self.chain = chain;
        Ok(())
    }
}

/// Reduce a peer address to its network location, `host:port`.
///
/// Accepts `http://host[:port][/path]` or a bare `host:port`. Peers are
/// fetched over plain HTTP, so any other scheme is rejected. Hosts are
/// lowercased and a missing port defaults to 80, so equivalent spellings of
/// one peer map to the same entry.
pub fn parse_peer_address(address: &str) -> Result<String> {
    let invalid = || LedgerError::InvalidPeerAddress(address.to_string());
    let trimmed = address.trim();

    let (has_scheme, rest) = match trimmed.split_once("://") {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("http") => (true, rest),
        Some(_) => return Err(invalid()),
        None => (false, trimmed),
    };
    let authority = rest
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host_port = match authority.rsplit_once('@') {
        Some((_userinfo, host_port)) => host_port,
        None => authority,
    };

    let (host, port) = if let Some(v6) = host_port.strip_prefix('[') {
        let (host, tail) = v6.split_once(']').ok_or_else(invalid)?;
        let port = match tail {
            "" => None,
            t => Some(t.strip_prefix(':').ok_or_else(invalid)?),
        };
        (format!("[{}]", host.to_ascii_lowercase()), port)
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host.to_ascii_lowercase(), Some(port)),
            None => (host_port.to_ascii_lowercase(), None),
        }
    };
    if host.is_empty() || host == "[]" || (!host.starts_with('[') && host.contains(':')) {
        return Err(invalid());
    }

    let port: u16 = match port {
        Some(p) => p.parse().map_err(|_| invalid())?,
        None if has_scheme => 80,
        None => return Err(invalid()),
    };
    Ok(format!("{host}:{port}"))
}
