pub mod chain;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod pow;
pub mod validate;

pub use chain::{parse_peer_address, Ledger, TransactionRequest};
pub use consensus::{collect_peer_chains, ConsensusResolver, PeerChain, PeerChainFetcher};
pub use error::{LedgerError, Result};
pub use pow::ProofOfWork;
pub use validate::{ChainValidator, ValidationPolicy, Violation};

use constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF, MINING_REWARD, REWARD_SENDER};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: u64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    /// The coinbase-style transaction paying a miner for a new block.
    pub fn reward(recipient: impl Into<String>) -> Self {
        Self::new(REWARD_SENDER, recipient, MINING_REWARD)
    }

    pub fn is_reward(&self) -> bool {
        self.sender == REWARD_SENDER
    }

    fn to_value(&self) -> Value {
        json!({
            "sender": self.sender,
            "recipient": self.recipient,
            "amount": self.amount,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    pub fn new(
        index: u64,
        transactions: Vec<Transaction>,
        proof: u64,
        previous_hash: impl Into<String>,
    ) -> Self {
        Self {
            index,
            timestamp: unix_now(),
            transactions,
            proof,
            previous_hash: previous_hash.into(),
        }
    }

    /// First block of every chain: fixed proof, sentinel previous hash.
    pub fn genesis() -> Self {
        Self::new(1, vec![], GENESIS_PROOF, GENESIS_PREVIOUS_HASH)
    }

    pub fn hash(&self) -> String {
        digest(self)
    }

    fn to_value(&self) -> Value {
        let transactions: Vec<Value> = self.transactions.iter().map(Transaction::to_value).collect();
        json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": transactions,
            "proof": self.proof,
            "previous_hash": self.previous_hash,
        })
    }
}

/// SHA-256 of the block's canonical JSON, as lowercase hex.
pub fn digest(block: &Block) -> String {
    sha256_hex(canonical_json(&block.to_value()).as_bytes())
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compact JSON with object keys sorted at every depth, regardless of how
/// the map was built or which serde_json features are enabled.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_block() -> Block {
        Block {
            index: 2,
            timestamp: 1_600_000_100,
            transactions: vec![
                Transaction::new("alice", "bob", 10),
                Transaction::reward("node-a"),
            ],
            proof: 35293,
            previous_hash: "abc".to_string(),
        }
    }

    #[test]
    fn genesis_block_example() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, GENESIS_PROOF);
        assert_eq!(genesis.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(genesis.transactions.is_empty());
        assert!(genesis.timestamp > 0);
    }

    #[test]
    fn genesis_digest_example() {
        let mut genesis = Block::genesis();
        genesis.timestamp = 1_600_000_000; // Fix timestamp for test consistency
        assert_eq!(
            digest(&genesis),
            "507c50e63ff9bca555e9da4bb438d4d6fd0e2940189bd257e94bb5cedd9c272a"
        );
    }

    #[test]
    fn block_digest_example() {
        let block = fixed_block();
        assert_eq!(
            block.hash(),
            "273ea67d132880422b01ab1241dcaef71de2793c8bfa0bdcc578020dd39575f0"
        );
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let json = canonical_json(&fixed_block().to_value());
        let expected = r#"{"index":2,"previous_hash":"abc","proof":35293,"timestamp":1600000100,"transactions":[{"amount":10,"recipient":"bob","sender":"alice"},{"amount":1,"recipient":"node-a","sender":"0"}]}"#;
        assert_eq!(json, expected);
    }

    #[test]
    fn canonical_json_ignores_insertion_order() {
        let mut forward = serde_json::Map::new();
        forward.insert("b".into(), json!(1));
        forward.insert("a".into(), json!({"z": true, "y": null}));
        let mut backward = serde_json::Map::new();
        backward.insert("a".into(), json!({"y": null, "z": true}));
        backward.insert("b".into(), json!(1));
        assert_eq!(
            canonical_json(&Value::Object(forward)),
            canonical_json(&Value::Object(backward))
        );
    }

    #[test]
    fn digest_survives_reserialization() {
        let block = fixed_block();
        let json = serde_json::to_string(&block).unwrap();
        let reparsed: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(digest(&block), digest(&reparsed));

        // A peer may send fields in any order.
        let shuffled = r#"{"previous_hash":"abc","transactions":[{"amount":10,"sender":"alice","recipient":"bob"},{"recipient":"node-a","amount":1,"sender":"0"}],"proof":35293,"timestamp":1600000100,"index":2}"#;
        let from_peer: Block = serde_json::from_str(shuffled).unwrap();
        assert_eq!(digest(&block), digest(&from_peer));
    }

    #[test]
    fn digest_changes_with_every_field() {
        let base = fixed_block();
        let original = base.hash();

        let mut b = base.clone();
        b.index += 1;
        assert_ne!(b.hash(), original);

        let mut b = base.clone();
        b.timestamp += 1;
        assert_ne!(b.hash(), original);

        let mut b = base.clone();
        b.proof += 1;
        assert_ne!(b.hash(), original);

        let mut b = base.clone();
        b.previous_hash.push('0');
        assert_ne!(b.hash(), original);

        let mut b = base.clone();
        b.transactions[0].amount = 11;
        assert_ne!(b.hash(), original);

        let mut b = base.clone();
        b.transactions.swap(0, 1);
        assert_ne!(b.hash(), original);
    }

    #[test]
    fn digest_is_hex_of_fixed_length() {
        let hash = Block::genesis().hash();
        assert_eq!(hash.len(), constants::HASH_HEX_SIZE);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn reward_transaction_example() {
        let tx = Transaction::reward("node-a");
        assert_eq!(tx.sender, "0");
        assert_eq!(tx.recipient, "node-a");
        assert_eq!(tx.amount, 1);
        assert!(tx.is_reward());
        assert!(!Transaction::new("alice", "bob", 1).is_reward());
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::new("Alice", "Bob", 10);
        let json = serde_json::to_string(&tx).unwrap();
        let expected_json = r#"{"sender":"Alice","recipient":"Bob","amount":10}"#;
        assert_eq!(json, expected_json);
        let deserialized: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, deserialized);
    }

    #[test]
    fn sha256_hex_example() {
        assert_eq!(
            sha256_hex(b"10035293"),
            "0000c415de5ceea33c02daa85a1c218ecca1b1c9e9864ed34d183597844de8e2"
        );
    }
}
