use crate::error::{LedgerError, Result};
use crate::pow::ProofOfWork;
use crate::Block;
use thiserror::Error;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValidationPolicy {
    /// Only `previous_hash` linkage is checked.
    LinkageOnly,
    /// Linkage, plus each block's proof must solve the puzzle against its
    /// predecessor's proof.
    #[default]
    LinkageAndProof,
}

/// The first thing wrong with a candidate chain.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("block {index}: previous_hash does not match digest of its predecessor")]
    BrokenLink { index: u64 },

    #[error("block {index}: proof {proof} does not solve puzzle for last proof {last_proof}")]
    InvalidProof {
        index: u64,
        last_proof: u64,
        proof: u64,
    },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ChainValidator {
    policy: ValidationPolicy,
    pow: ProofOfWork,
}

impl ChainValidator {
    pub fn new(policy: ValidationPolicy, pow: ProofOfWork) -> Self {
        Self { policy, pow }
    }

    pub fn linkage_only() -> Self {
        Self::new(ValidationPolicy::LinkageOnly, ProofOfWork::default())
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    pub fn is_valid(&self, chain: &[Block]) -> Result<bool> {
        Ok(self.first_violation(chain)?.is_none())
    }

    /// Single pass from the first block forward; stops at the first problem.
    /// An empty chain is a caller error, not a verdict.
    pub fn first_violation(&self, chain: &[Block]) -> Result<Option<Violation>> {
        if chain.is_empty() {
            return Err(LedgerError::EmptyChain);
        }
        for pair in chain.windows(2) {
            let (last, block) = (&pair[0], &pair[1]);
            if block.previous_hash != last.hash() {
                debug!(index = block.index, "broken hash link");
                return Ok(Some(Violation::BrokenLink { index: block.index }));
            }
            if self.policy == ValidationPolicy::LinkageAndProof
                && !self.pow.valid_proof(last.proof, block.proof)
            {
                debug!(index = block.index, "invalid proof");
                return Ok(Some(Violation::InvalidProof {
                    index: block.index,
                    last_proof: last.proof,
                    proof: block.proof,
                }));
            }
        }
        Ok(None)
    }
}
