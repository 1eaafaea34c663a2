use crate::constants::{HASH_HEX_SIZE, POW_BATCH_SIZE, POW_TARGET_DIFFICULTY};
use crate::sha256_hex;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// How often the cancellable search looks at its stop flag.
const STOP_CHECK_INTERVAL: u64 = 1024;

/// The puzzle: `sha256(format!("{last_proof}{proof}"))` must start with
/// `difficulty` zero hex digits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: usize,
}

impl Default for ProofOfWork {
    fn default() -> Self {
        Self::new(POW_TARGET_DIFFICULTY)
    }
}

impl ProofOfWork {
    /// Difficulty is clamped to the digest width.
    pub fn new(difficulty: usize) -> Self {
        Self {
            difficulty: difficulty.min(HASH_HEX_SIZE),
        }
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn valid_proof(&self, last_proof: u64, proof: u64) -> bool {
        let guess = format!("{last_proof}{proof}");
        count_leading_zero_digits(&sha256_hex(guess.as_bytes())) >= self.difficulty
    }

    /// Brute-force search upward from 0. Blocks until a proof is found.
    pub fn find_proof(&self, last_proof: u64) -> u64 {
        let mut proof = 0u64;
        while !self.valid_proof(last_proof, proof) {
            proof = proof.wrapping_add(1);
        }
        debug!(last_proof, proof, "proof found");
        proof
    }

    /// Same answer as `find_proof`, searched in parallel one batch at a time.
    /// `find_first` keeps the lowest hit inside a batch, and batches are
    /// scanned in ascending order.
    pub fn find_proof_parallel(&self, last_proof: u64) -> u64 {
        let mut start = 0u64;
        loop {
            let end = start.saturating_add(POW_BATCH_SIZE);
            let found = (start..end)
                .into_par_iter()
                .find_first(|proof| self.valid_proof(last_proof, *proof));
            if let Some(proof) = found {
                debug!(last_proof, proof, "proof found (parallel)");
                return proof;
            }
            start = if end == u64::MAX { 0 } else { end };
        }
    }

    /// Cancellable search. Returns `None` once `stop` is observed set.
    pub fn find_proof_until(&self, last_proof: u64, stop: &AtomicBool) -> Option<u64> {
        let mut proof = 0u64;
        loop {
            if proof % STOP_CHECK_INTERVAL == 0 && stop.load(Ordering::Relaxed) {
                debug!(last_proof, tried = proof, "proof search cancelled");
                return None;
            }
            if self.valid_proof(last_proof, proof) {
                return Some(proof);
            }
            proof = proof.wrapping_add(1);
        }
    }
}

pub fn count_leading_zero_digits(hex: &str) -> usize {
    hex.bytes().take_while(|b| *b == b'0').count()
}
