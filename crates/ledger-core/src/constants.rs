pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const POW_TARGET_DIFFICULTY: usize = 4;
pub const POW_BATCH_SIZE: u64 = 1 << 14;
pub const GENESIS_PROOF: u64 = 100;
pub const GENESIS_PREVIOUS_HASH: &str = "1";
pub const REWARD_SENDER: &str = "0";
pub const MINING_REWARD: u64 = 1;
