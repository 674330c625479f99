use near_sdk::{bs58, env, AccountId, CryptoHash};

// Helper for consistent logging
pub fn log_swap_event(event: &str, swap_id: &CryptoHash, actor: &AccountId) {
    env::log_str(&format!(
        "SWAP_{}: id='{}', actor='{}'",
        event,
        bs58::encode(swap_id).into_string(),
        actor
    ));
}

pub fn now_secs() -> u64 {
    env::block_timestamp() / crate::timelocks::NANOS_IN_SEC
}
