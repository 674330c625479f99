use near_sdk::json_types::{Base58CryptoHash, U128, U64};
use near_sdk::{borsh, env, near, AccountId, CryptoHash, NearToken, Timestamp};

use crate::commitment::Commitment;
use crate::timelocks::TimelockSchedule;

// Unique identifier for a swap. SHA-256 of the Borsh-encoded economic terms.
pub type SwapId = CryptoHash;

// Numeric chain identifier a secret was observed on.
pub type ChainId = u64;

/// Economic terms of a trade as produced by the order signer.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug)]
pub struct SwapOrder {
    pub nonce: U64,
    pub maker: AccountId, // Locks funds on this chain
    pub taker: AccountId, // Fills the order, claims with the secret
    pub amount: U128,
    pub safety_deposit: U128,
    pub counterparty_amount: U128,
    pub counterparty_asset: Base58CryptoHash,
}

impl SwapOrder {
    /// Serializes the order into the canonical bytes the swap id is derived from.
    pub fn to_message_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_else(|_| env::panic_str("Order serialization failed"))
    }

    pub fn swap_id(&self) -> SwapId {
        env::sha256_array(&self.to_message_bytes())
    }

    pub fn amount(&self) -> NearToken {
        NearToken::from_yoctonear(self.amount.0)
    }

    pub fn safety_deposit(&self) -> NearToken {
        NearToken::from_yoctonear(self.safety_deposit.0)
    }

    /// Amount plus safety deposit the escrow must hold.
    pub fn required_funding(&self) -> NearToken {
        self.amount().saturating_add(self.safety_deposit())
    }
}

/// Per-swap bookkeeping the relayer drives forward.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapRecord {
    pub active: bool, // Cleared by `deactivate`, the record itself is kept
    pub hashlock: Commitment,

    // Counterparty leg, known only through the relayer
    pub counterparty_amount: U128,
    pub counterparty_asset: CryptoHash,
    pub counterparty_tx_ref: Option<CryptoHash>,
    pub counterparty_object_ref: Option<u64>,

    pub schedule: TimelockSchedule,
    pub created_at: Timestamp,
    pub revealed_on: Option<ChainId>,
}

impl SwapRecord {
    pub fn new(
        hashlock: Commitment,
        order: &SwapOrder,
        schedule: TimelockSchedule,
        created_at: Timestamp,
    ) -> Self {
        Self {
            active: true,
            hashlock,
            counterparty_amount: order.counterparty_amount,
            counterparty_asset: order.counterparty_asset.into(),
            counterparty_tx_ref: None,
            counterparty_object_ref: None,
            schedule,
            created_at,
            revealed_on: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use near_sdk::test_utils::accounts;

    fn order(nonce: u64) -> SwapOrder {
        SwapOrder {
            nonce: U64(nonce),
            maker: accounts(0),
            taker: accounts(1),
            amount: U128(100),
            safety_deposit: U128(10),
            counterparty_amount: U128(5_000),
            counterparty_asset: [9u8; 32].into(),
        }
    }

    #[test]
    fn swap_id_is_deterministic() {
        assert_eq!(order(1).swap_id(), order(1).swap_id());
    }

    #[test]
    fn swap_id_changes_with_nonce() {
        assert_ne!(order(1).swap_id(), order(2).swap_id());
    }

    #[test]
    fn required_funding_includes_safety_deposit() {
        assert_eq!(order(1).required_funding(), NearToken::from_yoctonear(110));
    }
}
