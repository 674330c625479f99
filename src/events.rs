use near_sdk::json_types::{Base58CryptoHash, U128, U64};
use near_sdk::{near, AccountId};

/// Relayer notifications, logged as NEP-297 `EVENT_JSON` lines.
#[near(event_json(standard = "htlc_swap"))]
pub enum SwapEvent {
    /// A swap is locked on this chain; the relayer starts watching the counterparty leg.
    #[event_version("1.0.0")]
    SwapInitiated {
        swap_id: Base58CryptoHash,
        hashlock: Base58CryptoHash,
        maker: AccountId,
        taker: AccountId,
        amount: U128,
        safety_deposit: U128,
        counterparty_amount: U128,
        counterparty_asset: Base58CryptoHash,
    },
    /// A verified secret is public; the relayer replays it on the other leg.
    #[event_version("1.0.0")]
    SecretRevealed {
        swap_id: Base58CryptoHash,
        secret: Base58CryptoHash,
        reveal_chain_id: U64,
    },
}
