use near_sdk::json_types::{Base58CryptoHash, U64};
use near_sdk::{bs58, env, ext_contract, near, AccountId, NearToken, Promise, PromiseResult};

mod commitment;
mod error;
mod escrow;
mod events;
mod lifecycle;
mod store;
mod swap;
mod timelocks;
mod utils;

pub use commitment::{commit, verify, Commitment, Secret};
pub use error::SwapError;
pub use escrow::{Escrow, EscrowLedger, EscrowVault, LockTerms, Payout, SettlementStatus};
pub use events::SwapEvent;
pub use lifecycle::SwapController;
pub use store::SwapStore;
pub use swap::{ChainId, SwapId, SwapOrder, SwapRecord};
pub use timelocks::{derive_deadline, PackedTimelocks, Stage, TimelockError, TimelockSchedule};

use utils::{log_swap_event, now_secs};

#[ext_contract(ext_self)]
pub trait SelfCallbacks {
    fn on_escrow_settled(&mut self, swap_id: SwapId, payouts: Vec<Payout>);
}

// Define the contract structure
#[near(contract_state)]
pub struct Contract {
    pub owner_id: AccountId,
    // Trusted identity of the off-chain relayer
    pub relayer_id: AccountId,
    // Swap bookkeeping, keyed by swap id; deactivated records stay as tombstones
    swaps: SwapStore,
    // Funds locked for the local leg, keyed by the same swap id
    vault: EscrowVault,
}

// Define the default, which automatically initializes the contract
impl Default for Contract {
    fn default() -> Self {
        Self {
            owner_id: env::predecessor_account_id(),
            relayer_id: env::predecessor_account_id(),
            swaps: SwapStore::new(b"s"),
            vault: EscrowVault::new(b"v"),
        }
    }
}

// Implement the contract structure
#[near]
impl Contract {
    #[init]
    pub fn new(owner_id: AccountId, relayer_id: AccountId) -> Self {
        Self {
            owner_id,
            relayer_id,
            swaps: SwapStore::new(b"s"),
            vault: EscrowVault::new(b"v"),
        }
    }

    /// Rotates the relayer identity. Owner only.
    #[handle_result]
    pub fn set_relayer(&mut self, relayer_id: AccountId) -> Result<(), SwapError> {
        if env::predecessor_account_id() != self.owner_id {
            return Err(SwapError::Unauthorized);
        }
        self.relayer_id = relayer_id;
        env::log_str(&format!("SWAP_RELAYER_SET: relayer='{}'", self.relayer_id));
        Ok(())
    }

    /// Opens a swap: the maker attaches `amount + safety_deposit` native NEAR,
    /// which is locked under `hashlock` and the schedule stamped with the current block time.
    ///
    /// Returns the swap id derived from the order.
    #[payable]
    #[handle_result]
    pub fn create_swap(
        &mut self,
        order: SwapOrder,
        hashlock: Base58CryptoHash,
        schedule: TimelockSchedule,
    ) -> Result<Base58CryptoHash, SwapError> {
        if env::predecessor_account_id() != order.maker {
            return Err(SwapError::Unauthorized);
        }
        let swap_id = order.swap_id();

        SwapController::new(&mut self.swaps, &mut self.vault).create(
            swap_id,
            hashlock.into(),
            &order,
            schedule,
            env::attached_deposit(),
        )?;

        log_swap_event("CREATED", &swap_id, &order.maker);
        Ok(swap_id.into())
    }

    /// Records where the counterparty escrow lives. Relayer only, safe to repeat.
    #[handle_result]
    pub fn update_reference(
        &mut self,
        swap_id: Base58CryptoHash,
        counterparty_object_ref: U64,
        counterparty_tx_ref: Base58CryptoHash,
    ) -> Result<(), SwapError> {
        self.assert_relayer()?;
        let swap_id: SwapId = swap_id.into();
        SwapController::new(&mut self.swaps, &mut self.vault).update_reference(
            &swap_id,
            counterparty_object_ref.0,
            counterparty_tx_ref.into(),
        )?;
        log_swap_event("REFERENCE_UPDATED", &swap_id, &env::predecessor_account_id());
        Ok(())
    }

    /// Announces a secret observed on `reveal_chain_id`. Open to anyone: the
    /// secret must hash to the stored hashlock.
    #[handle_result]
    pub fn record_secret_reveal(
        &mut self,
        swap_id: Base58CryptoHash,
        secret: Base58CryptoHash,
        reveal_chain_id: U64,
    ) -> Result<(), SwapError> {
        SwapController::new(&mut self.swaps, &mut self.vault).record_secret_reveal(
            &swap_id.into(),
            secret.into(),
            reveal_chain_id.0,
        )
    }

    /// Emergency tombstone. Relayer only; never moves funds.
    #[handle_result]
    pub fn deactivate(&mut self, swap_id: Base58CryptoHash) -> Result<(), SwapError> {
        self.assert_relayer()?;
        let swap_id: SwapId = swap_id.into();
        SwapController::new(&mut self.swaps, &mut self.vault).deactivate(&swap_id)?;
        log_swap_event("DEACTIVATED", &swap_id, &env::predecessor_account_id());
        Ok(())
    }

    /// Relayer only. Stale or unknown ids are skipped; returns the number of records updated.
    #[handle_result]
    pub fn batch_update_references(
        &mut self,
        swap_ids: Vec<Base58CryptoHash>,
        counterparty_object_refs: Vec<U64>,
        counterparty_tx_refs: Vec<Base58CryptoHash>,
    ) -> Result<u32, SwapError> {
        self.assert_relayer()?;
        let ids: Vec<SwapId> = swap_ids.into_iter().map(Into::into).collect();
        let object_refs: Vec<u64> = counterparty_object_refs.into_iter().map(|r| r.0).collect();
        let tx_refs: Vec<SwapId> = counterparty_tx_refs.into_iter().map(Into::into).collect();

        let updated = SwapController::new(&mut self.swaps, &mut self.vault)
            .batch_update_references(&ids, &object_refs, &tx_refs)?;
        env::log_str(&format!(
            "SWAP_BATCH_UPDATED: updated={}, submitted={}",
            updated,
            ids.len()
        ));
        Ok(updated)
    }

    /// Taker (or anyone, once public) reveals the secret to release the locked amount to the taker.
    #[handle_result]
    pub fn withdraw(
        &mut self,
        swap_id: Base58CryptoHash,
        secret: Base58CryptoHash,
    ) -> Result<Promise, SwapError> {
        let swap_id: SwapId = swap_id.into();
        let secret: Secret = secret.into();
        let escrow = self.vault.get(&swap_id).ok_or(SwapError::EscrowNotFound)?;
        if escrow.claimed {
            return Err(SwapError::EscrowAlreadySettled);
        }
        if !verify(&Commitment::from_hashlock(escrow.hashlock), &secret) {
            return Err(SwapError::SecretMismatch);
        }
        let caller = env::predecessor_account_id();
        escrow.check_withdrawal_window(now_secs(), caller != escrow.taker)?;

        let escrow = self.vault.mark_claimed(&swap_id)?;
        log_swap_event("CLAIMED", &swap_id, &caller);
        Self::settle(swap_id, escrow.payouts(escrow.taker.clone(), caller))
    }

    /// Returns the locked amount to the maker once the cancellation window opens.
    #[handle_result]
    pub fn cancel(&mut self, swap_id: Base58CryptoHash) -> Result<Promise, SwapError> {
        let swap_id: SwapId = swap_id.into();
        let escrow = self.vault.get(&swap_id).ok_or(SwapError::EscrowNotFound)?;
        if escrow.claimed {
            return Err(SwapError::EscrowAlreadySettled);
        }
        let caller = env::predecessor_account_id();
        escrow.check_cancellation_window(now_secs(), caller != escrow.taker)?;

        let escrow = self.vault.mark_claimed(&swap_id)?;
        log_swap_event("CANCELED", &swap_id, &caller);
        Self::settle(swap_id, escrow.payouts(escrow.maker.clone(), caller))
    }

    /// Re-sends the payouts an earlier settlement failed to deliver. Anyone may
    /// call it; recipients were fixed when the escrow was settled.
    #[handle_result]
    pub fn retry_settlement(&mut self, swap_id: Base58CryptoHash) -> Result<Promise, SwapError> {
        let swap_id: SwapId = swap_id.into();
        let owed = self.vault.take_owed(&swap_id)?;
        log_swap_event("SETTLEMENT_RETRIED", &swap_id, &env::predecessor_account_id());
        Self::settle(swap_id, owed)
    }

    // --- VIEWS ---

    pub fn get_record(&self, swap_id: Base58CryptoHash) -> Option<SwapRecord> {
        self.swaps.get(&swap_id.into()).cloned()
    }

    pub fn get_active_records(
        &self,
        from_index: Option<u32>,
        limit: Option<u32>,
    ) -> Vec<(Base58CryptoHash, SwapRecord)> {
        self.swaps
            .active(
                from_index.unwrap_or(0) as usize,
                limit.unwrap_or(50) as usize,
            )
            .into_iter()
            .map(|(id, record)| (id.into(), record))
            .collect()
    }

    /// Number of swaps ever created, deactivated ones included.
    pub fn get_swap_count(&self) -> u32 {
        self.swaps.count()
    }

    pub fn get_escrow(&self, swap_id: Base58CryptoHash) -> Option<Escrow> {
        self.vault.get(&swap_id.into()).cloned()
    }

    pub fn get_packed_timelocks(&self, swap_id: Base58CryptoHash) -> Option<PackedTimelocks> {
        self.vault.get(&swap_id.into()).map(|escrow| escrow.timelocks)
    }

    pub fn get_swap_id(&self, order: SwapOrder) -> Base58CryptoHash {
        order.swap_id().into()
    }

    pub fn get_owner(&self) -> AccountId {
        self.owner_id.clone()
    }

    pub fn get_relayer(&self) -> AccountId {
        self.relayer_id.clone()
    }

    // --- PRIVATE CALLBACKS ---

    /// `payouts[i]` was sent as promise `i` of the joined transfers.
    #[private]
    pub fn on_escrow_settled(&mut self, swap_id: SwapId, payouts: Vec<Payout>) {
        let results = env::promise_results_count();
        let mut paid = NearToken::from_yoctonear(0);
        let mut failed = Vec::new();
        for (index, payout) in (0..).zip(payouts) {
            let delivered = index < results
                && matches!(env::promise_result(index), PromiseResult::Successful(_));
            if delivered {
                paid = paid.saturating_add(payout.amount);
            } else {
                failed.push(payout);
            }
        }

        let id = bs58::encode(&swap_id).into_string();
        match self.vault.record_settlement(&swap_id, paid, failed) {
            Some(SettlementStatus::Settled) => {
                env::log_str(&format!("ESCROW_SETTLED: id='{}'", id));
            }
            Some(SettlementStatus::Reopened) => {
                env::log_str(&format!(
                    "ESCROW_SETTLEMENT_FAILED: Reverted claimed status for id='{}'",
                    id
                ));
            }
            Some(SettlementStatus::Owed) => {
                env::log_str(&format!(
                    "ESCROW_PAYOUT_OWED: id='{}', paid={}",
                    id,
                    paid.as_yoctonear()
                ));
            }
            None => {}
        }
    }
}

impl Contract {
    fn assert_relayer(&self) -> Result<(), SwapError> {
        if env::predecessor_account_id() != self.relayer_id {
            return Err(SwapError::Unauthorized);
        }
        Ok(())
    }

    /// Sends every payout as one joined promise and checks each result in `on_escrow_settled`.
    fn settle(swap_id: SwapId, payouts: Vec<Payout>) -> Result<Promise, SwapError> {
        let mut transfers = payouts
            .iter()
            .map(|payout| Promise::new(payout.recipient.clone()).transfer(payout.amount));
        let first = transfers.next().ok_or(SwapError::NoPaymentOwed)?;
        let joined = transfers.fold(first, Promise::and);
        let callback = ext_self::ext(env::current_account_id()).on_escrow_settled(swap_id, payouts);
        Ok(joined.then(callback))
    }
}
