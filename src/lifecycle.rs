use near_sdk::json_types::U64;
use near_sdk::{env, CryptoHash, NearToken};

use crate::commitment::{self, Commitment, Secret};
use crate::error::SwapError;
use crate::escrow::{EscrowLedger, LockTerms};
use crate::events::SwapEvent;
use crate::store::SwapStore;
use crate::swap::{ChainId, SwapId, SwapOrder, SwapRecord};
use crate::timelocks::{to_deployed_at, TimelockSchedule};

/// Runs the swap state machine over the store and the escrow ledger.
///
/// Borrows both for a single operation; nothing is cached between calls, every
/// transition is a read-modify-write through the store.
pub struct SwapController<'a, L: EscrowLedger> {
    store: &'a mut SwapStore,
    ledger: &'a mut L,
}

impl<'a, L: EscrowLedger> SwapController<'a, L> {
    pub fn new(store: &'a mut SwapStore, ledger: &'a mut L) -> Self {
        Self { store, ledger }
    }

    /// Locks the escrow leg and opens an `Active` record.
    ///
    /// Any id already in the store is rejected with `SwapAlreadyExists`, including a
    /// deactivated one: tombstones are never reused. On any failure the store is left
    /// as it was and the lock, if taken, is released.
    pub fn create(
        &mut self,
        id: SwapId,
        hashlock: CryptoHash,
        order: &SwapOrder,
        schedule: TimelockSchedule,
        funding: NearToken,
    ) -> Result<(), SwapError> {
        if self.store.get(&id).is_some() {
            return Err(SwapError::SwapAlreadyExists);
        }
        schedule.validate()?;

        let now = env::block_timestamp();
        let handle = self.ledger.lock(
            id,
            LockTerms {
                maker: order.maker.clone(),
                taker: order.taker.clone(),
                hashlock,
                timelocks: schedule.pack().with_deployed_at(to_deployed_at(now)),
                amount: order.amount(),
                safety_deposit: order.safety_deposit(),
                funding,
            },
        );

        let required = order.required_funding();
        let available = self.ledger.balance_of(&handle);
        if available < required {
            self.ledger.release(&handle);
            return Err(SwapError::InsufficientEscrowBalance {
                required: required.as_yoctonear(),
                available: available.as_yoctonear(),
            });
        }

        let record = SwapRecord::new(Commitment::from_hashlock(hashlock), order, schedule, now);
        if !self.store.insert_if_absent(id, record) {
            self.ledger.release(&handle);
            return Err(SwapError::SwapAlreadyExists);
        }

        SwapEvent::SwapInitiated {
            swap_id: id.into(),
            hashlock: hashlock.into(),
            maker: order.maker.clone(),
            taker: order.taker.clone(),
            amount: order.amount,
            safety_deposit: order.safety_deposit,
            counterparty_amount: order.counterparty_amount,
            counterparty_asset: order.counterparty_asset,
        }
        .emit();
        Ok(())
    }

    /// Overwrites the counterparty references. Safe to repeat.
    pub fn update_reference(
        &mut self,
        id: &SwapId,
        object_ref: u64,
        tx_ref: CryptoHash,
    ) -> Result<(), SwapError> {
        self.store
            .update_if_present(id, |record| {
                if !record.active {
                    return false;
                }
                record.counterparty_object_ref = Some(object_ref);
                record.counterparty_tx_ref = Some(tx_ref);
                true
            })
            .filter(|updated| *updated)
            .map(|_| ())
            .ok_or(SwapError::SwapNotFound)
    }

    /// Records a secret observed on `chain_id` once it hashes to the stored hashlock.
    /// A repeated reveal re-announces the secret; `revealed_on` keeps the first chain.
    pub fn record_secret_reveal(
        &mut self,
        id: &SwapId,
        secret: Secret,
        chain_id: ChainId,
    ) -> Result<(), SwapError> {
        let record = self
            .store
            .get(id)
            .filter(|record| record.active)
            .ok_or(SwapError::SwapNotFound)?;
        if !commitment::verify(&record.hashlock, &secret) {
            return Err(SwapError::SecretMismatch);
        }

        self.store.update_if_present(id, |record| {
            record.hashlock.secret = Some(secret);
            record.revealed_on.get_or_insert(chain_id);
        });

        SwapEvent::SecretRevealed {
            swap_id: (*id).into(),
            secret: secret.into(),
            reveal_chain_id: U64(chain_id),
        }
        .emit();
        Ok(())
    }

    /// Tombstones the record. Funds stay wherever the escrow holds them.
    pub fn deactivate(&mut self, id: &SwapId) -> Result<(), SwapError> {
        self.store
            .update_if_present(id, |record| record.active = false)
            .ok_or(SwapError::SwapNotFound)
    }

    /// Applies reference updates entry by entry, skipping absent or inactive ids.
    /// Returns how many records were updated.
    pub fn batch_update_references(
        &mut self,
        ids: &[SwapId],
        object_refs: &[u64],
        tx_refs: &[CryptoHash],
    ) -> Result<u32, SwapError> {
        if ids.len() != object_refs.len() || ids.len() != tx_refs.len() {
            return Err(SwapError::ArityMismatch);
        }

        let mut updated = 0;
        for ((id, object_ref), tx_ref) in ids.iter().zip(object_refs).zip(tx_refs) {
            if self.update_reference(id, *object_ref, *tx_ref).is_ok() {
                updated += 1;
            }
        }
        Ok(updated)
    }
}
