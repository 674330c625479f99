use near_sdk::store::IterableMap;
use near_sdk::{near, AccountId, CryptoHash, NearToken};

use crate::error::SwapError;
use crate::swap::SwapId;
use crate::timelocks::{PackedTimelocks, Stage};

/// Handle to a locked escrow. The vault keys escrows by swap id.
pub type EscrowHandle = SwapId;

/// Everything the escrow needs to custody one leg of a swap.
#[derive(Clone, Debug)]
pub struct LockTerms {
    pub maker: AccountId,
    pub taker: AccountId,
    pub hashlock: CryptoHash,
    pub timelocks: PackedTimelocks,
    pub amount: NearToken,
    pub safety_deposit: NearToken,
    pub funding: NearToken,
}

/// The escrow holding funds for the local leg.
pub trait EscrowLedger {
    fn lock(&mut self, id: SwapId, terms: LockTerms) -> EscrowHandle;
    fn balance_of(&self, handle: &EscrowHandle) -> NearToken;
    /// Drops a lock whose funding fell short, before any record refers to it.
    fn release(&mut self, handle: &EscrowHandle);
}

/// One transfer out of an escrow.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq)]
pub struct Payout {
    pub recipient: AccountId,
    pub amount: NearToken,
}

/// How a batch of payouts left the escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettlementStatus {
    Settled,
    /// Nothing was ever paid out; withdraw or cancel may run again.
    Reopened,
    /// Some payouts went through, the rest are owed.
    Owed,
}

// All the immutable parameters of a single escrow instance.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug)]
pub struct Escrow {
    // Core HTLC parameters
    pub hashlock: CryptoHash,
    pub maker: AccountId, // Gets the funds back on cancel
    pub taker: AccountId, // Claims the funds with the secret
    pub amount: NearToken,

    // Timelock, stamped with the deployment time
    pub timelocks: PackedTimelocks,

    // Incentives & State
    pub safety_deposit: NearToken,
    pub balance: NearToken, // Everything attached when locking
    pub claimed: bool,      // Flag to prevent double-spends

    // Settlement progress
    pub paid_out: NearToken, // Sum of confirmed transfers
    pub owed: Vec<Payout>,   // Failed transfers awaiting a retry
}

impl Escrow {
    /// Whatever is held beyond `amount` goes to the account executing the settlement.
    pub fn executor_payout(&self) -> NearToken {
        self.balance.saturating_sub(self.amount)
    }

    /// `amount` to `recipient`, then the executor payout to `executor` when there is one.
    pub fn payouts(&self, recipient: AccountId, executor: AccountId) -> Vec<Payout> {
        let mut payouts = vec![Payout {
            recipient,
            amount: self.amount,
        }];
        let executor_payout = self.executor_payout();
        if !executor_payout.is_zero() {
            payouts.push(Payout {
                recipient: executor,
                amount: executor_payout,
            });
        }
        payouts
    }

    /// Checks `now` (seconds) against the withdrawal window of this leg.
    pub fn check_withdrawal_window(
        &self,
        now: u64,
        is_public_caller: bool,
    ) -> Result<(), SwapError> {
        if is_public_caller {
            if now < self.timelocks.deadline(Stage::SrcPublicWithdrawal) {
                return Err(SwapError::OutsideTimelockWindow(
                    "Public withdrawal period has not started",
                ));
            }
        } else if now < self.timelocks.deadline(Stage::SrcWithdrawal) {
            return Err(SwapError::OutsideTimelockWindow(
                "Private withdrawal period has not started",
            ));
        }
        if now >= self.timelocks.deadline(Stage::SrcCancellation) {
            return Err(SwapError::OutsideTimelockWindow("Cancellation period has started"));
        }
        Ok(())
    }

    /// Checks `now` (seconds) against the cancellation window of this leg.
    pub fn check_cancellation_window(
        &self,
        now: u64,
        is_public_caller: bool,
    ) -> Result<(), SwapError> {
        if is_public_caller {
            if now < self.timelocks.deadline(Stage::SrcPublicCancellation) {
                return Err(SwapError::OutsideTimelockWindow(
                    "Public cancellation period has not started",
                ));
            }
        } else if now < self.timelocks.deadline(Stage::SrcCancellation) {
            return Err(SwapError::OutsideTimelockWindow(
                "Private cancellation period has not started",
            ));
        }
        Ok(())
    }
}

#[near(serializers = [borsh])]
pub struct EscrowVault {
    escrows: IterableMap<SwapId, Escrow>,
}

impl EscrowVault {
    pub fn new(prefix: &[u8]) -> Self {
        Self {
            escrows: IterableMap::new(prefix.to_vec()),
        }
    }

    pub fn get(&self, id: &SwapId) -> Option<&Escrow> {
        self.escrows.get(id)
    }

    /// Flips the `claimed` flag, returning a copy of the escrow as it was before.
    pub fn mark_claimed(&mut self, id: &SwapId) -> Result<Escrow, SwapError> {
        let escrow = self.escrows.get_mut(id).ok_or(SwapError::EscrowNotFound)?;
        if escrow.claimed {
            return Err(SwapError::EscrowAlreadySettled);
        }
        let snapshot = escrow.clone();
        escrow.claimed = true;
        Ok(snapshot)
    }

    /// Records the outcome of a payout batch: `paid` confirmed, `failed` bounced.
    ///
    /// The escrow reopens only while nothing has left it. After that, failed
    /// payouts accumulate in `owed` and the escrow stays claimed.
    pub fn record_settlement(
        &mut self,
        id: &SwapId,
        paid: NearToken,
        failed: Vec<Payout>,
    ) -> Option<SettlementStatus> {
        let escrow = self.escrows.get_mut(id)?;
        escrow.paid_out = escrow.paid_out.saturating_add(paid);
        if escrow.paid_out.is_zero() {
            escrow.claimed = false;
            return Some(SettlementStatus::Reopened);
        }
        escrow.owed.extend(failed);
        if escrow.owed.is_empty() {
            Some(SettlementStatus::Settled)
        } else {
            Some(SettlementStatus::Owed)
        }
    }

    /// Hands out the owed payouts for a retry, leaving none behind while it is in flight.
    pub fn take_owed(&mut self, id: &SwapId) -> Result<Vec<Payout>, SwapError> {
        let escrow = self.escrows.get_mut(id).ok_or(SwapError::EscrowNotFound)?;
        if escrow.owed.is_empty() {
            return Err(SwapError::NoPaymentOwed);
        }
        Ok(std::mem::take(&mut escrow.owed))
    }
}

impl EscrowLedger for EscrowVault {
    fn lock(&mut self, id: SwapId, terms: LockTerms) -> EscrowHandle {
        let escrow = Escrow {
            hashlock: terms.hashlock,
            maker: terms.maker,
            taker: terms.taker,
            amount: terms.amount,
            timelocks: terms.timelocks,
            safety_deposit: terms.safety_deposit,
            balance: terms.funding,
            claimed: false,
            paid_out: NearToken::from_yoctonear(0),
            owed: Vec::new(),
        };
        self.escrows.insert(id, escrow);
        id
    }

    fn balance_of(&self, handle: &EscrowHandle) -> NearToken {
        self.escrows
            .get(handle)
            .map(|escrow| escrow.balance)
            .unwrap_or(NearToken::from_yoctonear(0))
    }

    fn release(&mut self, handle: &EscrowHandle) {
        self.escrows.remove(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timelocks::TimelockSchedule;
    use near_sdk::test_utils::accounts;

    fn terms(funding: u128) -> LockTerms {
        LockTerms {
            maker: accounts(0),
            taker: accounts(1),
            hashlock: [5u8; 32],
            timelocks: TimelockSchedule::default().pack().with_deployed_at(1_000),
            amount: NearToken::from_yoctonear(100),
            safety_deposit: NearToken::from_yoctonear(10),
            funding: NearToken::from_yoctonear(funding),
        }
    }

    #[test]
    fn lock_records_funding_as_balance() {
        let mut vault = EscrowVault::new(b"v");
        let handle = vault.lock([1u8; 32], terms(115));
        assert_eq!(vault.balance_of(&handle), NearToken::from_yoctonear(115));
        assert_eq!(
            vault.get(&handle).map(Escrow::executor_payout),
            Some(NearToken::from_yoctonear(15))
        );
    }

    #[test]
    fn release_forgets_the_lock() {
        let mut vault = EscrowVault::new(b"v");
        let handle = vault.lock([1u8; 32], terms(115));
        vault.release(&handle);
        assert!(vault.get(&handle).is_none());
        assert_eq!(vault.balance_of(&handle), NearToken::from_yoctonear(0));
    }

    #[test]
    fn escrow_is_claimed_once() {
        let mut vault = EscrowVault::new(b"v");
        let handle = vault.lock([1u8; 32], terms(110));
        assert!(vault.mark_claimed(&handle).is_ok());
        assert_eq!(
            vault.mark_claimed(&handle).unwrap_err(),
            SwapError::EscrowAlreadySettled
        );
    }

    #[test]
    fn payouts_skip_empty_executor_share() {
        let mut vault = EscrowVault::new(b"v");
        let handle = vault.lock([1u8; 32], terms(100));
        let escrow = vault.get(&handle).cloned().unwrap();
        assert_eq!(
            escrow.payouts(accounts(1), accounts(4)),
            vec![Payout {
                recipient: accounts(1),
                amount: NearToken::from_yoctonear(100),
            }]
        );
    }

    #[test]
    fn untouched_escrow_reopens_after_failed_settlement() {
        let mut vault = EscrowVault::new(b"v");
        let handle = vault.lock([1u8; 32], terms(115));
        let escrow = vault.mark_claimed(&handle).unwrap();
        let failed = escrow.payouts(accounts(1), accounts(4));

        assert_eq!(
            vault.record_settlement(&handle, NearToken::from_yoctonear(0), failed),
            Some(SettlementStatus::Reopened)
        );
        let escrow = vault.get(&handle).unwrap();
        assert!(!escrow.claimed);
        assert!(escrow.owed.is_empty());
        assert!(vault.mark_claimed(&handle).is_ok());
    }

    #[test]
    fn partial_settlement_keeps_escrow_claimed() {
        let mut vault = EscrowVault::new(b"v");
        let handle = vault.lock([1u8; 32], terms(115));
        let escrow = vault.mark_claimed(&handle).unwrap();
        let payouts = escrow.payouts(accounts(1), accounts(4));

        assert_eq!(
            vault.record_settlement(&handle, payouts[1].amount, vec![payouts[0].clone()]),
            Some(SettlementStatus::Owed)
        );
        assert_eq!(
            vault.mark_claimed(&handle).unwrap_err(),
            SwapError::EscrowAlreadySettled
        );

        // The retry takes only the owed transfer; a second retry finds nothing.
        assert_eq!(vault.take_owed(&handle), Ok(vec![payouts[0].clone()]));
        assert_eq!(vault.take_owed(&handle), Err(SwapError::NoPaymentOwed));

        // A bounced retry is owed again, without reopening.
        let bounced = vec![payouts[0].clone()];
        assert_eq!(
            vault.record_settlement(&handle, NearToken::from_yoctonear(0), bounced),
            Some(SettlementStatus::Owed)
        );
        assert!(vault.get(&handle).unwrap().claimed);

        let owed = vault.take_owed(&handle).unwrap();
        assert_eq!(
            vault.record_settlement(&handle, owed[0].amount, vec![]),
            Some(SettlementStatus::Settled)
        );
        let escrow = vault.get(&handle).unwrap();
        assert_eq!(escrow.paid_out, escrow.balance);
        assert!(escrow.owed.is_empty());
    }

    #[test]
    fn settlement_of_unknown_escrow_is_ignored() {
        let mut vault = EscrowVault::new(b"v");
        assert_eq!(
            vault.record_settlement(&[9u8; 32], NearToken::from_yoctonear(1), vec![]),
            None
        );
        assert_eq!(vault.take_owed(&[9u8; 32]), Err(SwapError::EscrowNotFound));
    }

    #[test]
    fn withdrawal_window_follows_schedule() {
        let mut vault = EscrowVault::new(b"v");
        let handle = vault.lock([1u8; 32], terms(110));
        let escrow = vault.get(&handle).cloned().unwrap();

        // Deployed at 1_000s: private 4_600, public 8_200, cancellation 87_400.
        assert!(escrow.check_withdrawal_window(4_599, false).is_err());
        assert!(escrow.check_withdrawal_window(4_600, false).is_ok());
        assert!(escrow.check_withdrawal_window(4_600, true).is_err());
        assert!(escrow.check_withdrawal_window(8_200, true).is_ok());
        assert!(escrow.check_withdrawal_window(87_400, false).is_err());
    }

    #[test]
    fn cancellation_window_follows_schedule() {
        let mut vault = EscrowVault::new(b"v");
        let handle = vault.lock([1u8; 32], terms(110));
        let escrow = vault.get(&handle).cloned().unwrap();

        // Private 87_400, public 173_800.
        assert!(escrow.check_cancellation_window(87_399, false).is_err());
        assert!(escrow.check_cancellation_window(87_400, false).is_ok());
        assert!(escrow.check_cancellation_window(87_400, true).is_err());
        assert!(escrow.check_cancellation_window(173_800, true).is_ok());
    }
}
