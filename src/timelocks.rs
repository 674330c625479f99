use near_sdk::near;
use thiserror::Error;

pub const NANOS_IN_SEC: u64 = 1_000_000_000;

const WORD_BYTES: usize = 32;
const SLOT_BYTES: usize = 4;
/// Slot holding the deployment timestamp, above the seven stage offsets.
const DEPLOYED_AT_SLOT: usize = 7;

/// Stages of a swap in packing order. Stage `i` lives in bits `[32 * i, 32 * i + 32)`.
///
/// `Src*` stages govern the escrow held by this contract, `Dst*` stages the
/// counterparty leg observed through the relayer.
#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    SrcWithdrawal,
    SrcPublicWithdrawal,
    SrcCancellation,
    SrcPublicCancellation,
    DstWithdrawal,
    DstPublicWithdrawal,
    DstCancellation,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::SrcWithdrawal,
        Stage::SrcPublicWithdrawal,
        Stage::SrcCancellation,
        Stage::SrcPublicCancellation,
        Stage::DstWithdrawal,
        Stage::DstPublicWithdrawal,
        Stage::DstCancellation,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Offsets in seconds for all critical stages of a swap, relative to its deployment time.
#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelockSchedule {
    // --- Escrow leg (this chain) ---
    pub src_withdrawal: u32,
    pub src_public_withdrawal: u32,
    pub src_cancellation: u32,
    pub src_public_cancellation: u32,

    // --- Counterparty leg ---
    pub dst_withdrawal: u32,
    pub dst_public_withdrawal: u32,
    pub dst_cancellation: u32,
}

impl Default for TimelockSchedule {
    fn default() -> Self {
        Self {
            src_withdrawal: 3_600,
            src_public_withdrawal: 7_200,
            src_cancellation: 86_400,
            src_public_cancellation: 172_800,
            dst_withdrawal: 1_800,
            dst_public_withdrawal: 5_400,
            dst_cancellation: 90_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TimelockError {
    #[error("SRC: public withdrawal must start after private withdrawal")]
    SrcPublicWithdrawalOrder,
    #[error("SRC: cancellation must start after public withdrawal")]
    SrcCancellationOrder,
    #[error("SRC: public cancellation must start after private cancellation")]
    SrcPublicCancellationOrder,
    #[error("DST: public withdrawal must start after private withdrawal")]
    DstPublicWithdrawalOrder,
    #[error("DST: cancellation must start after public withdrawal")]
    DstCancellationOrder,
    #[error("X-CHAIN: destination withdrawal must open before source cancellation")]
    DstWithdrawalAfterSrcCancellation,
    #[error("X-CHAIN: source withdrawal must open before destination cancellation")]
    SrcWithdrawalAfterDstCancellation,
}

impl TimelockSchedule {
    /// Validates the ordering of the schedule. Must be called before a schedule
    /// is attached to a swap; packing never validates on its own.
    pub fn validate(&self) -> Result<(), TimelockError> {
        // --- Escrow leg ---
        if self.src_withdrawal >= self.src_public_withdrawal {
            return Err(TimelockError::SrcPublicWithdrawalOrder);
        }
        if self.src_public_withdrawal >= self.src_cancellation {
            return Err(TimelockError::SrcCancellationOrder);
        }
        if self.src_cancellation >= self.src_public_cancellation {
            return Err(TimelockError::SrcPublicCancellationOrder);
        }

        // --- Counterparty leg ---
        if self.dst_withdrawal >= self.dst_public_withdrawal {
            return Err(TimelockError::DstPublicWithdrawalOrder);
        }
        if self.dst_public_withdrawal >= self.dst_cancellation {
            return Err(TimelockError::DstCancellationOrder);
        }

        // --- Cross-chain ---
        // Nobody may hold a withdrawal path on one leg and a refund path on the other.
        if self.dst_withdrawal >= self.src_cancellation {
            return Err(TimelockError::DstWithdrawalAfterSrcCancellation);
        }
        if self.src_withdrawal >= self.dst_cancellation {
            return Err(TimelockError::SrcWithdrawalAfterDstCancellation);
        }
        Ok(())
    }

    pub fn offset(&self, stage: Stage) -> u32 {
        match stage {
            Stage::SrcWithdrawal => self.src_withdrawal,
            Stage::SrcPublicWithdrawal => self.src_public_withdrawal,
            Stage::SrcCancellation => self.src_cancellation,
            Stage::SrcPublicCancellation => self.src_public_cancellation,
            Stage::DstWithdrawal => self.dst_withdrawal,
            Stage::DstPublicWithdrawal => self.dst_public_withdrawal,
            Stage::DstCancellation => self.dst_cancellation,
        }
    }

    pub fn pack(&self) -> PackedTimelocks {
        let mut packed = PackedTimelocks::default();
        for stage in Stage::ALL {
            packed.set_slot(stage.slot(), self.offset(stage));
        }
        packed
    }
}

/// A schedule packed into a single 256-bit big-endian word.
///
/// Bits `[32 * i, 32 * i + 32)` carry the offset of [`Stage`] `i`; the top
/// 32 bits carry the deployment timestamp in seconds.
#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PackedTimelocks(pub [u8; WORD_BYTES]);

impl PackedTimelocks {
    pub fn unpack(&self) -> TimelockSchedule {
        TimelockSchedule {
            src_withdrawal: self.slot(Stage::SrcWithdrawal.slot()),
            src_public_withdrawal: self.slot(Stage::SrcPublicWithdrawal.slot()),
            src_cancellation: self.slot(Stage::SrcCancellation.slot()),
            src_public_cancellation: self.slot(Stage::SrcPublicCancellation.slot()),
            dst_withdrawal: self.slot(Stage::DstWithdrawal.slot()),
            dst_public_withdrawal: self.slot(Stage::DstPublicWithdrawal.slot()),
            dst_cancellation: self.slot(Stage::DstCancellation.slot()),
        }
    }

    pub fn with_deployed_at(mut self, deployed_at: u32) -> Self {
        self.set_slot(DEPLOYED_AT_SLOT, deployed_at);
        self
    }

    pub fn deployed_at(&self) -> u32 {
        self.slot(DEPLOYED_AT_SLOT)
    }

    pub fn offset(&self, stage: Stage) -> u32 {
        self.slot(stage.slot())
    }

    /// Absolute deadline of `stage` in seconds, using the embedded deployment time.
    pub fn deadline(&self, stage: Stage) -> u64 {
        derive_deadline(self, self.deployed_at(), stage)
    }

    fn slot(&self, index: usize) -> u32 {
        let start = WORD_BYTES - (index + 1) * SLOT_BYTES;
        let mut buf = [0u8; SLOT_BYTES];
        buf.copy_from_slice(&self.0[start..start + SLOT_BYTES]);
        u32::from_be_bytes(buf)
    }

    fn set_slot(&mut self, index: usize, value: u32) {
        let start = WORD_BYTES - (index + 1) * SLOT_BYTES;
        self.0[start..start + SLOT_BYTES].copy_from_slice(&value.to_be_bytes());
    }
}

pub fn derive_deadline(packed: &PackedTimelocks, deployed_at: u32, stage: Stage) -> u64 {
    u64::from(deployed_at) + u64::from(packed.offset(stage))
}

/// Converts a block timestamp (ns) into the 32-bit seconds stored in the packed word.
pub fn to_deployed_at(block_timestamp: u64) -> u32 {
    u32::try_from(block_timestamp / NANOS_IN_SEC).unwrap_or(u32::MAX)
}
