use near_sdk::FunctionError;
use thiserror::Error;

use crate::timelocks::TimelockError;

/// Failures surfaced by the coordinator. Returning one from a contract method
/// aborts the receipt, so no partial state or attached deposit is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error, FunctionError)]
pub enum SwapError {
    #[error("Invalid timelock schedule: {0}")]
    InvalidTimelock(#[from] TimelockError),
    #[error("Swap with this id already exists")]
    SwapAlreadyExists,
    #[error("Swap not found or inactive")]
    SwapNotFound,
    #[error("Escrow balance {available} is below the required {required} yoctoNEAR")]
    InsufficientEscrowBalance { required: u128, available: u128 },
    #[error("Secret does not match the hashlock")]
    SecretMismatch,
    #[error("Batch arguments must have equal lengths")]
    ArityMismatch,
    #[error("Caller is not allowed to perform this action")]
    Unauthorized,
    #[error("Escrow not found")]
    EscrowNotFound,
    #[error("Escrow already settled")]
    EscrowAlreadySettled,
    #[error("{0}")]
    OutsideTimelockWindow(&'static str),
    #[error("No payment is owed for this escrow")]
    NoPaymentOwed,
}
