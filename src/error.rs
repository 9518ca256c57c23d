//! Error types for contract verification and transaction building

use thiserror::Error;

/// Why a contract method rejected a call
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("the auction bid is lower than the current highest bid")]
    BidTooLow,

    #[error("hashes are not equal")]
    HashMismatch,

    #[error("raised amount is less than the target")]
    TargetNotReached,

    #[error("deadline has not been reached")]
    DeadlineNotReached,

    #[error("signature check failed")]
    SignatureInvalid,

    #[error("input sequence disables locktime")]
    LocktimeDisabled,

    #[error("locktime and deadline use different units")]
    LocktimeKindMismatch,

    #[error("public key does not hash to the locked public key hash")]
    PubKeyHashMismatch,
}

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Assertion failed: {0}")]
    AssertionFailure(RejectReason),

    #[error("Outputs commitment mismatch: {0}")]
    MalformedCommitment(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("External collaborator failure: {0}")]
    ExternalIo(String),

    #[error("Transaction validation failed: {0}")]
    TransactionValidation(String),

    #[error("Transaction building failed: {0}")]
    Builder(String),
}

impl From<RejectReason> for ContractError {
    fn from(reason: RejectReason) -> Self {
        ContractError::AssertionFailure(reason)
    }
}

impl ContractError {
    /// The reject reason, if this is a failed predicate
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            ContractError::AssertionFailure(reason) => Some(*reason),
            _ => None,
        }
    }

    pub(crate) fn external(err: anyhow::Error) -> Self {
        ContractError::ExternalIo(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, ContractError>;
