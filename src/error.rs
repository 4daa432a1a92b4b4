//! Error taxonomy for custody operations
//!
//! Messages never carry key material, share bytes or cipher internals. Callers
//! get enough to decide between retrying and aborting, nothing more.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::store::StoreError;

/// Failure reasons surfaced by the custody library
#[derive(Debug, Error)]
pub enum CustodyError {
    /// Decryption or integrity failure: wrong key or corrupted data
    #[error("Decryption failed: wrong key or corrupted data")]
    Crypto,

    /// Fewer distinct shares than the threshold requires
    #[error("Insufficient shares: need at least {required}, but only {provided} provided")]
    InsufficientShares { required: u8, provided: usize },

    /// Shares come from different split operations
    #[error("Shares were produced by different split operations")]
    InconsistentShares,

    /// Share could not be decoded or did not reconstruct a usable key
    #[error("Invalid share: {0}")]
    InvalidShare(String),

    /// Private key input is malformed or not a valid account key
    #[error("Invalid private key: {0}")]
    InvalidKey(String),

    /// Account address is not 20 hex-encoded bytes
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Reconstructed key does not control the claimed address
    #[error("Reconstructed key does not match the account address")]
    AuthMismatch,

    /// No custody record exists for the address
    #[error("No custody record for this address")]
    NotFound,

    /// A custody record already exists for the address
    #[error("Account is already enrolled")]
    AlreadyEnrolled,

    /// Custody record changed between read and write
    #[error("Custody record changed concurrently")]
    Conflict,

    /// A record store write missed its deadline and reading back could not
    /// tell whether it landed; the operation must not be blindly repeated
    #[error("Custody record write could not be confirmed")]
    WriteUnconfirmed,

    /// Transient store or network failure
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Rejected split or custody configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Ledger client refused or failed a request
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Unrecoverable failure such as an exhausted random source
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl CustodyError {
    /// Whether the caller may retry the same operation with backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict)
    }
}

impl From<StoreError> for CustodyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionMismatch { .. } => Self::Conflict,
            StoreError::Unavailable(reason) => Self::Unavailable(reason),
            StoreError::Io(e) => Self::Unavailable(e.to_string()),
            StoreError::Corrupt(reason) => Self::Fatal(format!("custody store is corrupt: {reason}")),
        }
    }
}

impl From<LedgerError> for CustodyError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Unreachable(reason) => Self::Unavailable(reason),
            other => Self::Ledger(other.to_string()),
        }
    }
}

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, CustodyError>;
