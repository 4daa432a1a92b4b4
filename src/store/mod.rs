//! Persistence of custody records
//!
//! A [`CustodyRecord`] is the only durable state custody produces: one
//! server share plus the encrypted private key, both from the same split.
//! Stores hand records out whole and replace them whole, so a reader sees
//! either the previous generation or the next, never a mix.

mod file;
mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::Address;
use crate::cipher::EncryptedPrivateKey;
use crate::codec::EncodedShare;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Failures reported by a record store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Compare-and-swap lost against a concurrent writer
    #[error("version mismatch: expected {expected}, found {found:?}")]
    VersionMismatch { expected: u64, found: Option<u64> },

    /// The backing service could not be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored data could not be read back
    #[error("corrupt store data: {0}")]
    Corrupt(String),
}

/// Server-side custody artifacts for one account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyRecord {
    address: Address,
    /// Hex share wire format
    server_share: String,
    /// Base64 `iv || ciphertext || tag`
    encrypted_private_key: EncryptedPrivateKey,
}

impl CustodyRecord {
    #[must_use]
    pub fn new(
        address: Address,
        server_share: &EncodedShare,
        encrypted_private_key: EncryptedPrivateKey,
    ) -> Self {
        Self {
            address,
            server_share: server_share.as_str().to_owned(),
            encrypted_private_key,
        }
    }

    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    #[must_use]
    pub fn server_share(&self) -> &str {
        &self.server_share
    }

    #[must_use]
    pub fn encrypted_private_key(&self) -> &EncryptedPrivateKey {
        &self.encrypted_private_key
    }
}

impl std::fmt::Debug for CustodyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyRecord")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

/// A record together with the version it was stored under
///
/// Versions start at 1 and increase by one on every replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub version: u64,
    pub record: CustodyRecord,
}

/// Storage backend for custody records, keyed by account address
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Loads the current record for `address`
    async fn get(&self, address: &Address) -> Result<Option<VersionedRecord>, StoreError>;

    /// Stores `record` unconditionally, returning its new version
    async fn put(&self, address: &Address, record: CustodyRecord) -> Result<u64, StoreError>;

    /// Replaces the record only if it is still at `expected_version`
    ///
    /// Returns the new version, or [`StoreError::VersionMismatch`] if another
    /// writer got there first or the record is gone.
    async fn compare_and_swap(
        &self,
        address: &Address,
        expected_version: u64,
        record: CustodyRecord,
    ) -> Result<u64, StoreError>;
}
