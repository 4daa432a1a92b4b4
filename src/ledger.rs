//! Ledger client seam
//!
//! The custodian needs two things from the chain side: the address a key
//! controls, and a way to sign and submit a transaction with that key.
//! [`LocalLedger`] does both offline (secp256k1 recoverable ECDSA over the
//! Keccak-256 hash of the payload) and keeps the submitted transactions in
//! memory; a remote procedure call client implements the same trait.

use async_trait::async_trait;
use sha3::{Digest, Keccak256};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::address::{self, Address};
use crate::keys::PrivateKey;

/// Failures reported by a ledger client
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Key bytes are not a usable account key
    #[error("key is not a valid account key")]
    InvalidKey,

    #[error("signing failed: {0}")]
    Signing(String),

    /// The ledger refused the transaction
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The ledger could not be reached
    #[error("ledger unreachable: {0}")]
    Unreachable(String),
}

/// Hash identifying a submitted transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl std::fmt::Display for TxHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Operations the custodian needs from the chain side
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Address controlled by `key`
    fn derive_address(&self, key: &PrivateKey) -> Result<Address, LedgerError>;

    /// Signs `payload` with `key` and submits it, returning its hash
    async fn sign_and_submit(
        &self,
        key: &PrivateKey,
        payload: &[u8],
    ) -> Result<TxHash, LedgerError>;
}

/// A transaction accepted by [`LocalLedger`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTx {
    pub from: Address,
    pub payload: Vec<u8>,
    /// `r || s || v`, 65 bytes
    pub signature: Vec<u8>,
    pub hash: TxHash,
}

/// Offline ledger that signs locally and records what it was given
#[derive(Debug, Default)]
pub struct LocalLedger {
    submitted: Mutex<Vec<SubmittedTx>>,
}

impl LocalLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transactions submitted so far, oldest first
    pub async fn submitted(&self) -> Vec<SubmittedTx> {
        self.submitted.lock().await.clone()
    }
}

#[async_trait]
impl Ledger for LocalLedger {
    fn derive_address(&self, key: &PrivateKey) -> Result<Address, LedgerError> {
        address::derive_address(key).map_err(|_| LedgerError::InvalidKey)
    }

    async fn sign_and_submit(
        &self,
        key: &PrivateKey,
        payload: &[u8],
    ) -> Result<TxHash, LedgerError> {
        let signing_key = address::signing_key(key).map_err(|_| LedgerError::InvalidKey)?;
        let from = self.derive_address(key)?;

        let prehash = Keccak256::digest(payload);
        let (signature, recovery_id) = signing_key
            .sign_prehash_recoverable(&prehash)
            .map_err(|e| LedgerError::Signing(e.to_string()))?;

        let mut sig_bytes = signature.to_bytes().to_vec();
        sig_bytes.push(recovery_id.to_byte());

        let mut hasher = Keccak256::new();
        hasher.update(payload);
        hasher.update(&sig_bytes);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&hasher.finalize());
        let hash = TxHash(hash);

        tracing::debug!(%from, tx = %hash, "transaction signed locally");
        self.submitted.lock().await.push(SubmittedTx {
            from,
            payload: payload.to_vec(),
            signature: sig_bytes,
            hash,
        });
        Ok(hash)
    }
}
