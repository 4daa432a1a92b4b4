//! Custody orchestration
//!
//! [`Custodian`] runs the three account-level operations on top of the pure
//! transforms in [`cipher`](crate::cipher) and [`sharing`](crate::sharing):
//!
//! - **enroll**: fresh symmetric key, encrypt the private key, split, persist
//!   share 0 with the ciphertext, hand shares 1.. back exactly once
//! - **with_key**: combine the stored share with a caller share, decrypt,
//!   verify the key owns the address, lend the key to one consumer
//! - **rekey**: reconstruct as above, then enroll the same private key again
//!   under new key material, replacing the record by compare-and-swap
//!
//! Enroll and rekey on the same address are serialized; everything else runs
//! concurrently. Every store call has its own deadline.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::address::Address;
use crate::cipher;
use crate::codec::EncodedShare;
use crate::domain::CustodyConfig;
use crate::error::{CustodyError, Result};
use crate::keys::{self, PrivateKey};
use crate::ledger::{Ledger, TxHash};
use crate::sharing::{self, SecretShare};
use crate::store::{CustodyRecord, RecordStore, StoreError, VersionedRecord};

/// Outcome of enrolling or re-keying an account
///
/// `shares` are the distribution shares. They are not retained anywhere;
/// this is the only time they exist outside the holder's hands.
#[derive(Debug)]
pub struct Enrollment {
    pub address: Address,
    pub shares: Vec<EncodedShare>,
}

/// Threshold custody of account private keys
pub struct Custodian<S, L> {
    store: S,
    ledger: L,
    config: CustodyConfig,
    locks: Mutex<HashMap<Address, Arc<Mutex<()>>>>,
}

impl<S: RecordStore, L: Ledger> Custodian<S, L> {
    pub fn new(store: S, ledger: L, config: CustodyConfig) -> Self {
        Self {
            store,
            ledger,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    #[must_use]
    pub fn config(&self) -> CustodyConfig {
        self.config
    }

    /// Takes custody of an existing private key
    ///
    /// Distribution shares are only returned once the record is persisted.
    ///
    /// # Errors
    /// - [`CustodyError::InvalidKey`] if the key controls no address
    /// - [`CustodyError::AlreadyEnrolled`] if the address already has a record
    /// - [`CustodyError::Unavailable`] if the store fails or times out and
    ///   the record was not written
    /// - [`CustodyError::WriteUnconfirmed`] if a timed-out write could not be
    ///   confirmed either way
    pub async fn enroll(&self, private_key: PrivateKey) -> Result<Enrollment> {
        let address = self
            .ledger
            .derive_address(&private_key)
            .map_err(|_| CustodyError::InvalidKey("key does not control an address".into()))?;

        let _guard = self.lock_address(&address).await;
        if self.timed(self.store.get(&address)).await?.is_some() {
            return Err(CustodyError::AlreadyEnrolled);
        }

        let (record, shares) = self.protect(address, &private_key)?;
        let version = self
            .settled_write(&address, &record, None, self.store.put(&address, record.clone()))
            .await?;

        tracing::info!(%address, version, shares = shares.len(), "account enrolled");
        Ok(Enrollment { address, shares })
    }

    /// Creates a new account key and takes custody of it
    ///
    /// # Errors
    /// Same as [`Custodian::enroll`], plus [`CustodyError::Fatal`] if the
    /// random source fails
    pub async fn enroll_new_account(&self) -> Result<Enrollment> {
        let private_key = keys::generate_private_key()?;
        self.enroll(private_key).await
    }

    /// Reconstructs the account key and hands it to `consume` exactly once
    ///
    /// The key is moved into `consume` and dropped (wiped) when the returned
    /// future completes. Nothing is cached between calls.
    ///
    /// # Errors
    /// - [`CustodyError::InvalidShare`] if the caller share is malformed or
    ///   does not belong to the current record
    /// - [`CustodyError::NotFound`] if the address has no record
    /// - [`CustodyError::AuthMismatch`] if the key does not own the address
    /// - [`CustodyError::Unavailable`] if the store fails or times out
    /// - whatever `consume` returns
    pub async fn with_key<F, Fut, T>(
        &self,
        address: &Address,
        caller_share: &str,
        consume: F,
    ) -> Result<T>
    where
        F: FnOnce(PrivateKey) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let caller_share = SecretShare::decode(caller_share)?;
        let current = self.load(address).await?;
        let private_key = self.reconstruct(&current.record, caller_share)?;
        consume(private_key).await
    }

    /// Signs and submits `payload` with the account key
    ///
    /// # Errors
    /// Same as [`Custodian::with_key`], plus [`CustodyError::Ledger`] if
    /// signing or submission fails
    pub async fn sign_transaction(
        &self,
        address: &Address,
        caller_share: &str,
        payload: &[u8],
    ) -> Result<TxHash> {
        let ledger = &self.ledger;
        let hash = self
            .with_key(address, caller_share, |key| async move {
                ledger
                    .sign_and_submit(&key, payload)
                    .await
                    .map_err(CustodyError::from)
            })
            .await?;

        tracing::info!(%address, tx = %hash, "transaction submitted");
        Ok(hash)
    }

    /// Replaces the account's key material, keeping the same private key
    ///
    /// All earlier distribution shares stop working; the new ones are
    /// returned.
    ///
    /// # Errors
    /// Same as [`Custodian::with_key`], plus [`CustodyError::Conflict`] if
    /// the record changed while re-keying and
    /// [`CustodyError::WriteUnconfirmed`] if a timed-out write could not be
    /// confirmed either way
    pub async fn rekey(&self, address: &Address, caller_share: &str) -> Result<Enrollment> {
        let caller_share = SecretShare::decode(caller_share)?;

        let _guard = self.lock_address(address).await;
        let current = self.load(address).await?;
        let private_key = self.reconstruct(&current.record, caller_share)?;

        let (record, shares) = self.protect(*address, &private_key)?;
        drop(private_key);

        let version = self
            .settled_write(
                address,
                &record,
                Some(current.version),
                self.store
                    .compare_and_swap(address, current.version, record.clone()),
            )
            .await?;

        tracing::info!(%address, version, shares = shares.len(), "account re-keyed");
        Ok(Enrollment {
            address: *address,
            shares,
        })
    }

    /// Encrypts `private_key` under fresh key material and splits that key
    ///
    /// Returns the record to persist and the distribution shares. The
    /// symmetric key is dropped before returning.
    fn protect(
        &self,
        address: Address,
        private_key: &PrivateKey,
    ) -> Result<(CustodyRecord, Vec<EncodedShare>)> {
        let symmetric_key = keys::generate_symmetric_key()?;
        let encrypted = cipher::encrypt(private_key, &symmetric_key)?;
        let shares = sharing::split(&symmetric_key, self.config.split())?;
        drop(symmetric_key);

        let mut encoded = shares
            .iter()
            .map(SecretShare::encode)
            .collect::<Result<Vec<_>>>()?
            .into_iter();
        let server_share = encoded
            .next()
            .ok_or_else(|| CustodyError::Fatal("split produced no shares".into()))?;

        Ok((
            CustodyRecord::new(address, &server_share, encrypted),
            encoded.collect(),
        ))
    }

    /// Server share + caller share -> verified private key
    fn reconstruct(&self, record: &CustodyRecord, caller_share: SecretShare) -> Result<PrivateKey> {
        let address = record.address();
        let server_share = SecretShare::decode(record.server_share()).map_err(|_| {
            tracing::error!(%address, "stored server share is unreadable");
            CustodyError::Fatal("custody record is corrupt".into())
        })?;

        let symmetric_key = sharing::combine(&[server_share, caller_share]).map_err(|e| {
            tracing::debug!(%address, reason = %e, "share combination rejected");
            not_this_account()
        })?;

        let private_key = cipher::decrypt(record.encrypted_private_key(), &symmetric_key)
            .map_err(|_| not_this_account())?;
        drop(symmetric_key);

        match self.ledger.derive_address(&private_key) {
            Ok(derived) if derived == address => Ok(private_key),
            _ => {
                tracing::warn!(%address, "reconstructed key does not own the account address");
                Err(CustodyError::AuthMismatch)
            }
        }
    }

    async fn load(&self, address: &Address) -> Result<VersionedRecord> {
        let current = self
            .timed(self.store.get(address))
            .await?
            .ok_or(CustodyError::NotFound)?;
        tracing::debug!(%address, version = current.version, "custody record loaded");
        Ok(current)
    }

    /// Applies the configured store deadline to one store call
    async fn timed<T, E>(&self, call: impl Future<Output = std::result::Result<T, E>>) -> Result<T>
    where
        CustodyError: From<E>,
    {
        match tokio::time::timeout(self.config.store_timeout(), call).await {
            Ok(result) => result.map_err(CustodyError::from),
            Err(_) => {
                tracing::warn!(timeout = ?self.config.store_timeout(), "record store call timed out");
                Err(CustodyError::Unavailable("record store timed out".into()))
            }
        }
    }

    /// Runs one store write under the deadline
    ///
    /// A write that misses its deadline may still land afterwards, so the
    /// record is read back before answering: `written` found means success,
    /// `previous` still in place means the write did not happen, anything
    /// else is [`CustodyError::WriteUnconfirmed`].
    async fn settled_write(
        &self,
        address: &Address,
        written: &CustodyRecord,
        previous: Option<u64>,
        write: impl Future<Output = std::result::Result<u64, StoreError>>,
    ) -> Result<u64> {
        match tokio::time::timeout(self.config.store_timeout(), write).await {
            Ok(result) => result.map_err(CustodyError::from),
            Err(_) => {
                tracing::warn!(
                    %address,
                    timeout = ?self.config.store_timeout(),
                    "record store write unacknowledged, reading back"
                );
                self.read_back(address, written, previous).await
            }
        }
    }

    async fn read_back(
        &self,
        address: &Address,
        written: &CustodyRecord,
        previous: Option<u64>,
    ) -> Result<u64> {
        let stored = self.timed(self.store.get(address)).await.map_err(|e| {
            tracing::error!(%address, reason = %e, "outcome of record store write is unknown");
            CustodyError::WriteUnconfirmed
        })?;

        match stored {
            Some(current) if current.record == *written => {
                tracing::info!(%address, version = current.version, "late record store write confirmed");
                Ok(current.version)
            }
            stored if stored.as_ref().map(|current| current.version) == previous => {
                Err(CustodyError::Unavailable("record store timed out".into()))
            }
            _ => {
                tracing::error!(%address, "record changed during an unacknowledged write");
                Err(CustodyError::WriteUnconfirmed)
            }
        }
    }

    /// Serializes writers per address; idle entries are pruned on the way in
    async fn lock_address(&self, address: &Address) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(*address).or_default())
        };
        lock.lock_owned().await
    }
}

fn not_this_account() -> CustodyError {
    CustodyError::InvalidShare("share does not unlock this account".into())
}
