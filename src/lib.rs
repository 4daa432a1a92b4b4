//! Threshold custody of blockchain account keys
//!
//! An account's private key is encrypted under a per-account symmetric key,
//! and that symmetric key is split into Shamir shares. The server keeps one
//! share next to the ciphertext; every other share goes to a holder. Any
//! holder share combined with the server share reconstructs the key, which
//! is then lent to a single signing operation and wiped.
//!
//! The [`Custodian`] runs enrollment, key use and re-keying on top of a
//! [`RecordStore`] and a [`Ledger`].

pub mod address;
pub mod cipher;
pub mod codec;
pub mod custodian;
pub mod domain;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod sealing;
pub mod sharing;
pub mod store;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod commands;

pub use address::Address;
pub use custodian::{Custodian, Enrollment};
pub use domain::{CustodyConfig, ShareCount, ShareIndex, SplitConfig, Threshold};
pub use error::{CustodyError, Result};
pub use keys::{PrivateKey, SymmetricKey};
pub use ledger::{Ledger, LedgerError, LocalLedger, TxHash};
pub use store::{CustodyRecord, FileStore, MemoryStore, RecordStore, StoreError, VersionedRecord};
