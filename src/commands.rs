use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use zeroize::Zeroizing;

use crate::address::{self, Address};
use crate::custodian::{Custodian, Enrollment};
use crate::domain::CustodyConfig;
use crate::keys::PrivateKey;
use crate::ledger::{Ledger, LocalLedger};
use crate::sealing::{self, SealedShare};
use crate::sharing::SecretShare;
use crate::store::{FileStore, RecordStore};

/// Shares handed out by `new-account`, `enroll` and `rekey`
#[derive(Debug, Serialize)]
pub struct EnrollmentOutput {
    pub address: String,
    pub shares: Vec<String>,
}

impl From<Enrollment> for EnrollmentOutput {
    fn from(enrollment: Enrollment) -> Self {
        Self {
            address: enrollment.address.to_string(),
            shares: enrollment
                .shares
                .iter()
                .map(|share| share.as_str().to_owned())
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddressOutput {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct SignOutput {
    pub address: String,
    pub tx_hash: String,
}

#[derive(Debug, Serialize)]
pub struct SealOutput {
    pub sealed: SealedShare,
    /// Present only when the passphrase was generated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_code: Option<String>,
}

/// Custodian over a JSON file store with an offline ledger
#[must_use]
pub fn open_custodian(store: &Path, config: CustodyConfig) -> Custodian<FileStore, LocalLedger> {
    Custodian::new(FileStore::new(store), LocalLedger::new(), config)
}

/// Create and enroll a fresh account
///
/// # Errors
/// Returns an error if key generation or persisting the record fails
pub async fn new_account<S: RecordStore, L: Ledger>(
    custodian: &Custodian<S, L>,
) -> Result<EnrollmentOutput> {
    let enrollment = custodian
        .enroll_new_account()
        .await
        .context("Failed to enroll new account")?;
    Ok(enrollment.into())
}

/// Enroll an existing hex private key
///
/// # Errors
/// Returns an error if the key is malformed, already enrolled, or the store fails
pub async fn enroll<S: RecordStore, L: Ledger>(
    custodian: &Custodian<S, L>,
    private_key_hex: &str,
) -> Result<EnrollmentOutput> {
    let private_key = PrivateKey::from_hex(private_key_hex).context("Failed to parse private key")?;
    let enrollment = custodian
        .enroll(private_key)
        .await
        .context("Failed to enroll account")?;
    Ok(enrollment.into())
}

/// Address controlled by a hex private key
///
/// # Errors
/// Returns an error if the key is malformed or not a secp256k1 scalar
pub fn address(private_key_hex: &str) -> Result<AddressOutput> {
    let private_key = PrivateKey::from_hex(private_key_hex).context("Failed to parse private key")?;
    let address = address::derive_address(&private_key).context("Failed to derive address")?;
    Ok(AddressOutput {
        address: address.to_string(),
    })
}

/// Sign `payload` with the account key unlocked by `share`
///
/// # Errors
/// Returns an error if the address or share is invalid, or signing fails
pub async fn sign<S: RecordStore, L: Ledger>(
    custodian: &Custodian<S, L>,
    address: &str,
    share: &str,
    payload: &str,
) -> Result<SignOutput> {
    let address: Address = address.parse().context("Failed to parse address")?;
    let payload = parse_payload(payload)?;
    let hash = custodian
        .sign_transaction(&address, share, &payload)
        .await
        .context("Failed to sign transaction")?;
    Ok(SignOutput {
        address: address.to_string(),
        tx_hash: hash.to_string(),
    })
}

/// Replace the shares of an account
///
/// # Errors
/// Returns an error if the address or share is invalid, or the store fails
pub async fn rekey<S: RecordStore, L: Ledger>(
    custodian: &Custodian<S, L>,
    address: &str,
    share: &str,
) -> Result<EnrollmentOutput> {
    let address: Address = address.parse().context("Failed to parse address")?;
    let enrollment = custodian
        .rekey(&address, share)
        .await
        .context("Failed to re-key account")?;
    Ok(enrollment.into())
}

/// Seal a share under `passphrase`, or under a generated reset code when
/// no passphrase is given
///
/// # Errors
/// Returns an error if the share is malformed or the random source fails
pub fn seal_share(share: &str, passphrase: Option<&str>, code_length: usize) -> Result<SealOutput> {
    let share = SecretShare::decode(share)
        .and_then(|share| share.encode())
        .context("Failed to parse share")?;

    let reset_code = match passphrase {
        Some(_) => None,
        None => Some(sealing::generate_reset_code(code_length).context("Failed to generate reset code")?),
    };
    let passphrase = passphrase.or(reset_code.as_deref()).unwrap_or_default();
    if passphrase.is_empty() {
        anyhow::bail!("Passphrase must not be empty");
    }

    let sealed = sealing::seal_share(&share, passphrase).context("Failed to seal share")?;
    Ok(SealOutput { sealed, reset_code })
}

/// Recover a share sealed by [`seal_share`]
///
/// # Errors
/// Returns an error if the input is not a sealed share or the passphrase is wrong
pub fn unseal_share(sealed_json: &str, passphrase: &str) -> Result<Zeroizing<String>> {
    let sealed: SealedShare =
        serde_json::from_str(sealed_json).context("Failed to parse sealed share")?;
    sealing::unseal_share(&sealed, passphrase).context("Failed to unseal share")
}

/// `0x`-prefixed input is hex, anything else is taken as UTF-8 text
fn parse_payload(payload: &str) -> Result<Vec<u8>> {
    match payload.strip_prefix("0x") {
        Some(digits) => hex::decode(digits).context("Failed to parse hex payload"),
        None => Ok(payload.as_bytes().to_vec()),
    }
}
