//! Account addresses
//!
//! An address is the last 20 bytes of the Keccak-256 hash of the account's
//! uncompressed secp256k1 public key (without the `0x04` prefix).

use std::str::FromStr;

use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

use crate::error::{CustodyError, Result};
use crate::keys::PrivateKey;

/// Address length in bytes
pub const ADDRESS_LEN: usize = 20;

/// A 20-byte account address
///
/// Parsing ignores hex case, so checksummed and lowercase spellings of the
/// same address compare equal. Displays as lowercase `0x` hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    #[must_use]
    pub fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = CustodyError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|_| CustodyError::InvalidAddress(format!("'{trimmed}' is not hex")))?;
        let bytes: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            CustodyError::InvalidAddress(format!("'{trimmed}' is not {ADDRESS_LEN} bytes"))
        })?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for Address {
    type Error = CustodyError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Loads a private key as a secp256k1 signing key
///
/// # Errors
/// Returns [`CustodyError::InvalidKey`] if the bytes are not a valid scalar
pub(crate) fn signing_key(key: &PrivateKey) -> Result<SigningKey> {
    SigningKey::from_slice(key.as_bytes())
        .map_err(|_| CustodyError::InvalidKey("not a secp256k1 private key".into()))
}

/// Derives the account address controlled by `key`
///
/// # Errors
/// Returns [`CustodyError::InvalidKey`] if the bytes are not a valid scalar
pub fn derive_address(key: &PrivateKey) -> Result<Address> {
    let signing_key = signing_key(key)?;
    let public = k256::PublicKey::from(signing_key.verifying_key()).to_encoded_point(false);
    let digest = Keccak256::digest(&public.as_bytes()[1..]);

    let mut address = [0u8; ADDRESS_LEN];
    address.copy_from_slice(&digest[digest.len() - ADDRESS_LEN..]);
    Ok(Address(address))
}
