//! Secret key material
//!
//! Both key types wipe their bytes on drop and print as `[REDACTED]`. Neither
//! implements `Clone`, so a decrypted key has exactly one owner and lives no
//! longer than the scope that produced it.

use k256::ecdsa::SigningKey;
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::error::{CustodyError, Result};

/// Length of the per-account symmetric key (AES-128)
pub const SYMMETRIC_KEY_LEN: usize = 16;

/// Length of a secp256k1 account private key
pub const PRIVATE_KEY_LEN: usize = 32;

/// Raw private key bytes controlling a blockchain account
pub struct PrivateKey(Zeroizing<Vec<u8>>);

impl PrivateKey {
    /// Wraps raw key bytes
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidKey`] if `bytes` is empty
    pub fn from_bytes(bytes: Zeroizing<Vec<u8>>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(CustodyError::InvalidKey("empty key".into()));
        }
        Ok(Self(bytes))
    }

    /// Parses a hex private key, with or without a `0x` prefix
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidKey`] if the input is not hex or is empty
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sharded_custody::keys::PrivateKey;
    ///
    /// let key = PrivateKey::from_hex("0x0101010101010101010101010101010101010101010101010101010101010101").unwrap();
    /// assert_eq!(key.as_bytes().len(), 32);
    ///
    /// assert!(PrivateKey::from_hex("not hex").is_err());
    /// ```
    pub fn from_hex(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map(Zeroizing::new)
            .map_err(|_| CustodyError::InvalidKey("expected hex-encoded bytes".into()))?;
        Self::from_bytes(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hex encoding with `0x` prefix, for handing a key back to its owner
    #[must_use]
    pub fn to_hex(&self) -> Zeroizing<String> {
        let mut digits = Zeroizing::new(vec![0u8; self.0.len() * 2]);
        hex::encode_to_slice(&*self.0, &mut digits)
            .unwrap_or_else(|_| unreachable!("buffer holds two digits per byte"));

        // Exact capacity: a reallocation would leave an unwiped copy behind
        let mut text = Zeroizing::new(String::with_capacity(2 + digits.len()));
        text.push_str("0x");
        text.extend(digits.iter().copied().map(char::from));
        text
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

/// Per-account AES-128 key; never persisted, only split into shares
pub struct SymmetricKey(Zeroizing<[u8; SYMMETRIC_KEY_LEN]>);

impl SymmetricKey {
    /// Builds a key from reconstructed bytes
    ///
    /// # Errors
    /// Returns [`CustodyError::Crypto`] if `bytes` is not exactly 16 bytes long
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
        if bytes.len() != SYMMETRIC_KEY_LEN {
            return Err(CustodyError::Crypto);
        }
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SymmetricKey([REDACTED])")
    }
}

/// Fills `buf` from the operating system CSPRNG
///
/// # Errors
/// Returns [`CustodyError::Fatal`] if the random source fails
pub(crate) fn fill_random(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CustodyError::Fatal(format!("random source failure: {e}")))
}

/// Draws a fresh 128-bit symmetric key
///
/// # Errors
/// Returns [`CustodyError::Fatal`] if the random source fails
pub fn generate_symmetric_key() -> Result<SymmetricKey> {
    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    fill_random(key.as_mut_slice())?;
    Ok(SymmetricKey(key))
}

/// Draws a fresh secp256k1 account key
///
/// Candidates outside the curve order are redrawn.
///
/// # Errors
/// Returns [`CustodyError::Fatal`] if the random source fails
pub fn generate_private_key() -> Result<PrivateKey> {
    loop {
        let mut candidate = Zeroizing::new(vec![0u8; PRIVATE_KEY_LEN]);
        fill_random(&mut candidate)?;
        if SigningKey::from_slice(&candidate).is_ok() {
            return PrivateKey::from_bytes(candidate);
        }
    }
}
