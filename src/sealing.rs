//! Passphrase sealing of distribution shares
//!
//! A holder who does not want to keep a share in the clear can seal it under
//! a passphrase: PBKDF2-HMAC-SHA256 (100 000 iterations, random 16-byte salt)
//! derives an AES-128 key that encrypts the encoded share in CBC mode.
//!
//! Sealing sits outside enrollment, use and re-keying; the custodian only
//! ever sees unsealed shares.

use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::{self, IV_LEN};
use crate::codec::{self, EncodedShare};
use crate::error::{CustodyError, Result};
use crate::keys::{self, SYMMETRIC_KEY_LEN};

/// PBKDF2 iteration count
pub const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

const RESET_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// A share encrypted under a passphrase; all fields are hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedShare {
    pub salt: String,
    pub iv: String,
    pub ciphertext: String,
}

/// Seals an encoded share under `passphrase`
///
/// # Errors
/// Returns [`CustodyError::Fatal`] if the random source fails
pub fn seal_share(share: &EncodedShare, passphrase: &str) -> Result<SealedShare> {
    let mut salt = [0u8; SALT_LEN];
    let mut iv = [0u8; IV_LEN];
    keys::fill_random(&mut salt)?;
    keys::fill_random(&mut iv)?;

    let key = derive_key(passphrase, &salt);
    let ciphertext = cipher::cbc_encrypt(key.as_slice(), &iv, share.as_str().as_bytes())?;

    Ok(SealedShare {
        salt: hex::encode(salt),
        iv: hex::encode(iv),
        ciphertext: hex::encode(ciphertext),
    })
}

/// Recovers a share sealed by [`seal_share`]
///
/// The result is validated as a share before it is returned, so a wrong
/// passphrase cannot produce garbage that looks like one.
///
/// # Errors
/// Returns [`CustodyError::Crypto`] for a wrong passphrase or damaged input
pub fn unseal_share(sealed: &SealedShare, passphrase: &str) -> Result<Zeroizing<String>> {
    let salt = hex::decode(&sealed.salt).map_err(|_| CustodyError::Crypto)?;
    let iv = hex::decode(&sealed.iv).map_err(|_| CustodyError::Crypto)?;
    let ciphertext = hex::decode(&sealed.ciphertext).map_err(|_| CustodyError::Crypto)?;
    if salt.len() != SALT_LEN || iv.len() != IV_LEN {
        return Err(CustodyError::Crypto);
    }

    let key = derive_key(passphrase, &salt);
    let plaintext = cipher::cbc_decrypt(key.as_slice(), &iv, &ciphertext)?;
    let text = Zeroizing::new(
        String::from_utf8(plaintext.to_vec()).map_err(|_| CustodyError::Crypto)?,
    );

    codec::parse_share(&text).map_err(|_| CustodyError::Crypto)?;
    Ok(text)
}

/// Random alphanumeric code, e.g. to hand out as a sealing passphrase
///
/// # Errors
/// Returns [`CustodyError::Fatal`] if the random source fails
pub fn generate_reset_code(length: usize) -> Result<String> {
    // Largest multiple of the alphabet size that fits in a byte; bytes at or
    // above it are redrawn so every character is equally likely.
    let limit = 256 - (256 % RESET_CODE_ALPHABET.len());
    let mut code = String::with_capacity(length);
    let mut byte = [0u8; 1];

    while code.len() < length {
        keys::fill_random(&mut byte)?;
        let value = usize::from(byte[0]);
        if value < limit {
            code.push(char::from(RESET_CODE_ALPHABET[value % RESET_CODE_ALPHABET.len()]));
        }
    }
    Ok(code)
}

fn derive_key(passphrase: &str, salt: &[u8]) -> Zeroizing<[u8; SYMMETRIC_KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), salt, PBKDF2_ITERATIONS, key.as_mut_slice());
    key
}
