//! Symmetric encryption of account private keys
//!
//! A private key is encrypted with AES-128-CBC (PKCS#7 padding) under the
//! account's [`SymmetricKey`] and a fresh random IV. The persisted blob is
//!
//! ```text
//! base64( iv (16 bytes) || ciphertext || HMAC-SHA256(mac_key, iv || ciphertext) )
//! ```
//!
//! where `mac_key = HMAC-SHA256(symmetric_key, MAC_KEY_LABEL)`. The tag is
//! checked in constant time before any decryption, so a wrong key or a single
//! flipped byte always fails with [`CustodyError::Crypto`].

use aes::Aes128;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CustodyError, Result};
use crate::keys::{self, PrivateKey, SymmetricKey};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// AES block size, also the IV length
pub const IV_LEN: usize = 16;

/// HMAC-SHA256 output length
pub const TAG_LEN: usize = 32;

const MAC_KEY_LABEL: &[u8] = b"sharded-custody/encrypted-private-key/mac/v1";

/// Base64 blob holding an encrypted private key
///
/// Opaque to storage: nothing about the key or its shares can be read from it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedPrivateKey(String);

impl EncryptedPrivateKey {
    /// Wraps a blob loaded from storage; validity is checked on decryption
    #[must_use]
    pub fn from_encoded(encoded: String) -> Self {
        Self(encoded)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for EncryptedPrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EncryptedPrivateKey({} chars)", self.0.len())
    }
}

/// Encrypts a private key under `key` with a freshly drawn IV
///
/// # Errors
/// Returns [`CustodyError::Fatal`] if the random source fails
pub fn encrypt(private_key: &PrivateKey, key: &SymmetricKey) -> Result<EncryptedPrivateKey> {
    let mut iv = [0u8; IV_LEN];
    keys::fill_random(&mut iv)?;

    let ciphertext = cbc_encrypt(key.as_bytes(), &iv, private_key.as_bytes())?;
    let tag = blob_tag(key, &iv, &ciphertext)?;

    let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len() + TAG_LEN);
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    blob.extend_from_slice(&tag);

    Ok(EncryptedPrivateKey(BASE64.encode(blob)))
}

/// Decrypts a blob produced by [`encrypt`]
///
/// # Errors
/// Returns [`CustodyError::Crypto`] for a wrong key, a malformed blob, or any
/// modification of the stored bytes. The cause is deliberately not reported.
pub fn decrypt(blob: &EncryptedPrivateKey, key: &SymmetricKey) -> Result<PrivateKey> {
    let raw = BASE64.decode(blob.as_str()).map_err(|_| CustodyError::Crypto)?;

    // At least one padded block between IV and tag
    if raw.len() < IV_LEN + IV_LEN + TAG_LEN || (raw.len() - IV_LEN - TAG_LEN) % IV_LEN != 0 {
        return Err(CustodyError::Crypto);
    }

    let (iv, rest) = raw.split_at(IV_LEN);
    let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

    let mut mac = blob_mac(key, iv)?;
    mac.update(ciphertext);
    mac.verify_slice(tag).map_err(|_| CustodyError::Crypto)?;

    let plaintext = cbc_decrypt(key.as_bytes(), iv, ciphertext)?;
    PrivateKey::from_bytes(plaintext).map_err(|_| CustodyError::Crypto)
}

/// AES-128-CBC with PKCS#7 padding
pub(crate) fn cbc_encrypt(key: &[u8], iv: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let encryptor = Aes128CbcEnc::new_from_slices(key, iv).map_err(|_| CustodyError::Crypto)?;
    Ok(encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
}

/// Inverse of [`cbc_encrypt`]; padding errors collapse into [`CustodyError::Crypto`]
pub(crate) fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let decryptor = Aes128CbcDec::new_from_slices(key, iv).map_err(|_| CustodyError::Crypto)?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CustodyError::Crypto)
}

fn blob_mac(key: &SymmetricKey, iv: &[u8]) -> Result<HmacSha256> {
    let mut kdf = HmacSha256::new_from_slice(key.as_bytes()).map_err(|_| CustodyError::Crypto)?;
    kdf.update(MAC_KEY_LABEL);
    let mac_key = Zeroizing::new(kdf.finalize().into_bytes().to_vec());

    let mut mac = HmacSha256::new_from_slice(&mac_key).map_err(|_| CustodyError::Crypto)?;
    mac.update(iv);
    Ok(mac)
}

fn blob_tag(key: &SymmetricKey, iv: &[u8], ciphertext: &[u8]) -> Result<[u8; TAG_LEN]> {
    let mut mac = blob_mac(key, iv)?;
    mac.update(ciphertext);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::generate_symmetric_key;

    fn test_key() -> PrivateKey {
        PrivateKey::from_hex("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318")
            .unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let key = generate_symmetric_key().unwrap();
        let blob = encrypt(&test_key(), &key).unwrap();
        let recovered = decrypt(&blob, &key).unwrap();
        assert_eq!(recovered.as_bytes(), test_key().as_bytes());
    }

    #[test]
    fn test_blob_layout() {
        let key = generate_symmetric_key().unwrap();
        let blob = encrypt(&test_key(), &key).unwrap();
        let raw = BASE64.decode(blob.as_str()).unwrap();
        // 32-byte key pads to 48 bytes of ciphertext
        assert_eq!(raw.len(), IV_LEN + 48 + TAG_LEN);
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let key = generate_symmetric_key().unwrap();
        let first = encrypt(&test_key(), &key).unwrap();
        let second = encrypt(&test_key(), &key).unwrap();
        assert_ne!(first, second);

        let first_raw = BASE64.decode(first.as_str()).unwrap();
        let second_raw = BASE64.decode(second.as_str()).unwrap();
        assert_ne!(first_raw[..IV_LEN], second_raw[..IV_LEN]);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = generate_symmetric_key().unwrap();
        let other = generate_symmetric_key().unwrap();
        let blob = encrypt(&test_key(), &key).unwrap();
        assert!(matches!(decrypt(&blob, &other), Err(CustodyError::Crypto)));
    }

    #[test]
    fn test_every_flipped_byte_is_detected() {
        let key = generate_symmetric_key().unwrap();
        let blob = encrypt(&test_key(), &key).unwrap();
        let raw = BASE64.decode(blob.as_str()).unwrap();

        for position in 0..raw.len() {
            let mut tampered = raw.clone();
            tampered[position] ^= 0x01;
            let tampered = EncryptedPrivateKey::from_encoded(BASE64.encode(tampered));
            assert!(
                matches!(decrypt(&tampered, &key), Err(CustodyError::Crypto)),
                "flip at byte {position} was not detected"
            );
        }
    }

    #[test]
    fn test_truncated_blob_fails() {
        let key = generate_symmetric_key().unwrap();
        let blob = encrypt(&test_key(), &key).unwrap();
        let raw = BASE64.decode(blob.as_str()).unwrap();
        let truncated = EncryptedPrivateKey::from_encoded(BASE64.encode(&raw[..IV_LEN + 8]));
        assert!(matches!(decrypt(&truncated, &key), Err(CustodyError::Crypto)));
    }

    #[test]
    fn test_non_base64_blob_fails() {
        let key = generate_symmetric_key().unwrap();
        let blob = EncryptedPrivateKey::from_encoded("%%% not base64 %%%".into());
        assert!(matches!(decrypt(&blob, &key), Err(CustodyError::Crypto)));
    }
}
