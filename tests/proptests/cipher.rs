//! Property tests for private key encryption

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use sharded_custody::CustodyError;
use sharded_custody::cipher::{self, EncryptedPrivateKey};
use sharded_custody::keys::{PrivateKey, SymmetricKey};
use zeroize::Zeroizing;

/// Wrapper for non-empty private key bytes of varying length
#[derive(Clone, Debug)]
struct KeyBytes(Vec<u8>);

impl Arbitrary for KeyBytes {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = (usize::arbitrary(g) % 64) + 1; // 1..=64
        KeyBytes((0..len).map(|_| u8::arbitrary(g)).collect())
    }
}

impl KeyBytes {
    fn key(&self) -> PrivateKey {
        PrivateKey::from_bytes(Zeroizing::new(self.0.clone())).unwrap()
    }
}

fn symmetric_key(g: &[u8; 16]) -> SymmetricKey {
    SymmetricKey::from_slice(g).unwrap()
}

/// Decrypting with the encryption key returns the original bytes
#[quickcheck]
fn prop_encrypt_decrypt_round_trip(private_key: KeyBytes, key: (u64, u64)) -> bool {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&key.0.to_be_bytes());
    bytes[8..].copy_from_slice(&key.1.to_be_bytes());
    let key = symmetric_key(&bytes);

    let Ok(blob) = cipher::encrypt(&private_key.key(), &key) else {
        return false;
    };
    matches!(cipher::decrypt(&blob, &key), Ok(recovered) if recovered.as_bytes() == private_key.0)
}

/// Any single flipped bit in the stored blob is reported as a crypto failure
#[quickcheck]
fn prop_tampering_detected(private_key: KeyBytes, position: usize, bit: u8) -> bool {
    let key = symmetric_key(&[0x5A; 16]);
    let blob = cipher::encrypt(&private_key.key(), &key).unwrap();
    let mut raw = BASE64.decode(blob.as_str()).unwrap();

    let position = position % raw.len();
    raw[position] ^= 1 << (bit % 8);
    let tampered = EncryptedPrivateKey::from_encoded(BASE64.encode(raw));

    matches!(cipher::decrypt(&tampered, &key), Err(CustodyError::Crypto))
}

/// A different key never decrypts
#[quickcheck]
fn prop_wrong_key_rejected(private_key: KeyBytes, flip: usize) -> bool {
    let key = [0x33; 16];
    let mut other = key;
    other[flip % 16] ^= 0x80;

    let blob = cipher::encrypt(&private_key.key(), &symmetric_key(&key)).unwrap();
    matches!(
        cipher::decrypt(&blob, &symmetric_key(&other)),
        Err(CustodyError::Crypto)
    )
}
