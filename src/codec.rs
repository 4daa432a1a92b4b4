//! Wire format for secret shares
//!
//! A share travels as a single opaque string. The underlying bytes are
//!
//! ```text
//! version (1) || threshold (1) || index (1) || split tag (8)
//!     || payload length (2, big endian) || payload || CRC32 (4, big endian)
//! ```
//!
//! The CRC covers every byte before it. Shares are emitted as lowercase hex;
//! parsing also accepts a `0x` prefix or standard base64 so callers can pass
//! shares through whatever transport encoding they already use.
//!
//! Index and split tag are part of the signed-off bytes, so a share never
//! loses its position in the polynomial or the identity of the split that
//! produced it, however it is stored.
//!
//! # Examples
//!
//! ```rust
//! use sharded_custody::codec::{create_share, parse_share};
//! use sharded_custody::domain::{ShareIndex, Threshold};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let payload = vec![0x01, 0xDE, 0xAD, 0xBE, 0xEF];
//! let encoded = create_share(&payload, Threshold::new(2)?, ShareIndex::new(1)?, [7u8; 8])?;
//!
//! let parts = parse_share(encoded.as_str())?;
//! assert_eq!(*parts.threshold, 2);
//! assert_eq!(*parts.index, 1);
//! assert_eq!(parts.split_tag, [7u8; 8]);
//! assert_eq!(*parts.payload, payload);
//! # Ok(())
//! # }
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use crc::{CRC_32_ISO_HDLC, Crc};
use zeroize::Zeroizing;

use crate::domain::{ShareIndex, Threshold};
use crate::error::{CustodyError, Result};

/// CRC32 algorithm for share integrity checking
const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Current share format version
pub const SHARE_FORMAT_VERSION: u8 = 1;

/// Length of the random tag identifying one split operation
pub const SPLIT_TAG_LEN: usize = 8;

/// version + threshold + index + split tag + length
const HEADER_LEN: usize = 3 + SPLIT_TAG_LEN + 2;
const CHECKSUM_LEN: usize = 4;

/// A share encoded for transport or storage
///
/// Wraps the string in `Zeroizing` so it is wiped when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedShare(Zeroizing<String>);

impl EncodedShare {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EncodedShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Debug for EncodedShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncodedShare([REDACTED])")
    }
}

/// Decoded fields of a share
pub struct ShareParts {
    pub threshold: Threshold,
    pub index: ShareIndex,
    pub split_tag: [u8; SPLIT_TAG_LEN],
    pub payload: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for ShareParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareParts")
            .field("threshold", &*self.threshold)
            .field("index", &*self.index)
            .finish_non_exhaustive()
    }
}

/// Encodes share payload bytes with their metadata
///
/// # Errors
/// Returns [`CustodyError::InvalidShare`] if the payload is empty or longer
/// than 65535 bytes
pub fn create_share(
    payload: &[u8],
    threshold: Threshold,
    index: ShareIndex,
    split_tag: [u8; SPLIT_TAG_LEN],
) -> Result<EncodedShare> {
    if payload.is_empty() {
        return Err(CustodyError::InvalidShare("empty share payload".into()));
    }
    let length = u16::try_from(payload.len()).map_err(|_| {
        CustodyError::InvalidShare(format!(
            "share payload too large: {} bytes (max 65535)",
            payload.len()
        ))
    })?;

    let mut bytes = Zeroizing::new(Vec::with_capacity(HEADER_LEN + payload.len() + CHECKSUM_LEN));
    bytes.push(SHARE_FORMAT_VERSION);
    bytes.push(*threshold);
    bytes.push(*index);
    bytes.extend_from_slice(&split_tag);
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.extend_from_slice(payload);

    let checksum = CRC32.checksum(&bytes);
    bytes.extend_from_slice(&checksum.to_be_bytes());

    Ok(EncodedShare(Zeroizing::new(hex::encode(&*bytes))))
}

/// Parses a share produced by [`create_share`]
///
/// Every failure is reported as [`CustodyError::InvalidShare`] before any
/// cryptographic work happens.
///
/// # Errors
/// Returns [`CustodyError::InvalidShare`] if the text is neither hex nor
/// base64, the version is unknown, lengths disagree, or the checksum fails
pub fn parse_share(text: &str) -> Result<ShareParts> {
    let bytes = decode_text(text)?;

    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(invalid(format!(
            "share too short: need at least {} bytes, got {}",
            HEADER_LEN + CHECKSUM_LEN,
            bytes.len()
        )));
    }

    if bytes[0] != SHARE_FORMAT_VERSION {
        return Err(invalid(format!(
            "unsupported share format version {}",
            bytes[0]
        )));
    }

    let body_len = bytes.len() - CHECKSUM_LEN;
    let (body, checksum_bytes) = bytes.split_at(body_len);
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(checksum_bytes);
    if CRC32.checksum(body) != u32::from_be_bytes(checksum) {
        return Err(invalid("checksum verification failed".into()));
    }

    let threshold = Threshold::new(body[1]).map_err(|_| invalid("threshold below 2".into()))?;
    let index = ShareIndex::new(body[2])?;

    let mut split_tag = [0u8; SPLIT_TAG_LEN];
    split_tag.copy_from_slice(&body[3..3 + SPLIT_TAG_LEN]);

    let length = usize::from(u16::from_be_bytes([
        body[3 + SPLIT_TAG_LEN],
        body[4 + SPLIT_TAG_LEN],
    ]));
    let payload = &body[HEADER_LEN..];
    if length == 0 || payload.len() != length {
        return Err(invalid(format!(
            "payload length mismatch: header says {length}, found {}",
            payload.len()
        )));
    }

    Ok(ShareParts {
        threshold,
        index,
        split_tag,
        payload: Zeroizing::new(payload.to_vec()),
    })
}

/// Hex (optionally `0x`-prefixed) first, base64 otherwise
fn decode_text(text: &str) -> Result<Zeroizing<Vec<u8>>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty share".into()));
    }

    let hex_digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex_digits.len() % 2 == 0 && hex_digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return hex::decode(hex_digits)
            .map(Zeroizing::new)
            .map_err(|_| invalid("malformed hex".into()));
    }

    BASE64
        .decode(trimmed)
        .map(Zeroizing::new)
        .map_err(|_| invalid("share is neither hex nor base64".into()))
}

fn invalid(reason: String) -> CustodyError {
    CustodyError::InvalidShare(reason)
}
