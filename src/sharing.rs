//! Shamir splitting of symmetric keys
//!
//! The account's [`SymmetricKey`] is split, never the private key itself, so
//! signing can decrypt the private key any number of times without touching
//! the shares. Only re-keying produces a new set.
//!
//! Interpolation is done by blahaj over GF(256). Every share carries the
//! threshold, its index and the random tag of the split that produced it, so
//! [`combine`] can reject short or mixed share sets before interpolating
//! instead of returning a plausible but wrong key.

use std::collections::HashSet;

use blahaj::Sharks;
use zeroize::Zeroizing;

use crate::codec::{self, EncodedShare, SPLIT_TAG_LEN};
use crate::domain::{ShareIndex, SplitConfig, Threshold};
use crate::error::{CustodyError, Result};
use crate::keys::{self, SymmetricKey};

/// One share of a split symmetric key
pub struct SecretShare {
    threshold: Threshold,
    index: ShareIndex,
    split_tag: [u8; SPLIT_TAG_LEN],
    /// blahaj share bytes: x coordinate followed by the y values
    payload: Zeroizing<Vec<u8>>,
}

impl SecretShare {
    #[must_use]
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    #[must_use]
    pub fn index(&self) -> ShareIndex {
        self.index
    }

    /// Encodes the share for transport or storage
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidShare`] if the payload cannot be encoded
    pub fn encode(&self) -> Result<EncodedShare> {
        codec::create_share(&self.payload, self.threshold, self.index, self.split_tag)
    }

    /// Decodes a share produced by [`SecretShare::encode`]
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidShare`] for malformed input, or when the
    /// index does not match the polynomial x coordinate inside the payload
    pub fn decode(text: &str) -> Result<Self> {
        let parts = codec::parse_share(text)?;

        if parts.payload.len() < 2 || parts.payload[0] != x_coordinate(parts.index) {
            return Err(CustodyError::InvalidShare(
                "share index does not match share payload".into(),
            ));
        }

        Ok(Self {
            threshold: parts.threshold,
            index: parts.index,
            split_tag: parts.split_tag,
            payload: parts.payload,
        })
    }
}

impl std::fmt::Debug for SecretShare {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretShare")
            .field("threshold", &*self.threshold)
            .field("index", &*self.index)
            .finish_non_exhaustive()
    }
}

/// blahaj evaluates the polynomial at x = 1, 2, ..; index 0 sits at x = 1
fn x_coordinate(index: ShareIndex) -> u8 {
    *index + 1
}

/// Splits `key` into `config.share_count()` shares, any `config.threshold()`
/// of which reconstruct it
///
/// # Errors
/// Returns [`CustodyError::Fatal`] if the random source fails
pub fn split(key: &SymmetricKey, config: SplitConfig) -> Result<Vec<SecretShare>> {
    let threshold = config.threshold();
    let share_count = *config.share_count();

    let mut split_tag = [0u8; SPLIT_TAG_LEN];
    keys::fill_random(&mut split_tag)?;

    let sharks = Sharks(*threshold);
    let dealer = sharks.dealer(key.as_bytes());

    dealer
        .take(usize::from(share_count))
        .map(|share| {
            let payload = Zeroizing::new(Vec::from(&share));
            let x = payload.first().copied().unwrap_or_default();
            let index = ShareIndex::new(x.checked_sub(1).ok_or_else(|| {
                CustodyError::Fatal("dealer produced a share at x = 0".into())
            })?)?;
            Ok(SecretShare {
                threshold,
                index,
                split_tag,
                payload,
            })
        })
        .collect()
}

/// Reconstructs the symmetric key from at least `threshold` distinct shares
///
/// When the same index appears more than once only its first occurrence is
/// used; payloads are never compared against each other.
///
/// # Errors
/// - [`CustodyError::InsufficientShares`] if fewer distinct indices than the
///   threshold are supplied
/// - [`CustodyError::InconsistentShares`] if shares disagree on threshold,
///   split tag or length
/// - [`CustodyError::InvalidShare`] if interpolation does not yield a key
pub fn combine(shares: &[SecretShare]) -> Result<SymmetricKey> {
    let Some(first) = shares.first() else {
        return Err(CustodyError::InsufficientShares {
            required: Threshold::DEFAULT,
            provided: 0,
        });
    };

    let threshold = first.threshold;
    let mut seen = HashSet::new();
    let mut selected = Vec::with_capacity(shares.len());

    for share in shares {
        if share.threshold != threshold
            || share.split_tag != first.split_tag
            || share.payload.len() != first.payload.len()
        {
            return Err(CustodyError::InconsistentShares);
        }
        if seen.insert(share.index) {
            selected.push(share);
        }
    }

    if selected.len() < usize::from(*threshold) {
        return Err(CustodyError::InsufficientShares {
            required: *threshold,
            provided: selected.len(),
        });
    }

    let points = selected
        .iter()
        .map(|share| {
            blahaj::Share::try_from(share.payload.as_slice())
                .map_err(|_| CustodyError::InvalidShare("unreadable share payload".into()))
        })
        .collect::<Result<Vec<_>>>()?;

    let recovered = Zeroizing::new(
        Sharks(*threshold)
            .recover(&points)
            .map_err(|_| CustodyError::InvalidShare("shares do not interpolate".into()))?,
    );

    SymmetricKey::from_slice(&recovered)
        .map_err(|_| CustodyError::InvalidShare("reconstructed key has the wrong length".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ShareCount;
    use crate::keys::generate_symmetric_key;

    fn config(threshold: u8, shares: u8) -> SplitConfig {
        SplitConfig::new(
            Threshold::new(threshold).unwrap(),
            ShareCount::new(shares).unwrap(),
        )
        .unwrap()
    }

    fn pick(shares: &[SecretShare], indices: &[usize]) -> Vec<SecretShare> {
        indices
            .iter()
            .map(|&i| SecretShare::decode(shares[i].encode().unwrap().as_str()).unwrap())
            .collect()
    }

    #[test]
    fn test_two_of_four_any_pair_reconstructs() {
        let key = generate_symmetric_key().unwrap();
        let shares = split(&key, SplitConfig::default()).unwrap();
        assert_eq!(shares.len(), 4);

        let encoded: HashSet<String> = shares
            .iter()
            .map(|s| s.encode().unwrap().as_str().to_owned())
            .collect();
        assert_eq!(encoded.len(), 4, "shares must be distinct");

        for pair in [[0, 2], [1, 3], [0, 3], [0, 1], [1, 2], [2, 3]] {
            let recovered = combine(&pick(&shares, &pair)).unwrap();
            assert_eq!(recovered.as_bytes(), key.as_bytes(), "pair {pair:?}");
        }
    }

    #[test]
    fn test_indices_follow_split_order() {
        let key = generate_symmetric_key().unwrap();
        let shares = split(&key, config(3, 5)).unwrap();
        let indices: Vec<u8> = shares.iter().map(|s| *s.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(shares[0].index(), ShareIndex::new(0).unwrap());
    }

    #[test]
    fn test_single_share_is_insufficient() {
        let key = generate_symmetric_key().unwrap();
        let shares = split(&key, SplitConfig::default()).unwrap();
        let err = combine(&pick(&shares, &[1])).unwrap_err();
        assert!(matches!(
            err,
            CustodyError::InsufficientShares {
                required: 2,
                provided: 1
            }
        ));
    }

    #[test]
    fn test_duplicate_indices_do_not_count_twice() {
        let key = generate_symmetric_key().unwrap();
        let shares = split(&key, SplitConfig::default()).unwrap();
        let err = combine(&pick(&shares, &[2, 2])).unwrap_err();
        assert!(matches!(err, CustodyError::InsufficientShares { .. }));
    }

    #[test]
    fn test_no_shares_is_insufficient() {
        assert!(matches!(
            combine(&[]),
            Err(CustodyError::InsufficientShares { provided: 0, .. })
        ));
    }

    #[test]
    fn test_shares_from_different_splits_rejected() {
        let key = generate_symmetric_key().unwrap();
        let first = split(&key, SplitConfig::default()).unwrap();
        let second = split(&key, SplitConfig::default()).unwrap();

        let mixed = vec![
            SecretShare::decode(first[0].encode().unwrap().as_str()).unwrap(),
            SecretShare::decode(second[1].encode().unwrap().as_str()).unwrap(),
        ];
        assert!(matches!(
            combine(&mixed),
            Err(CustodyError::InconsistentShares)
        ));
    }

    #[test]
    fn test_index_survives_encoding() {
        let key = generate_symmetric_key().unwrap();
        let shares = split(&key, config(2, 6)).unwrap();
        for share in &shares {
            let decoded = SecretShare::decode(share.encode().unwrap().as_str()).unwrap();
            assert_eq!(decoded.index(), share.index());
            assert_eq!(decoded.threshold(), share.threshold());
        }
    }

    #[test]
    fn test_relabelled_index_rejected() {
        let key = generate_symmetric_key().unwrap();
        let shares = split(&key, SplitConfig::default()).unwrap();
        let share = &shares[1];

        let forged = codec::create_share(
            &share.payload,
            share.threshold,
            ShareIndex::new(3).unwrap(),
            share.split_tag,
        )
        .unwrap();
        assert!(matches!(
            SecretShare::decode(forged.as_str()),
            Err(CustodyError::InvalidShare(_))
        ));
    }
}
