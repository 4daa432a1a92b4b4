//! Property tests for splitting and combining symmetric keys

use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use sharded_custody::CustodyError;
use sharded_custody::domain::{ShareCount, SplitConfig, Threshold};
use sharded_custody::keys::SymmetricKey;
use sharded_custody::sharing::{self, SecretShare};

/// Wrapper for random 128-bit symmetric keys
#[derive(Clone, Debug)]
struct ValidKey([u8; 16]);

impl Arbitrary for ValidKey {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut bytes = [0u8; 16];
        for byte in &mut bytes {
            *byte = u8::arbitrary(g);
        }
        ValidKey(bytes)
    }
}

impl ValidKey {
    fn key(&self) -> SymmetricKey {
        SymmetricKey::from_slice(&self.0).unwrap()
    }
}

/// Wrapper for valid threshold and share count pairs
#[derive(Clone, Copy, Debug)]
struct ValidSplitParams {
    threshold: u8,
    num_shares: u8,
}

impl Arbitrary for ValidSplitParams {
    fn arbitrary(g: &mut Gen) -> Self {
        // Share count between 2 and 20 keeps interpolation cheap
        let num_shares = (u8::arbitrary(g) % 19) + 2; // 2..=20

        // Threshold between 2 and num_shares
        let threshold = (u8::arbitrary(g) % (num_shares - 1)) + 2; // 2..=num_shares

        ValidSplitParams {
            threshold,
            num_shares,
        }
    }
}

impl ValidSplitParams {
    fn config(self) -> SplitConfig {
        SplitConfig::new(
            Threshold::new(self.threshold).unwrap(),
            ShareCount::new(self.num_shares).unwrap(),
        )
        .unwrap()
    }
}

/// Encodes and decodes every share, as if they had been handed out
fn distribute(shares: &[SecretShare]) -> Vec<SecretShare> {
    shares
        .iter()
        .map(|share| SecretShare::decode(share.encode().unwrap().as_str()).unwrap())
        .collect()
}

/// Deterministic shuffle of `0..len` driven by `seed`
fn shuffled_indices(len: usize, mut seed: u64) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..len).collect();
    for i in 0..indices.len() {
        seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let range = u64::try_from(indices.len() - i).unwrap();
        let j = usize::try_from(seed % range).unwrap() + i;
        indices.swap(i, j);
    }
    indices
}

/// Any threshold-sized prefix of the distributed shares recovers the key
#[quickcheck]
fn prop_split_combine_round_trip(key: ValidKey, params: ValidSplitParams) -> bool {
    let Ok(shares) = sharing::split(&key.key(), params.config()) else {
        return false;
    };
    if shares.len() != params.num_shares as usize {
        return false;
    }

    let selected: Vec<_> = distribute(&shares)
        .into_iter()
        .take(params.threshold as usize)
        .collect();

    matches!(sharing::combine(&selected), Ok(recovered) if recovered.as_bytes() == &key.0)
}

/// Any random selection of threshold shares recovers the key
#[quickcheck]
fn prop_random_share_selection_works(
    key: ValidKey,
    params: ValidSplitParams,
    selection_seed: u64,
) -> bool {
    let shares = distribute(&sharing::split(&key.key(), params.config()).unwrap());
    let mut indices = shuffled_indices(shares.len(), selection_seed);
    indices.truncate(params.threshold as usize);

    let mut pool: Vec<Option<SecretShare>> = shares.into_iter().map(Some).collect();
    let selected: Vec<_> = indices.iter().filter_map(|&i| pool[i].take()).collect();

    matches!(sharing::combine(&selected), Ok(recovered) if recovered.as_bytes() == &key.0)
}

/// One share fewer than the threshold is rejected before interpolation
#[quickcheck]
fn prop_insufficient_shares_fail(key: ValidKey, params: ValidSplitParams) -> bool {
    let shares = distribute(&sharing::split(&key.key(), params.config()).unwrap());
    let insufficient: Vec<_> = shares
        .into_iter()
        .take(params.threshold as usize - 1)
        .collect();

    matches!(
        sharing::combine(&insufficient),
        Err(CustodyError::InsufficientShares { required, provided })
            if required == params.threshold && provided == params.threshold as usize - 1
    )
}

/// Duplicating a share never makes up for a missing one
#[quickcheck]
fn prop_duplicates_do_not_count(key: ValidKey, params: ValidSplitParams) -> bool {
    let shares = sharing::split(&key.key(), params.config()).unwrap();
    let repeated: Vec<_> = (0..params.threshold)
        .map(|_| SecretShare::decode(shares[0].encode().unwrap().as_str()).unwrap())
        .collect();

    matches!(
        sharing::combine(&repeated),
        Err(CustodyError::InsufficientShares { provided: 1, .. })
    )
}

/// Threshold and index survive encoding
#[quickcheck]
fn prop_share_metadata_preserved(key: ValidKey, params: ValidSplitParams) -> bool {
    let shares = sharing::split(&key.key(), params.config()).unwrap();

    shares.iter().enumerate().all(|(position, share)| {
        let Ok(encoded) = share.encode() else {
            return false;
        };
        let Ok(decoded) = SecretShare::decode(encoded.as_str()) else {
            return false;
        };
        *decoded.threshold() == params.threshold
            && usize::from(*decoded.index()) == position
            && decoded.index() == share.index()
    })
}

/// Shares from two splits of the same key never combine
#[quickcheck]
fn prop_mixed_splits_rejected(key: ValidKey) -> bool {
    let first = sharing::split(&key.key(), SplitConfig::default()).unwrap();
    let second = sharing::split(&key.key(), SplitConfig::default()).unwrap();
    let mixed = vec![
        SecretShare::decode(first[0].encode().unwrap().as_str()).unwrap(),
        SecretShare::decode(second[1].encode().unwrap().as_str()).unwrap(),
    ];

    matches!(
        sharing::combine(&mixed),
        Err(CustodyError::InconsistentShares)
    )
}
