//! Configuration for splits and custody operations

use std::time::Duration;

use super::{ShareCount, Threshold};
use crate::error::{CustodyError, Result};

/// Validated pair of threshold and share count
///
/// Enforces the invariant that threshold <= `share_count` at the type level.
/// This prevents creating configurations where more shares are required
/// than actually exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitConfig {
    threshold: Threshold,
    share_count: ShareCount,
}

impl SplitConfig {
    /// Creates a new split configuration
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidConfig`] if threshold exceeds share count
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sharded_custody::domain::{SplitConfig, Threshold, ShareCount};
    ///
    /// let config = SplitConfig::new(
    ///     Threshold::new(3).unwrap(),
    ///     ShareCount::new(5).unwrap()
    /// ).unwrap();
    ///
    /// assert_eq!(*config.threshold(), 3);
    /// assert_eq!(*config.share_count(), 5);
    ///
    /// let result = SplitConfig::new(
    ///     Threshold::new(5).unwrap(),
    ///     ShareCount::new(3).unwrap()
    /// );
    /// assert!(result.is_err());
    /// ```
    pub fn new(threshold: Threshold, share_count: ShareCount) -> Result<Self> {
        if *threshold > *share_count {
            return Err(CustodyError::InvalidConfig(format!(
                "Threshold {} cannot exceed share count {}",
                *threshold, *share_count
            )));
        }
        Ok(Self {
            threshold,
            share_count,
        })
    }

    /// Gets the threshold value
    #[must_use]
    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    /// Gets the share count value
    #[must_use]
    pub fn share_count(&self) -> ShareCount {
        self.share_count
    }
}

/// 2-of-4: one server share, three distribution shares
impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            threshold: Threshold::default(),
            share_count: ShareCount::default(),
        }
    }
}

/// Settings for a [`Custodian`](crate::custodian::Custodian)
///
/// Custody reconstructs keys from the server share plus one caller share, so
/// the threshold is always 2; only the number of shares varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustodyConfig {
    split: SplitConfig,
    store_timeout: Duration,
}

impl CustodyConfig {
    /// Default deadline for a single record store call
    pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Creates a custody configuration
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidConfig`] if fewer than two shares are
    /// requested or the timeout is zero
    pub fn new(share_count: ShareCount, store_timeout: Duration) -> Result<Self> {
        let split = SplitConfig::new(Threshold::default(), share_count)?;
        if store_timeout.is_zero() {
            return Err(CustodyError::InvalidConfig(
                "store timeout must be greater than zero".into(),
            ));
        }
        Ok(Self {
            split,
            store_timeout,
        })
    }

    #[must_use]
    pub fn split(&self) -> SplitConfig {
        self.split
    }

    #[must_use]
    pub fn store_timeout(&self) -> Duration {
        self.store_timeout
    }
}

impl Default for CustodyConfig {
    fn default() -> Self {
        Self {
            split: SplitConfig::default(),
            store_timeout: Self::DEFAULT_STORE_TIMEOUT,
        }
    }
}
