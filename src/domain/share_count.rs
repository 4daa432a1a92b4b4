//! `ShareCount` newtype for Shamir Secret Sharing

use crate::error::{CustodyError, Result};

/// Number of shares to create (1..=254)
///
/// The maximum is 254 because share indices must stay below the value
/// reserved by the GF(256) field used by blahaj.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ShareCount(u8);

impl ShareCount {
    /// Minimum valid share count
    pub const MIN: u8 = 1;

    /// Maximum valid share count (254)
    pub const MAX: u8 = 254;

    /// One server share plus three distribution shares
    pub const DEFAULT: u8 = 4;

    /// Creates a new share count
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidConfig`] if count is 0 or 255
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sharded_custody::domain::ShareCount;
    ///
    /// let count = ShareCount::new(4).unwrap();
    /// assert_eq!(*count, 4);
    ///
    /// assert!(ShareCount::new(0).is_err());
    /// assert!(ShareCount::new(255).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value < Self::MIN {
            return Err(CustodyError::InvalidConfig(
                "Share count must be at least 1".into(),
            ));
        }
        if value > Self::MAX {
            return Err(CustodyError::InvalidConfig(
                "Share count maximum is 254 due to GF256 limitations".into(),
            ));
        }
        Ok(Self(value))
    }
}

impl Default for ShareCount {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl std::ops::Deref for ShareCount {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
