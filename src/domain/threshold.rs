//! Threshold newtype for Shamir Secret Sharing

use crate::error::{CustodyError, Result};

/// Threshold for Shamir Secret Sharing (2..=255)
///
/// Invariant: threshold >= 2 (enforced at construction).
/// A threshold of 1 would let any single share, including the server's own,
/// recover the symmetric key on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Threshold(u8);

impl Threshold {
    /// Threshold used for account enrollment unless configured otherwise
    pub const DEFAULT: u8 = 2;

    /// Creates a new threshold
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidConfig`] if the threshold is less than 2
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sharded_custody::domain::Threshold;
    ///
    /// let threshold = Threshold::new(3).unwrap();
    /// assert_eq!(*threshold, 3);
    ///
    /// assert!(Threshold::new(1).is_err());
    /// assert!(Threshold::new(0).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value < 2 {
            return Err(CustodyError::InvalidConfig(format!(
                "Threshold must be at least 2 (got {value})"
            )));
        }
        Ok(Self(value))
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl std::ops::Deref for Threshold {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
