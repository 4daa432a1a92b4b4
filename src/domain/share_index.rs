//! `ShareIndex` newtype for Shamir Secret Sharing

use crate::error::{CustodyError, Result};

/// Position of a share within its split (0..=254)
///
/// Index 0 is always the server share; 1.. are distribution shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShareIndex(u8);

impl ShareIndex {
    /// Index of the share persisted alongside the encrypted private key
    pub const SERVER: ShareIndex = ShareIndex(0);

    /// Maximum valid share index (254)
    pub const MAX: u8 = 254;

    /// Creates a new share index
    ///
    /// # Errors
    /// Returns [`CustodyError::InvalidShare`] if index is 255
    ///
    /// # Examples
    ///
    /// ```rust
    /// use sharded_custody::domain::ShareIndex;
    ///
    /// let index = ShareIndex::new(0).unwrap();
    /// assert_eq!(index, ShareIndex::SERVER);
    ///
    /// assert!(ShareIndex::new(255).is_err());
    /// ```
    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX {
            return Err(CustodyError::InvalidShare(
                "share index 255 is reserved".into(),
            ));
        }
        Ok(Self(value))
    }
}

impl std::ops::Deref for ShareIndex {
    type Target = u8;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
