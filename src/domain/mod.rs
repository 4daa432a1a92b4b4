//! Validated configuration types for threshold custody
//!
//! - [`Threshold`] - Minimum shares required for reconstruction (2..=255)
//! - [`ShareIndex`] - Position of a share within one split (0..=254)
//! - [`ShareCount`] - Total number of shares produced by a split (1..=254)
//! - [`SplitConfig`] - Validated threshold and share count pair
//! - [`CustodyConfig`] - Split parameters plus store call timeout

mod config;
mod share_count;
mod share_index;
mod threshold;

pub use config::{CustodyConfig, SplitConfig};
pub use share_count::ShareCount;
pub use share_index::ShareIndex;
pub use threshold::Threshold;
