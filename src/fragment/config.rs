//! Configuration used by fragmentation.

use std::num::NonZeroUsize;

use crate::frame::HEADER_SIZE;

/// Worst-case bytes a fragment adds on top of its metadata and data: the
/// frame header, an initial request-n and the metadata length prefix.
pub const FRAGMENT_OVERHEAD: usize = HEADER_SIZE + 4 + 3;

/// Settings that bound fragment sizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FragmentationConfig {
    /// Maximum number of metadata plus data bytes carried by one fragment.
    pub fragment_size: NonZeroUsize,
}

impl FragmentationConfig {
    /// Fragment payloads larger than `fragment_size` bytes.
    #[must_use]
    pub const fn new(fragment_size: NonZeroUsize) -> Self { Self { fragment_size } }

    /// Derive a configuration from the largest frame body the transport
    /// accepts.
    ///
    /// Returns `None` when the budget cannot accommodate the fixed overhead.
    ///
    /// # Examples
    ///
    /// ```
    /// use rsframe::fragment::{FragmentationConfig, config::FRAGMENT_OVERHEAD};
    ///
    /// let config = FragmentationConfig::for_frame_budget(1024).expect("budget is large enough");
    /// assert_eq!(config.fragment_size.get(), 1024 - FRAGMENT_OVERHEAD);
    /// assert!(FragmentationConfig::for_frame_budget(FRAGMENT_OVERHEAD).is_none());
    /// ```
    #[must_use]
    pub fn for_frame_budget(frame_budget: usize) -> Option<Self> {
        let available = frame_budget.checked_sub(FRAGMENT_OVERHEAD)?;
        Some(Self::new(NonZeroUsize::new(available)?))
    }

    /// Largest encoded fragment body this configuration produces.
    #[must_use]
    pub fn encoded_fragment_ceiling(&self) -> usize { self.fragment_size.get() + FRAGMENT_OVERHEAD }
}
