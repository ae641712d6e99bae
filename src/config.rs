//! Engine configuration.
//!
//! [`EngineConfig`] bundles the knobs shared by clients and servers:
//! outbound fragmentation, the reassembly limit, the payload queue capacity,
//! and the demand strategy used when consuming inbound streams.

use std::num::NonZeroUsize;

use crate::{flow::RequestStrategy, fragment::FragmentationConfig};

/// Largest logical frame accepted from reassembled fragments (16 MiB).
pub const DEFAULT_MAX_REASSEMBLY_SIZE: NonZeroUsize = non_zero(16 * 1024 * 1024);
/// Default capacity of the payload queue.
pub const DEFAULT_LOW_CAPACITY: usize = 128;

/// Per-connection engine settings.
///
/// # Examples
///
/// ```
/// use rsframe::config::EngineConfig;
///
/// let config = EngineConfig::default().with_frame_budget(1024);
/// assert!(config.fragmentation().is_some());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    fragmentation: Option<FragmentationConfig>,
    max_reassembly_size: NonZeroUsize,
    low_capacity: NonZeroUsize,
    request_strategy: RequestStrategy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fragmentation: None,
            max_reassembly_size: DEFAULT_MAX_REASSEMBLY_SIZE,
            low_capacity: non_zero(DEFAULT_LOW_CAPACITY),
            request_strategy: RequestStrategy::DEFAULT,
        }
    }
}

const fn non_zero(value: usize) -> NonZeroUsize {
    match NonZeroUsize::new(value) {
        Some(value) => value,
        None => NonZeroUsize::MIN,
    }
}

impl EngineConfig {
    /// Fragment outbound request and payload frames with `config`.
    #[must_use]
    pub fn with_fragmentation(mut self, config: FragmentationConfig) -> Self {
        self.fragmentation = Some(config);
        self
    }

    /// Fragment outbound frames so no encoded fragment exceeds `budget`
    /// bytes. Budgets too small for any payload disable fragmentation.
    #[must_use]
    pub fn with_frame_budget(mut self, budget: usize) -> Self {
        self.fragmentation = FragmentationConfig::for_frame_budget(budget);
        self
    }

    /// Upper bound on a reassembled logical frame.
    #[must_use]
    pub fn with_max_reassembly_size(mut self, limit: NonZeroUsize) -> Self {
        self.max_reassembly_size = limit;
        self
    }

    /// Capacity of the payload queue. Control frames are never held back
    /// by it.
    #[must_use]
    pub fn with_queue_capacity(mut self, low: NonZeroUsize) -> Self {
        self.low_capacity = low;
        self
    }

    /// Demand strategy for inbound streams.
    #[must_use]
    pub fn with_request_strategy(mut self, strategy: RequestStrategy) -> Self {
        self.request_strategy = strategy;
        self
    }

    /// Outbound fragmentation, if enabled.
    #[must_use]
    pub fn fragmentation(&self) -> Option<FragmentationConfig> { self.fragmentation }

    /// Reassembly limit in bytes.
    #[must_use]
    pub fn max_reassembly_size(&self) -> NonZeroUsize { self.max_reassembly_size }

    /// Payload queue capacity.
    #[must_use]
    pub fn low_capacity(&self) -> usize { self.low_capacity.get() }

    /// Demand strategy for inbound streams.
    #[must_use]
    pub fn request_strategy(&self) -> RequestStrategy { self.request_strategy }
}
