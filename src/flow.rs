//! Credit-based flow control.
//!
//! [`Credit`] is the pure counter: granted by REQUEST_N (or the initial
//! request-n), consumed by each PAYLOAD(NEXT). [`CreditGate`] shares a counter
//! between the reader loop, which grants, and a producer task, which waits
//! for credit before emitting. [`RequestStrategy`] decides how much demand a
//! consumer signals and when.

use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::frame::MAX_REQUEST_N;

/// Attempt to consume more credit than is available.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("flow control violation: requested {requested}, available {available}")]
pub struct FlowControlError {
    /// Units the caller tried to consume.
    pub requested: u32,
    /// Units that were available.
    pub available: u32,
}

/// Outstanding demand for one stream direction.
///
/// The counter never goes negative and saturates at [`MAX_REQUEST_N`].
///
/// # Examples
///
/// ```
/// use rsframe::flow::Credit;
///
/// let mut credit = Credit::new(2);
/// credit.consume(1).expect("one unit available");
/// credit.grant(u32::MAX);
/// assert_eq!(credit.available(), 0x7FFF_FFFF);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Credit {
    available: u32,
}

impl Credit {
    /// Start with `initial` units, saturating at [`MAX_REQUEST_N`].
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self {
            available: initial.min(MAX_REQUEST_N),
        }
    }

    /// Units currently available.
    #[must_use]
    pub fn available(&self) -> u32 { self.available }

    /// Whether no units are available.
    #[must_use]
    pub fn is_exhausted(&self) -> bool { self.available == 0 }

    /// Add `n` units; zero is ignored.
    pub fn grant(&mut self, n: u32) {
        self.available = self.available.saturating_add(n).min(MAX_REQUEST_N);
    }

    /// Remove `n` units.
    ///
    /// # Errors
    ///
    /// Returns [`FlowControlError`] when `n` exceeds the available units; the
    /// counter is left unchanged.
    pub fn consume(&mut self, n: u32) -> Result<(), FlowControlError> {
        self.available = self
            .available
            .checked_sub(n)
            .ok_or(FlowControlError {
                requested: n,
                available: self.available,
            })?;
        Ok(())
    }
}

/// Shared credit a producer waits on.
#[derive(Debug, Default)]
pub struct CreditGate {
    credit: Mutex<Credit>,
    notify: Notify,
}

impl CreditGate {
    /// Gate holding `initial` units.
    #[must_use]
    pub fn new(initial: u32) -> Self {
        Self {
            credit: Mutex::new(Credit::new(initial)),
            notify: Notify::new(),
        }
    }

    /// Add units and wake a waiting producer.
    pub fn grant(&self, n: u32) {
        if n == 0 {
            return;
        }
        self.with_credit(|credit| credit.grant(n));
        self.notify.notify_one();
    }

    /// Units currently available.
    #[must_use]
    pub fn available(&self) -> u32 { self.with_credit(|credit| credit.available()) }

    /// Take one unit without waiting.
    #[must_use]
    pub fn try_acquire(&self) -> bool { self.with_credit(|credit| credit.consume(1).is_ok()) }

    /// Wait for one unit of credit.
    ///
    /// Returns `false` if `cancel` fired before credit became available.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.try_acquire() {
                return true;
            }
            tokio::select! {
                biased;
                () = cancel.cancelled() => return false,
                () = &mut notified => {}
            }
        }
    }

    fn with_credit<R>(&self, f: impl FnOnce(&mut Credit) -> R) -> R {
        let mut guard = self
            .credit
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut guard)
    }
}

/// How a consumer signals demand.
///
/// `prefetch(request_size, request_on)` requests `request_size` up front and
/// another `request_size` whenever only `request_on` of the previous demand
/// remain unconsumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequestStrategy {
    request_size: u32,
    request_on: u32,
}

/// Invalid [`RequestStrategy`] parameters.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("request strategy needs request_size > request_on, got {request_size} and {request_on}")]
pub struct InvalidRequestStrategy {
    /// Requested batch size.
    pub request_size: u32,
    /// Refill threshold.
    pub request_on: u32,
}

impl RequestStrategy {
    /// Default prefetch of 64 refilled when 16 remain.
    pub const DEFAULT: Self = Self {
        request_size: 64,
        request_on: 16,
    };

    /// Build a prefetch strategy.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRequestStrategy`] unless
    /// `request_size > request_on >= 0` and `request_size` fits in 31 bits.
    pub fn prefetch(request_size: u32, request_on: u32) -> Result<Self, InvalidRequestStrategy> {
        if request_size <= request_on || request_size > MAX_REQUEST_N {
            return Err(InvalidRequestStrategy {
                request_size,
                request_on,
            });
        }
        Ok(Self {
            request_size,
            request_on,
        })
    }

    /// Start tracking demand for one stream.
    #[must_use]
    pub fn start(self) -> DemandTracker {
        DemandTracker {
            strategy: self,
            requested: self.request_size,
        }
    }
}

impl Default for RequestStrategy {
    fn default() -> Self { Self::DEFAULT }
}

/// Per-stream state of a [`RequestStrategy`].
#[derive(Clone, Copy, Debug)]
pub struct DemandTracker {
    strategy: RequestStrategy,
    requested: u32,
}

impl DemandTracker {
    /// Demand to send with the request frame.
    #[must_use]
    pub fn first_request(&self) -> u32 { self.strategy.request_size }

    /// Record one consumed element; returns the REQUEST_N to send, if any.
    pub fn next_request(&mut self) -> Option<u32> {
        self.requested = self.requested.saturating_sub(1);
        if self.requested != self.strategy.request_on {
            return None;
        }
        self.requested = self.requested.saturating_add(self.strategy.request_size);
        Some(self.strategy.request_size)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use proptest::{prop_assert, prop_assert_eq};
    use rstest::rstest;
    use tokio_util::sync::CancellationToken;

    use super::{Credit, CreditGate, FlowControlError, RequestStrategy};
    use crate::{frame::MAX_REQUEST_N, test_helpers::deterministic_runner};

    #[test]
    fn consume_beyond_available_fails_without_change() {
        let mut credit = Credit::new(1);
        assert_eq!(
            credit.consume(2),
            Err(FlowControlError {
                requested: 2,
                available: 1
            })
        );
        assert_eq!(credit.available(), 1);
    }

    #[test]
    fn credit_stays_within_bounds_under_any_operations() {
        let mut runner = deterministic_runner(128);
        let ops = proptest::collection::vec((proptest::bool::ANY, 0u32..=u32::MAX), 0..64);
        runner
            .run(&ops, |ops| {
                let mut credit = Credit::default();
                let mut model: u64 = 0;
                for (grant, n) in ops {
                    if grant {
                        credit.grant(n);
                        model = (model + u64::from(n)).min(u64::from(MAX_REQUEST_N));
                    } else if credit.consume(n).is_ok() {
                        model -= u64::from(n);
                    }
                    prop_assert!(credit.available() <= MAX_REQUEST_N);
                    prop_assert_eq!(u64::from(credit.available()), model);
                }
                Ok(())
            })
            .expect("credit invariant should hold");
    }

    #[rstest]
    #[case(64, 16, true)]
    #[case(1, 0, true)]
    #[case(16, 16, false)]
    #[case(8, 16, false)]
    #[case(0x8000_0000, 1, false)]
    fn prefetch_parameters_are_validated(
        #[case] size: u32,
        #[case] on: u32,
        #[case] ok: bool,
    ) {
        assert_eq!(RequestStrategy::prefetch(size, on).is_ok(), ok);
    }

    #[test]
    fn prefetch_refills_when_threshold_is_reached() {
        let mut tracker = RequestStrategy::prefetch(4, 1).expect("valid").start();
        assert_eq!(tracker.first_request(), 4);
        let requests: Vec<_> = (0..9).map(|_| tracker.next_request()).collect();
        assert_eq!(
            requests,
            vec![None, None, Some(4), None, None, None, Some(4), None, None]
        );
    }

    #[tokio::test]
    async fn gate_wakes_waiter_on_grant() {
        let gate = Arc::new(CreditGate::new(0));
        let cancel = CancellationToken::new();
        let waiter = {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.acquire(&cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        gate.grant(1);
        assert!(waiter.await.expect("waiter task"));
        assert_eq!(gate.available(), 0);
    }

    #[tokio::test]
    async fn gate_acquire_stops_on_cancel() {
        let gate = CreditGate::new(0);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!gate.acquire(&cancel).await);
    }

    #[test]
    fn zero_grant_is_ignored() {
        let gate = CreditGate::new(0);
        gate.grant(0);
        assert!(!gate.try_acquire());
    }
}
