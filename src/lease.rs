//! Lease grants and their enforcement.
//!
//! When SETUP sets the LEASE flag, a requester may only start streams while
//! it holds an unexpired lease with remaining requests. The same
//! [`LeaseTracker`] type tracks leases received from the peer (checked before
//! sending a request) and leases this side granted (checked when a request
//! arrives).

use std::{sync::Mutex, time::Duration};

use bytes::Bytes;
use tokio::time::Instant;

use crate::error::RSocketError;

/// Message carried by the REJECTED error when no lease allows a request.
pub const LEASE_EXHAUSTED: &str = "lease exhausted";

/// A lease as carried by the LEASE frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lease {
    /// Validity period starting when the lease is received.
    pub ttl: Duration,
    /// Requests allowed during the validity period.
    pub number_of_requests: u32,
    /// Optional lease metadata.
    pub metadata: Option<Bytes>,
}

impl Lease {
    /// Lease without metadata.
    #[must_use]
    pub fn new(ttl: Duration, number_of_requests: u32) -> Self {
        Self {
            ttl,
            number_of_requests,
            metadata: None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Window {
    initial: u32,
    remaining: u32,
    expires_at: Instant,
}

/// Current lease allowance for one direction of a connection.
#[derive(Debug, Default)]
pub struct LeaseTracker {
    window: Mutex<Option<Window>>,
}

impl LeaseTracker {
    /// Tracker with no lease; every request is rejected until one arrives.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Replace the current lease, starting its validity now.
    pub fn apply(&self, lease: &Lease) {
        let window = Window {
            initial: lease.number_of_requests,
            remaining: lease.number_of_requests,
            expires_at: Instant::now() + lease.ttl,
        };
        *self.lock() = Some(window);
    }

    /// Consume one request from the current lease.
    ///
    /// # Errors
    ///
    /// Returns `REJECTED` ("lease exhausted") when no lease was received,
    /// the lease expired, or its requests are used up.
    pub fn try_use(&self) -> Result<(), RSocketError> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(window) if window.remaining > 0 && Instant::now() < window.expires_at => {
                window.remaining -= 1;
                Ok(())
            }
            _ => Err(RSocketError::rejected(LEASE_EXHAUSTED)),
        }
    }

    /// Requests left in the current lease, zero if expired or absent.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        let window = *self.lock();
        window
            .filter(|window| Instant::now() < window.expires_at)
            .map_or(0, |window| window.remaining)
    }

    /// Fraction of the current lease still available, in `0.0..=1.0`.
    #[must_use]
    pub fn availability(&self) -> f64 {
        let Some(window) = *self.lock() else {
            return 0.0;
        };
        if window.initial == 0 || Instant::now() >= window.expires_at {
            return 0.0;
        }
        f64::from(window.remaining) / f64::from(window.initial)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Window>> {
        self.window
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
