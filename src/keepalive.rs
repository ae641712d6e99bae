//! Keepalive negotiation values and the liveness monitor.

use std::{future::Future, sync::Mutex, time::Duration};

use bytes::Bytes;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    error::RSocketError,
    frame::{Frame, KeepAliveFrame},
};

/// Keepalive interval and maximum lifetime negotiated by SETUP.
///
/// `interval < max_lifetime` is recommended but not enforced here; servers
/// reject zero values during setup validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeepAlive {
    /// Time between keepalive frames.
    pub interval: Duration,
    /// Inactivity after which the connection is considered dead.
    pub max_lifetime: Duration,
}

impl KeepAlive {
    /// Default keepalive interval.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(20);
    /// Default maximum lifetime.
    pub const DEFAULT_MAX_LIFETIME: Duration = Duration::from_secs(90);

    /// Build keepalive settings.
    #[must_use]
    pub const fn new(interval: Duration, max_lifetime: Duration) -> Self {
        Self {
            interval,
            max_lifetime,
        }
    }
}

impl Default for KeepAlive {
    fn default() -> Self { Self::new(Self::DEFAULT_INTERVAL, Self::DEFAULT_MAX_LIFETIME) }
}

/// Tracks inbound activity and sends keepalive frames for one connection.
#[derive(Debug)]
pub struct KeepAliveMonitor {
    keep_alive: KeepAlive,
    last_activity: Mutex<Instant>,
}

impl KeepAliveMonitor {
    /// Monitor starting with activity at the current instant.
    #[must_use]
    pub fn new(keep_alive: KeepAlive) -> Self {
        Self {
            keep_alive,
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Negotiated settings.
    #[must_use]
    pub fn keep_alive(&self) -> KeepAlive { self.keep_alive }

    /// Record that a frame was received.
    pub fn mark_activity(&self) {
        let mut last = self
            .last_activity
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *last = Instant::now();
    }

    /// Time since the last recorded activity.
    #[must_use]
    pub fn idle(&self) -> Duration {
        let last = *self
            .last_activity
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        last.elapsed()
    }

    /// Error raised when the peer stays silent past the maximum lifetime.
    #[must_use]
    pub fn timeout_error(&self) -> RSocketError {
        RSocketError::connection_error(format!(
            "no keep-alive for {} ms",
            self.keep_alive.max_lifetime.as_millis()
        ))
    }

    /// Tick at the negotiated interval until `shutdown` fires or the peer
    /// times out.
    ///
    /// `send` is called with a KEEPALIVE(RESPOND) frame whenever the
    /// connection was idle for at least one interval; it returns `false` once
    /// the outbound path is closed, which ends the loop.
    ///
    /// # Errors
    ///
    /// Returns the `CONNECTION_ERROR` produced by [`Self::timeout_error`]
    /// when no frame arrived within the maximum lifetime. The error is
    /// returned at most once because the loop ends with it.
    pub async fn run<F, Fut>(&self, shutdown: CancellationToken, mut send: F) -> Result<(), RSocketError>
    where
        F: FnMut(Frame) -> Fut,
        Fut: Future<Output = bool>,
    {
        let interval = self.keep_alive.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => return Ok(()),
                _ = ticker.tick() => {
                    let idle = self.idle();
                    if idle >= self.keep_alive.max_lifetime {
                        return Err(self.timeout_error());
                    }
                    if idle >= interval {
                        tracing::trace!(idle_ms = idle.as_millis(), "sending keepalive");
                        if !send(keepalive_request()).await {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

fn keepalive_request() -> Frame {
    Frame::KeepAlive(KeepAliveFrame {
        respond: true,
        last_position: 0,
        data: Bytes::new(),
    })
}

/// Reply to a KEEPALIVE(RESPOND): same data, RESPOND cleared.
#[must_use]
pub fn echo(frame: &KeepAliveFrame) -> Option<Frame> {
    frame.respond.then(|| {
        Frame::KeepAlive(KeepAliveFrame {
            respond: false,
            last_position: 0,
            data: frame.data.clone(),
        })
    })
}
