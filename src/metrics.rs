//! Metric helpers for `rsframe`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the gauge tracking active connections.
pub const CONNECTIONS_ACTIVE: &str = "rsframe_connections_active";
/// Name of the gauge tracking live streams across connections.
pub const STREAMS_ACTIVE: &str = "rsframe_streams_active";
/// Name of the counter tracking processed frames.
pub const FRAMES_PROCESSED: &str = "rsframe_frames_processed_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "rsframe_errors_total";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Frames received from the peer.
    Inbound,
    /// Frames sent to the peer.
    Outbound,
}

impl Direction {
    /// Label value used for the `direction` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Which side of a connection an error was observed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed frame or codec failure.
    Frame,
    /// Connection-scope protocol error, sent or received.
    Connection,
    /// Stream-scope error emitted by a responder.
    Stream,
}

impl ErrorKind {
    /// Label value used for the `kind` label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Frame => "frame",
            ErrorKind::Connection => "connection",
            ErrorKind::Stream => "stream",
        }
    }
}

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Increment the active streams gauge.
pub fn inc_streams() {
    #[cfg(feature = "metrics")]
    gauge!(STREAMS_ACTIVE).increment(1.0);
}

/// Decrement the active streams gauge.
pub fn dec_streams() {
    #[cfg(feature = "metrics")]
    gauge!(STREAMS_ACTIVE).decrement(1.0);
}

/// Record a processed frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_PROCESSED, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error occurrence.
pub fn inc_errors(kind: ErrorKind) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}
