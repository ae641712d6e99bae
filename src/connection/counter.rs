//! Process-wide count of open connections.

use std::sync::atomic::{AtomicU64, Ordering};

use super::Side;

static ACTIVE_CONNECTIONS: AtomicU64 = AtomicU64::new(0);

/// Counts one connection for as long as it lives and logs its opening and
/// closing. Held by the reader loop.
pub(super) struct ActiveConnection {
    side: Side,
}

impl ActiveConnection {
    pub(super) fn open(side: Side) -> Self {
        let active = ACTIVE_CONNECTIONS.fetch_add(1, Ordering::Relaxed) + 1;
        crate::metrics::inc_connections();
        log::info!("connection opened: side={side}, rsframe_connections_active={active}");
        Self { side }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        let active = ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        crate::metrics::dec_connections();
        log::info!(
            "connection closed: side={}, rsframe_connections_active={active}",
            self.side
        );
    }
}

/// Number of connections whose reader loop is running in this process.
#[must_use]
pub fn active_connection_count() -> u64 { ACTIVE_CONNECTIONS.load(Ordering::Relaxed) }
