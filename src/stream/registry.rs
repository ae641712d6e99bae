//! The per-connection table of live streams.
//!
//! Every registered entry is removed exactly once: when both of its
//! directions reach a terminal state, when the stream is cancelled or
//! fails, or when the connection closes. The lock is held only for table
//! bookkeeping and non-blocking channel sends, never while a handler runs.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{InteractionKind, Role, Signal, StreamIdAllocator};
use crate::payload::Payload;
use crate::{
    error::RSocketError,
    flow::{CreditGate, FlowControlError},
};

/// Registration failures.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The id already has a live entry.
    #[error("stream {0} is already in use")]
    InUse(u32),
    /// Every id of this side's parity is live.
    #[error("no stream ids available")]
    Exhausted,
}

/// State for one live stream.
///
/// The inbound direction is live while `inbound` holds a sender; the
/// outbound direction is live while `credit` holds a gate. `demand`, when
/// set, is the inbound credit this side granted the peer; each NEXT takes
/// one unit at dispatch. `cancel` stops outbound production and discards
/// frames still queued for the stream.
#[derive(Debug)]
pub struct StreamEntry {
    role: Role,
    kind: InteractionKind,
    inbound: Option<mpsc::UnboundedSender<Signal>>,
    demand: Option<Arc<CreditGate>>,
    credit: Option<Arc<CreditGate>>,
    cancel: CancellationToken,
}

impl StreamEntry {
    /// Entry with both directions terminal; attach directions with
    /// [`Self::with_inbound`] and [`Self::with_outbound`].
    #[must_use]
    pub fn new(role: Role, kind: InteractionKind, cancel: CancellationToken) -> Self {
        Self {
            role,
            kind,
            inbound: None,
            demand: None,
            credit: None,
            cancel,
        }
    }

    /// Deliver inbound signals to `sender`.
    #[must_use]
    pub fn with_inbound(mut self, sender: mpsc::UnboundedSender<Signal>) -> Self {
        self.inbound = Some(sender);
        self
    }

    /// Check inbound NEXT frames against the demand in `demand`.
    #[must_use]
    pub fn with_demand(mut self, demand: Arc<CreditGate>) -> Self {
        self.demand = Some(demand);
        self
    }

    /// Gate outbound production on `credit`.
    #[must_use]
    pub fn with_outbound(mut self, credit: Arc<CreditGate>) -> Self {
        self.credit = Some(credit);
        self
    }

    /// Role of this peer on the stream.
    #[must_use]
    pub fn role(&self) -> Role { self.role }

    /// Interaction model.
    #[must_use]
    pub fn kind(&self) -> InteractionKind { self.kind }

    /// Token stopping this stream's outbound direction.
    #[must_use]
    pub fn cancel_token(&self) -> CancellationToken { self.cancel.clone() }

    fn is_terminal(&self) -> bool { self.inbound.is_none() && self.credit.is_none() }

    fn signal(&self, signal: Signal) -> bool {
        self.inbound
            .as_ref()
            .is_some_and(|sender| sender.send(signal).is_ok())
    }
}

struct Table {
    allocator: StreamIdAllocator,
    entries: HashMap<u32, StreamEntry>,
}

/// Live streams of one connection keyed by stream id.
pub struct StreamRegistry {
    table: Mutex<Table>,
}

impl StreamRegistry {
    /// Empty registry allocating ids with `allocator`.
    #[must_use]
    pub fn new(allocator: StreamIdAllocator) -> Self {
        Self {
            table: Mutex::new(Table {
                allocator,
                entries: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `id` belongs to this side's parity.
    #[must_use]
    pub fn owns(&self, id: u32) -> bool { self.lock().allocator.owns(id) }

    /// Allocate a fresh id without registering it (fire-and-forget).
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Exhausted`] when every id is live.
    pub fn next_id(&self) -> Result<u32, RegistryError> {
        let mut table = self.lock();
        let Table { allocator, entries } = &mut *table;
        allocator
            .allocate(|id| entries.contains_key(&id))
            .ok_or(RegistryError::Exhausted)
    }

    /// Allocate a fresh id and register `entry` under it atomically.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Exhausted`] when every id is live.
    pub fn allocate(&self, entry: StreamEntry) -> Result<u32, RegistryError> {
        let mut table = self.lock();
        let Table { allocator, entries } = &mut *table;
        let id = allocator
            .allocate(|id| entries.contains_key(&id))
            .ok_or(RegistryError::Exhausted)?;
        entries.insert(id, entry);
        crate::metrics::inc_streams();
        Ok(id)
    }

    /// Register a stream opened by the peer.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InUse`] if `id` is live.
    pub fn register(&self, id: u32, entry: StreamEntry) -> Result<(), RegistryError> {
        let mut table = self.lock();
        if table.entries.contains_key(&id) {
            return Err(RegistryError::InUse(id));
        }
        table.entries.insert(id, entry);
        crate::metrics::inc_streams();
        Ok(())
    }

    /// Forward `signal` to the inbound direction of `id`.
    ///
    /// A terminal signal closes the inbound direction. Returns `false` when
    /// the stream or its inbound direction is gone; the signal is dropped.
    pub fn deliver(&self, id: u32, signal: Signal) -> bool {
        let mut table = self.lock();
        let Some(entry) = table.entries.get_mut(&id) else {
            return false;
        };
        let terminal = signal.is_terminal();
        let delivered = entry.signal(signal);
        if terminal {
            entry.inbound = None;
            remove_if_terminal(&mut table, id);
        }
        delivered
    }

    /// Forward a NEXT payload to `id`, taking one unit of the demand this
    /// side granted.
    ///
    /// Returns `Ok(false)` when the stream or its inbound direction is gone.
    ///
    /// # Errors
    ///
    /// Fails without delivering when the peer sent more than was requested;
    /// the caller terminates the stream.
    pub fn deliver_next(&self, id: u32, payload: Payload) -> Result<bool, FlowControlError> {
        let table = self.lock();
        let Some(entry) = table.entries.get(&id).filter(|entry| entry.inbound.is_some()) else {
            return Ok(false);
        };
        if let Some(demand) = &entry.demand {
            if !demand.try_acquire() {
                return Err(FlowControlError {
                    requested: 1,
                    available: demand.available(),
                });
            }
        }
        Ok(entry.signal(Signal::Next(payload)))
    }

    /// Add outbound credit for `id`; returns `false` if there is no live
    /// outbound direction.
    pub fn grant(&self, id: u32, n: u32) -> bool {
        let table = self.lock();
        match table.entries.get(&id).and_then(|entry| entry.credit.as_ref()) {
            Some(credit) => {
                credit.grant(n);
                true
            }
            None => false,
        }
    }

    /// Role of this peer on `id`, if live.
    #[must_use]
    pub fn role(&self, id: u32) -> Option<Role> { self.lock().entries.get(&id).map(StreamEntry::role) }

    /// Stop the outbound direction of `id` and discard its queued frames.
    pub fn cancel_outbound(&self, id: u32) {
        let mut table = self.lock();
        if let Some(entry) = table.entries.get_mut(&id) {
            entry.cancel.cancel();
            entry.credit = None;
            remove_if_terminal(&mut table, id);
        }
    }

    /// Mark the outbound direction of `id` as completed normally.
    pub fn complete_outbound(&self, id: u32) {
        let mut table = self.lock();
        if let Some(entry) = table.entries.get_mut(&id) {
            entry.credit = None;
            remove_if_terminal(&mut table, id);
        }
    }

    /// Close the inbound direction of `id` without signalling its consumer.
    pub fn close_inbound(&self, id: u32) {
        let mut table = self.lock();
        if let Some(entry) = table.entries.get_mut(&id) {
            entry.inbound = None;
            remove_if_terminal(&mut table, id);
        }
    }

    /// Terminate both directions of `id`: the consumer sees `error` and
    /// outbound production stops.
    pub fn fail(&self, id: u32, error: RSocketError) -> bool {
        let entry = self.remove_entry(id);
        entry.is_some_and(|entry| {
            entry.cancel.cancel();
            entry.signal(Signal::Error(error));
            true
        })
    }

    /// Remove `id`, stopping outbound production; the consumer sees the end
    /// of its stream.
    pub fn release(&self, id: u32) -> Option<StreamEntry> {
        let entry = self.remove_entry(id)?;
        entry.cancel.cancel();
        Some(entry)
    }

    /// Tear down every stream, notifying each consumer with `error`.
    pub fn close_all(&self, error: &RSocketError) -> usize {
        let drained: Vec<(u32, StreamEntry)> = self.lock().entries.drain().collect();
        for (id, entry) in &drained {
            entry.cancel.cancel();
            entry.signal(Signal::Error(error.clone()));
            crate::metrics::dec_streams();
            tracing::trace!(stream_id = id, "stream closed with connection");
        }
        drained.len()
    }

    /// Whether `id` still accepts inbound signals.
    #[must_use]
    pub fn inbound_open(&self, id: u32) -> bool {
        self.lock()
            .entries
            .get(&id)
            .is_some_and(|entry| entry.inbound.is_some())
    }

    /// Whether `id` is live.
    #[must_use]
    pub fn contains(&self, id: u32) -> bool { self.lock().entries.contains_key(&id) }

    /// Number of live streams.
    #[must_use]
    pub fn len(&self) -> usize { self.lock().entries.len() }

    /// Whether no stream is live.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn remove_entry(&self, id: u32) -> Option<StreamEntry> {
        let entry = self.lock().entries.remove(&id)?;
        crate::metrics::dec_streams();
        Some(entry)
    }
}

fn remove_if_terminal(table: &mut Table, id: u32) {
    if table.entries.get(&id).is_some_and(StreamEntry::is_terminal) {
        table.entries.remove(&id);
        crate::metrics::dec_streams();
        tracing::trace!(stream_id = id, "stream released");
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{Arc, Mutex},
    };

    use rstest::{fixture, rstest};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    use super::{RegistryError, StreamEntry, StreamRegistry};
    use crate::{
        error::RSocketError,
        flow::CreditGate,
        payload::Payload,
        stream::{InteractionKind, Role, Signal, StreamIdAllocator},
    };

    #[fixture]
    fn registry() -> StreamRegistry { StreamRegistry::new(StreamIdAllocator::client()) }

    fn channel_entry(
        role: Role,
    ) -> (StreamEntry, mpsc::UnboundedReceiver<Signal>, CancellationToken) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let entry = StreamEntry::new(role, InteractionKind::RequestChannel, cancel.clone())
            .with_inbound(tx)
            .with_outbound(Arc::new(CreditGate::new(0)));
        (entry, rx, cancel)
    }

    #[rstest]
    fn live_ids_cannot_be_registered_twice(registry: StreamRegistry) {
        let (entry, _rx, _) = channel_entry(Role::Responder);
        registry.register(2, entry).expect("first registration");
        let (again, _rx2, _) = channel_entry(Role::Responder);
        assert_eq!(registry.register(2, again), Err(RegistryError::InUse(2)));
    }

    #[rstest]
    fn stream_is_released_once_both_directions_finish(registry: StreamRegistry) {
        let (entry, mut rx, cancel) = channel_entry(Role::Requester);
        let id = registry.allocate(entry).expect("id available");

        assert!(registry.deliver(id, Signal::Next(Payload::new("a"))));
        assert!(registry.deliver(id, Signal::Complete));
        assert!(registry.contains(id), "outbound direction is still live");
        assert!(!registry.deliver(id, Signal::Next(Payload::new("late"))));

        registry.complete_outbound(id);
        assert!(!registry.contains(id));
        assert!(!cancel.is_cancelled());
        assert_eq!(rx.try_recv(), Ok(Signal::Next(Payload::new("a"))));
        assert_eq!(rx.try_recv(), Ok(Signal::Complete));
    }

    #[rstest]
    fn next_beyond_granted_demand_is_refused(registry: StreamRegistry) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let demand = Arc::new(CreditGate::new(1));
        let entry = StreamEntry::new(Role::Requester, InteractionKind::RequestStream, CancellationToken::new())
            .with_inbound(tx)
            .with_demand(Arc::clone(&demand));
        let id = registry.allocate(entry).expect("id available");

        assert_eq!(registry.deliver_next(id, Payload::new("a")), Ok(true));
        let err = registry
            .deliver_next(id, Payload::new("b"))
            .expect_err("no demand left");
        assert_eq!((err.requested, err.available), (1, 0));
        assert_eq!(rx.try_recv(), Ok(Signal::Next(Payload::new("a"))));
        assert!(rx.try_recv().is_err(), "the excess payload is not queued");

        demand.grant(1);
        assert_eq!(registry.deliver_next(id, Payload::new("c")), Ok(true));
        assert_eq!(registry.deliver_next(id + 2, Payload::new("d")), Ok(false));
    }

    #[rstest]
    fn cancelled_outbound_discards_production(registry: StreamRegistry) {
        let (entry, _rx, cancel) = channel_entry(Role::Responder);
        registry.register(4, entry).expect("registered");
        assert!(registry.grant(4, 3));
        registry.cancel_outbound(4);
        assert!(cancel.is_cancelled());
        assert!(!registry.grant(4, 3));
        assert!(registry.contains(4), "inbound direction is still live");
        registry.close_inbound(4);
        assert!(registry.is_empty());
    }

    #[rstest]
    fn failure_reaches_consumer_and_releases(registry: StreamRegistry) {
        let (entry, mut rx, cancel) = channel_entry(Role::Requester);
        let id = registry.allocate(entry).expect("id available");
        assert!(registry.fail(id, RSocketError::application("boom")));
        assert!(cancel.is_cancelled());
        assert_eq!(rx.try_recv(), Ok(Signal::Error(RSocketError::application("boom"))));
        assert!(!registry.fail(id, RSocketError::application("twice")));
    }

    #[rstest]
    fn teardown_notifies_every_stream(registry: StreamRegistry) {
        let receivers: Vec<_> = (0..3)
            .map(|_| {
                let (entry, rx, _) = channel_entry(Role::Requester);
                registry.allocate(entry).expect("id available");
                rx
            })
            .collect();
        let closed = RSocketError::connection_close("connection closed");
        assert_eq!(registry.close_all(&closed), 3);
        assert!(registry.is_empty());
        for mut rx in receivers {
            assert_eq!(rx.try_recv(), Ok(Signal::Error(closed.clone())));
        }
    }

    #[test]
    fn concurrent_allocations_never_share_an_id() {
        let registry = Arc::new(StreamRegistry::new(StreamIdAllocator::client()));
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let seen = Arc::clone(&seen);
                std::thread::spawn(move || {
                    for _ in 0..200 {
                        let entry = StreamEntry::new(
                            Role::Requester,
                            InteractionKind::RequestResponse,
                            CancellationToken::new(),
                        )
                        .with_outbound(Arc::new(CreditGate::new(1)));
                        let id = registry.allocate(entry).expect("id available");
                        assert!(
                            seen.lock().expect("lock").insert(id),
                            "id {id} allocated twice while live"
                        );
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("allocation thread");
        }
        assert_eq!(registry.len(), 1600);
        assert!(seen.lock().expect("lock").iter().all(|id| id % 2 == 1));
    }
}
