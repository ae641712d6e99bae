//! Interceptors wrap the pieces of a connection as it is assembled.
//!
//! Each interceptor is a function from a component to a component of the
//! same kind, so it can decorate or replace it. Interceptors of one kind run
//! in registration order: the first registered wraps the engine's
//! component, the last registered is outermost.
//!
//! ```
//! use std::sync::Arc;
//!
//! use rsframe::{handler::RSocket, interceptor::Interceptors};
//!
//! let interceptors = Interceptors::builder()
//!     .for_responder(|responder: Arc<dyn RSocket>| {
//!         log::debug!("responder installed");
//!         responder
//!     })
//!     .build();
//! assert_eq!(interceptors.len(), 1);
//! ```

use std::{fmt, sync::Arc};

use crate::{acceptor::ConnectionAcceptor, handler::RSocket, transport::Connection};

type Wrap<T> = Arc<dyn Fn(Arc<T>) -> Arc<T> + Send + Sync>;

/// Interceptor chains for every component kind.
#[derive(Clone, Default)]
pub struct Interceptors {
    connection: Vec<Wrap<dyn Connection>>,
    requester: Vec<Wrap<dyn RSocket>>,
    responder: Vec<Wrap<dyn RSocket>>,
    acceptor: Vec<Wrap<dyn ConnectionAcceptor>>,
}

fn apply<T: ?Sized>(chain: &[Wrap<T>], target: Arc<T>) -> Arc<T> {
    chain.iter().fold(target, |wrapped, wrap| wrap(wrapped))
}

impl Interceptors {
    /// Start an empty set of chains.
    #[must_use]
    pub fn builder() -> InterceptorsBuilder { InterceptorsBuilder::default() }

    /// Total number of registered interceptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connection.len() + self.requester.len() + self.responder.len() + self.acceptor.len()
    }

    /// Whether no interceptor is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Wrap the transport before any frame is exchanged.
    #[must_use]
    pub fn wrap_connection(&self, connection: Arc<dyn Connection>) -> Arc<dyn Connection> {
        apply(&self.connection, connection)
    }

    /// Wrap the local requester handed to the application.
    #[must_use]
    pub fn wrap_requester(&self, requester: Arc<dyn RSocket>) -> Arc<dyn RSocket> { apply(&self.requester, requester) }

    /// Wrap the handler serving the peer's requests.
    #[must_use]
    pub fn wrap_responder(&self, responder: Arc<dyn RSocket>) -> Arc<dyn RSocket> { apply(&self.responder, responder) }

    /// Wrap the acceptor that decides on new connections.
    #[must_use]
    pub fn wrap_acceptor(&self, acceptor: Arc<dyn ConnectionAcceptor>) -> Arc<dyn ConnectionAcceptor> {
        apply(&self.acceptor, acceptor)
    }
}

impl fmt::Debug for Interceptors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interceptors")
            .field("connection", &self.connection.len())
            .field("requester", &self.requester.len())
            .field("responder", &self.responder.len())
            .field("acceptor", &self.acceptor.len())
            .finish()
    }
}

/// Builder for [`Interceptors`].
#[derive(Default)]
pub struct InterceptorsBuilder {
    interceptors: Interceptors,
}

impl InterceptorsBuilder {
    /// Add a transport interceptor.
    #[must_use]
    pub fn for_connection<F>(mut self, wrap: F) -> Self
    where
        F: Fn(Arc<dyn Connection>) -> Arc<dyn Connection> + Send + Sync + 'static,
    {
        self.interceptors.connection.push(Arc::new(wrap));
        self
    }

    /// Add a requester interceptor.
    #[must_use]
    pub fn for_requester<F>(mut self, wrap: F) -> Self
    where
        F: Fn(Arc<dyn RSocket>) -> Arc<dyn RSocket> + Send + Sync + 'static,
    {
        self.interceptors.requester.push(Arc::new(wrap));
        self
    }

    /// Add a responder interceptor.
    #[must_use]
    pub fn for_responder<F>(mut self, wrap: F) -> Self
    where
        F: Fn(Arc<dyn RSocket>) -> Arc<dyn RSocket> + Send + Sync + 'static,
    {
        self.interceptors.responder.push(Arc::new(wrap));
        self
    }

    /// Add an acceptor interceptor.
    #[must_use]
    pub fn for_acceptor<F>(mut self, wrap: F) -> Self
    where
        F: Fn(Arc<dyn ConnectionAcceptor>) -> Arc<dyn ConnectionAcceptor> + Send + Sync + 'static,
    {
        self.interceptors.acceptor.push(Arc::new(wrap));
        self
    }

    /// Finish building.
    #[must_use]
    pub fn build(self) -> Interceptors { self.interceptors }
}
