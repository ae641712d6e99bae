//! Connection acceptance: choosing the responder for a new connection.

use std::{future::Future, sync::Arc};

use async_trait::async_trait;

use crate::{error::RSocketError, handler::RSocket, requester::Requester, setup::ConnectionSetup};

/// What an acceptor sees about a new connection.
#[derive(Clone)]
pub struct AcceptorContext {
    /// The negotiated SETUP parameters.
    pub setup: ConnectionSetup,
    /// Handle for sending requests to the peer of this connection.
    pub requester: Requester,
}

/// Decides whether to accept a connection and which handler serves the
/// peer's requests.
///
/// Servers map a rejection to `REJECTED_SETUP` unless it already carries a
/// setup error code. Closures returning a future of the right type
/// implement this trait.
#[async_trait]
pub trait ConnectionAcceptor: Send + Sync + 'static {
    /// Accept the connection described by `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the error sent to the peer when the connection is refused.
    async fn accept(&self, ctx: AcceptorContext) -> Result<Arc<dyn RSocket>, RSocketError>;
}

#[async_trait]
impl<F, Fut> ConnectionAcceptor for F
where
    F: Fn(AcceptorContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Arc<dyn RSocket>, RSocketError>> + Send + 'static,
{
    async fn accept(&self, ctx: AcceptorContext) -> Result<Arc<dyn RSocket>, RSocketError> { self(ctx).await }
}

/// Acceptor serving every connection with the same handler.
pub fn serve_with<R: RSocket>(handler: R) -> impl ConnectionAcceptor {
    let handler: Arc<dyn RSocket> = Arc::new(handler);
    move |_ctx: AcceptorContext| {
        let handler = Arc::clone(&handler);
        async move { Ok::<_, RSocketError>(handler) }
    }
}
