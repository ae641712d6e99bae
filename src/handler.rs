//! Application-facing interaction API.
//!
//! [`RSocket`] is implemented by responders (the application's request
//! handlers) and by [`Requester`](crate::Requester) (the local view of the
//! peer). [`RequestHandler`] builds a responder from closures.

use std::{fmt, future::Future, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{
    FutureExt,
    Stream,
    StreamExt,
    future::BoxFuture,
    stream::{self, BoxStream},
};

use crate::{error::RSocketError, payload::Payload, stream::InteractionKind};

/// A stream of payloads; terminates after yielding an error.
pub type PayloadStream = BoxStream<'static, Result<Payload, RSocketError>>;

/// Interaction models a handler implements.
///
/// Requests for an unsupported model are rejected with REJECTED before the
/// handler is invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[expect(clippy::struct_excessive_bools, reason = "one flag per interaction model")]
pub struct Capabilities {
    /// METADATA_PUSH.
    pub metadata_push: bool,
    /// REQUEST_FNF.
    pub fire_and_forget: bool,
    /// REQUEST_RESPONSE.
    pub request_response: bool,
    /// REQUEST_STREAM.
    pub request_stream: bool,
    /// REQUEST_CHANNEL.
    pub request_channel: bool,
}

impl Capabilities {
    /// Every interaction model.
    pub const ALL: Self = Self {
        metadata_push: true,
        fire_and_forget: true,
        request_response: true,
        request_stream: true,
        request_channel: true,
    };

    /// No interaction model.
    pub const NONE: Self = Self {
        metadata_push: false,
        fire_and_forget: false,
        request_response: false,
        request_stream: false,
        request_channel: false,
    };

    /// Whether `kind` is supported.
    #[must_use]
    pub fn supports(&self, kind: InteractionKind) -> bool {
        match kind {
            InteractionKind::MetadataPush => self.metadata_push,
            InteractionKind::FireAndForget => self.fire_and_forget,
            InteractionKind::RequestResponse => self.request_response,
            InteractionKind::RequestStream => self.request_stream,
            InteractionKind::RequestChannel => self.request_channel,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self { Self::ALL }
}

/// REJECTED error for an interaction model a handler does not implement.
#[must_use]
pub fn unsupported(kind: InteractionKind) -> RSocketError {
    RSocketError::rejected(format!("{kind} is not supported"))
}

/// A stream yielding only `error`.
#[must_use]
pub fn error_stream(error: RSocketError) -> PayloadStream { stream::once(async move { Err(error) }).boxed() }

/// The five interaction models.
///
/// Every method has a default that rejects the interaction, so handlers
/// implement only what they serve and advertise it via
/// [`RSocket::capabilities`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use rsframe::{Payload, RSocketError, handler::{Capabilities, RSocket}};
///
/// struct Echo;
///
/// #[async_trait]
/// impl RSocket for Echo {
///     fn capabilities(&self) -> Capabilities {
///         Capabilities { request_response: true, ..Capabilities::NONE }
///     }
///
///     async fn request_response(&self, payload: Payload) -> Result<Payload, RSocketError> {
///         Ok(payload)
///     }
/// }
/// ```
#[async_trait]
pub trait RSocket: Send + Sync + 'static {
    /// Interaction models this implementation serves.
    fn capabilities(&self) -> Capabilities { Capabilities::ALL }

    /// Connection-level metadata.
    async fn metadata_push(&self, metadata: Bytes) -> Result<(), RSocketError> {
        let _ = metadata;
        Err(unsupported(InteractionKind::MetadataPush))
    }

    /// A request without a response.
    async fn fire_and_forget(&self, payload: Payload) -> Result<(), RSocketError> {
        let _ = payload;
        Err(unsupported(InteractionKind::FireAndForget))
    }

    /// A request answered by exactly one payload or error.
    async fn request_response(&self, payload: Payload) -> Result<Payload, RSocketError> {
        let _ = payload;
        Err(unsupported(InteractionKind::RequestResponse))
    }

    /// A request answered by a stream.
    fn request_stream(&self, payload: Payload) -> PayloadStream {
        let _ = payload;
        error_stream(unsupported(InteractionKind::RequestStream))
    }

    /// A bidirectional stream opened with `initial`; `input` carries the
    /// remaining payloads from the requester.
    fn request_channel(&self, initial: Payload, input: PayloadStream) -> PayloadStream {
        let _ = (initial, input);
        error_stream(unsupported(InteractionKind::RequestChannel))
    }
}

#[async_trait]
impl<T: RSocket + ?Sized> RSocket for Arc<T> {
    fn capabilities(&self) -> Capabilities { (**self).capabilities() }

    async fn metadata_push(&self, metadata: Bytes) -> Result<(), RSocketError> {
        (**self).metadata_push(metadata).await
    }

    async fn fire_and_forget(&self, payload: Payload) -> Result<(), RSocketError> {
        (**self).fire_and_forget(payload).await
    }

    async fn request_response(&self, payload: Payload) -> Result<Payload, RSocketError> {
        (**self).request_response(payload).await
    }

    fn request_stream(&self, payload: Payload) -> PayloadStream { (**self).request_stream(payload) }

    fn request_channel(&self, initial: Payload, input: PayloadStream) -> PayloadStream {
        (**self).request_channel(initial, input)
    }
}

type MetadataPushFn = Arc<dyn Fn(Bytes) -> BoxFuture<'static, Result<(), RSocketError>> + Send + Sync>;
type FireAndForgetFn = Arc<dyn Fn(Payload) -> BoxFuture<'static, Result<(), RSocketError>> + Send + Sync>;
type RequestResponseFn =
    Arc<dyn Fn(Payload) -> BoxFuture<'static, Result<Payload, RSocketError>> + Send + Sync>;
type RequestStreamFn = Arc<dyn Fn(Payload) -> PayloadStream + Send + Sync>;
type RequestChannelFn = Arc<dyn Fn(Payload, PayloadStream) -> PayloadStream + Send + Sync>;

/// Responder assembled from closures; capabilities follow the closures
/// registered.
///
/// # Examples
///
/// ```
/// use rsframe::{Payload, handler::{RSocket, RequestHandler}};
///
/// let handler = RequestHandler::builder()
///     .on_request_response(|payload: Payload| async move { Ok(payload) })
///     .build();
/// assert!(handler.capabilities().request_response);
/// assert!(!handler.capabilities().request_stream);
/// ```
#[derive(Clone, Default)]
pub struct RequestHandler {
    metadata_push: Option<MetadataPushFn>,
    fire_and_forget: Option<FireAndForgetFn>,
    request_response: Option<RequestResponseFn>,
    request_stream: Option<RequestStreamFn>,
    request_channel: Option<RequestChannelFn>,
}

impl RequestHandler {
    /// Start with no interaction supported.
    #[must_use]
    pub fn builder() -> RequestHandlerBuilder { RequestHandlerBuilder::default() }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("capabilities", &self.capabilities())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl RSocket for RequestHandler {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            metadata_push: self.metadata_push.is_some(),
            fire_and_forget: self.fire_and_forget.is_some(),
            request_response: self.request_response.is_some(),
            request_stream: self.request_stream.is_some(),
            request_channel: self.request_channel.is_some(),
        }
    }

    async fn metadata_push(&self, metadata: Bytes) -> Result<(), RSocketError> {
        match &self.metadata_push {
            Some(f) => f(metadata).await,
            None => Err(unsupported(InteractionKind::MetadataPush)),
        }
    }

    async fn fire_and_forget(&self, payload: Payload) -> Result<(), RSocketError> {
        match &self.fire_and_forget {
            Some(f) => f(payload).await,
            None => Err(unsupported(InteractionKind::FireAndForget)),
        }
    }

    async fn request_response(&self, payload: Payload) -> Result<Payload, RSocketError> {
        match &self.request_response {
            Some(f) => f(payload).await,
            None => Err(unsupported(InteractionKind::RequestResponse)),
        }
    }

    fn request_stream(&self, payload: Payload) -> PayloadStream {
        match &self.request_stream {
            Some(f) => f(payload),
            None => error_stream(unsupported(InteractionKind::RequestStream)),
        }
    }

    fn request_channel(&self, initial: Payload, input: PayloadStream) -> PayloadStream {
        match &self.request_channel {
            Some(f) => f(initial, input),
            None => error_stream(unsupported(InteractionKind::RequestChannel)),
        }
    }
}

/// Builder for [`RequestHandler`].
#[derive(Default)]
pub struct RequestHandlerBuilder {
    handler: RequestHandler,
}

impl RequestHandlerBuilder {
    /// Serve METADATA_PUSH.
    #[must_use]
    pub fn on_metadata_push<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RSocketError>> + Send + 'static,
    {
        self.handler.metadata_push = Some(Arc::new(move |metadata| f(metadata).boxed()));
        self
    }

    /// Serve fire-and-forget.
    #[must_use]
    pub fn on_fire_and_forget<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RSocketError>> + Send + 'static,
    {
        self.handler.fire_and_forget = Some(Arc::new(move |payload| f(payload).boxed()));
        self
    }

    /// Serve request-response.
    #[must_use]
    pub fn on_request_response<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Payload, RSocketError>> + Send + 'static,
    {
        self.handler.request_response = Some(Arc::new(move |payload| f(payload).boxed()));
        self
    }

    /// Serve request-stream.
    #[must_use]
    pub fn on_request_stream<F, S>(mut self, f: F) -> Self
    where
        F: Fn(Payload) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Payload, RSocketError>> + Send + 'static,
    {
        self.handler.request_stream = Some(Arc::new(move |payload| f(payload).boxed()));
        self
    }

    /// Serve request-channel.
    #[must_use]
    pub fn on_request_channel<F, S>(mut self, f: F) -> Self
    where
        F: Fn(Payload, PayloadStream) -> S + Send + Sync + 'static,
        S: Stream<Item = Result<Payload, RSocketError>> + Send + 'static,
    {
        self.handler.request_channel = Some(Arc::new(move |initial, input| f(initial, input).boxed()));
        self
    }

    /// Finish the handler.
    #[must_use]
    pub fn build(self) -> RequestHandler { self.handler }
}
