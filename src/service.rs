//! the handler collaborator interface (`spec.md` §6: "*HttpHandler*: `invoke(request,
//! response)`"), grounded on the teacher's `HttpFlow`/`Service` call shape (`h1/service.rs`,
//! `flow.rs`) but flattened to a single dyn-safe async method — this crate has no middleware
//! stack or service-builder layer to thread through, so there is nothing for a `tower`-style
//! `Service::call` generic to buy over a plain trait.

use std::fmt;

use async_trait::async_trait;

use crate::h1::{HttpRequest, HttpResponse};

/// application code that answers one HTTP/1 request on a [`crate::h1::Transport`].
///
/// implementations must eventually call [`HttpResponse`]'s completion hook exactly once (see
/// `h1::response`'s `taken` guard); failing to do so is a [`HandlerError::Incomplete`], which the
/// transport treats as a `HandlerFault` per `spec.md` §7.
///
/// not `Send`/`Sync`: both `HttpRequest` and `HttpResponse` share state through `Rc`/`RefCell`
/// (see `h1::response`), so a handler runs to completion on the single worker thread that accepted
/// its connection, same as [`crate::net::Connection`].
#[async_trait(?Send)]
pub trait HttpHandler {
    async fn invoke(&self, request: HttpRequest, response: HttpResponse) -> Result<(), HandlerError>;
}

/// error surfaced by [`HttpHandler::invoke`]; collapses to the `HandlerFault` row of the error
/// taxonomy (`spec.md` §7: "if headers unsent → 500, else abort").
#[derive(Debug)]
pub enum HandlerError {
    /// handler returned without completing the response.
    Incomplete,
    /// handler-defined failure, carried opaquely so this crate does not mandate an error type
    /// for application code.
    Fault(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete => f.write_str("handler returned without completing the response"),
            Self::Fault(e) => write!(f, "handler fault: {e}"),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Incomplete => None,
            Self::Fault(e) => Some(e.as_ref()),
        }
    }
}

#[async_trait(?Send)]
impl<F> HttpHandler for F
where
    F: 'static,
    F: Fn(HttpRequest, HttpResponse) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), HandlerError>>>>,
{
    async fn invoke(&self, request: HttpRequest, response: HttpResponse) -> Result<(), HandlerError> {
        (self)(request, response).await
    }
}
