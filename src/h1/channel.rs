//! `spec.md` §4.3: marshal parser events onto a Request/Response pair and invoke the user handler
//! exactly once per request. Grounded on the teacher's `h1/dispatcher.rs` request-assembly step
//! (it builds a `Request<RequestBody>` from `Context` plus header callbacks and calls into
//! `S::call`) but restructured around this crate's hand-rolled [`super::parser::ParserEvents`]
//! rather than `httparse`'s batch parse, and around an explicit [`LocalExecutor`] handoff rather
//! than a `tower`-style `Service::call` future polled inline by the dispatcher.

use std::{net::SocketAddr, rc::Rc};

use bytes::Bytes;

use crate::{
    log::LogSource,
    reactor::executor::LocalExecutor,
    service::{HandlerError, HttpHandler},
};

use super::{
    body::HttpInput,
    codec::TransferCoding,
    error::TransportError,
    header::HeaderFieldList,
    parser::ParserEvents,
    request::HttpRequest,
    response::{HttpResponse, ResponseHandle},
    version::HttpVersion,
};

/// scratch state accumulated across one request's parser callbacks, reset at the start of every
/// pipelined request.
struct Scratch {
    method: Bytes,
    uri: Bytes,
    version: HttpVersion,
    headers: HeaderFieldList,
}

/// what the request's own `Connection` header (if any) asked for — read once, before the header
/// list is moved into the dispatched `HttpRequest`, since `h1::transport::Transport` needs it to
/// resolve persistence per `spec.md` §4.4 but never gets to see the request object itself (it is
/// consumed by value by the handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDirective {
    Close,
    KeepAlive,
}

fn parse_connection_header(value: &str) -> Option<ConnectionDirective> {
    let mut tokens = value.split(',').map(str::trim);
    if tokens.clone().any(|t| t.eq_ignore_ascii_case("close")) {
        Some(ConnectionDirective::Close)
    } else if tokens.any(|t| t.eq_ignore_ascii_case("keep-alive")) {
        Some(ConnectionDirective::KeepAlive)
    } else {
        None
    }
}

/// per-connection channel: owns the scratch request-in-progress, hands finished requests to the
/// handler, and surfaces the resulting [`ResponseHandle`] to `h1::transport::Transport`.
///
/// one `HttpChannel` lives for the whole connection (`spec.md` §4.3: "per-request object reset
/// between pipelined requests on the same connection"); `reset` clears it between requests rather
/// than the transport constructing a new one each time, since the handler/executor/log fields
/// don't change request to request.
pub struct HttpChannel<H> {
    handler: Rc<H>,
    executor: Rc<dyn LocalExecutor>,
    max_request_body_length: u64,
    log: LogSource,
    remote_addr: Option<SocketAddr>,

    scratch: Option<Scratch>,
    body_tx: Option<super::body::HttpInputSender>,
    body_received: u64,
    /// set by [`Self::feed_body_chunk`] once the body limit is exceeded, so the transport knows
    /// to revoke persistence for the current request per `spec.md` §4.3.
    body_too_large: bool,
    pending_response: Option<ResponseHandle>,
    pending_version: Option<HttpVersion>,
    /// the request's own `Connection` header, captured in [`Self::dispatch`] before `scratch.headers`
    /// is moved into the `HttpRequest`.
    pending_connection: Option<ConnectionDirective>,
    /// the body framing [`super::parser::ParserEvents::on_headers_end`] resolved, so the transport
    /// can drive [`super::codec::TransferCoding::decode`] against the bytes following the head.
    pending_decoder: Option<TransferCoding>,
    /// set by [`Self::on_message_begin`] when the parsed version is one this transport does not
    /// serve; the parser is made to abort this message immediately (no handler is ever invoked
    /// for an unsupported version, matching `spec.md` §8 scenario 5) and the transport reads this
    /// back via [`Self::take_abort_reason`] to pick the right status code instead of defaulting
    /// every abort to 400.
    abort_reason: Option<TransportError>,
}

impl<H> HttpChannel<H>
where
    H: HttpHandler + 'static,
{
    pub fn new(
        handler: Rc<H>,
        executor: Rc<dyn LocalExecutor>,
        max_request_body_length: u64,
        log: LogSource,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            handler,
            executor,
            max_request_body_length,
            log,
            remote_addr,
            scratch: None,
            body_tx: None,
            body_received: 0,
            body_too_large: false,
            pending_response: None,
            pending_version: None,
            pending_connection: None,
            pending_decoder: None,
            abort_reason: None,
        }
    }

    /// clear per-request scratch state; the transport calls this before parsing each pipelined
    /// request's head.
    pub fn reset(&mut self) {
        self.scratch = None;
        self.body_tx = None;
        self.body_received = 0;
        self.body_too_large = false;
        self.pending_response = None;
        self.pending_version = None;
        self.pending_connection = None;
        self.pending_decoder = None;
        self.abort_reason = None;
    }

    /// the response handle for the request most recently finished parsing, if any. the transport
    /// takes this once, right after the parser reports `Status::Complete`.
    pub fn take_response_handle(&mut self) -> Option<ResponseHandle> {
        self.pending_response.take()
    }

    /// the HTTP version of the request currently (or most recently) in flight, for the
    /// transport's persistence/framing decisions.
    pub fn request_version(&self) -> Option<HttpVersion> {
        self.pending_version
    }

    /// why the parser was made to abort, if [`Self::on_message_begin`] rejected this message
    /// outright (currently: unsupported version only).
    pub fn take_abort_reason(&mut self) -> Option<TransportError> {
        self.abort_reason.take()
    }

    /// the most recently dispatched request's `Connection` header, for the transport's
    /// persistence decision (`spec.md` §4.4).
    pub fn request_connection_directive(&self) -> Option<ConnectionDirective> {
        self.pending_connection
    }

    /// the body framing resolved for the request just dispatched; the transport drives
    /// `TransferCoding::decode` against it and feeds the results to [`Self::feed_body_chunk`].
    pub fn take_body_decoder(&mut self) -> Option<TransferCoding> {
        self.pending_decoder.take()
    }

    /// feed one decoded body chunk to the handler's [`HttpInput`]. `spec.md` §4.3: "If the buffer
    /// would exceed `max_request_body_length`, the channel emits 413 and closes persistence."
    /// returns `false` once that limit is exceeded; the transport must stop decoding further body
    /// bytes for this request and treat it as non-persistent.
    pub async fn feed_body_chunk(&mut self, chunk: Bytes) -> bool {
        if self.body_too_large {
            return false;
        }
        self.body_received += chunk.len() as u64;
        if self.body_received > self.max_request_body_length {
            self.body_too_large = true;
            self.log.warn("request body exceeded max_request_body_length");
            // drop the sender: the handler's `HttpInput` sees an abrupt EOF rather than the rest
            // of the oversized body. the transport is responsible for emitting 413 and revoking
            // persistence once this returns `false` — bypassing the handler entirely, since by
            // this point the request head (and possibly the handler dispatch) already happened.
            self.body_tx = None;
            return false;
        }
        if let Some(tx) = &self.body_tx {
            let _ = tx.feed_data(chunk).await;
        }
        true
    }

    /// signal body EOF for the current request (dropping the sender closes the handler's
    /// [`HttpInput`] stream).
    pub fn end_body(&mut self) {
        self.body_tx = None;
    }

    fn dispatch(&mut self, body: TransferCoding) {
        let scratch = self.scratch.take().expect("dispatch called without a parsed message head");
        let (body_tx, input) = HttpInput::channel();
        self.body_tx = Some(body_tx);
        self.body_received = 0;
        self.body_too_large = false;

        // the parser withholds `Content-Length`/`Transfer-Encoding` from `on_header` (they are
        // framing, not application, headers), so the resolved length comes from the framing the
        // parser already settled on rather than a second header lookup.
        let content_length = match body {
            TransferCoding::Length(n) => Some(n),
            _ => None,
        };
        self.pending_decoder = Some(body);

        // must read this before `scratch.headers` is moved into the `HttpRequest` below — the
        // transport never sees the request object itself, only this channel.
        self.pending_connection = scratch.headers.get("connection").and_then(parse_connection_header);

        let request = HttpRequest::new(
            scratch.method,
            scratch.uri,
            scratch.version,
            scratch.headers,
            content_length,
            input,
            self.remote_addr,
        );
        let handled_flag = request.handled_flag();

        let (response, response_handle) = HttpResponse::channel();
        self.pending_response = Some(response_handle);

        let handler = self.handler.clone();
        let finalize_response = response.clone();
        let log = self.log.clone();

        self.executor.execute(Box::pin(async move {
            let outcome = handler.invoke(request, response).await;
            match outcome {
                Ok(()) => {}
                Err(HandlerError::Incomplete) => {
                    log.warn("handler returned without completing the response");
                }
                Err(HandlerError::Fault(e)) => {
                    log.error(&format!("handler fault: {e}"));
                }
            }
            // `spec.md` §4.3 handler contract: unhandled → 404 takes priority over the
            // missing-status → 500 default, since an unmatched route never had a chance to set
            // anything meaningful.
            if !handled_flag.get() {
                finalize_response.force_status(404);
            } else if !finalize_response.status_was_set() {
                finalize_response.force_status(500);
            }
            if !finalize_response.is_completed() {
                finalize_response.complete();
            }
        }));
    }
}

impl<H> ParserEvents for HttpChannel<H>
where
    H: HttpHandler + 'static,
{
    fn on_message_begin(&mut self, method: Bytes, uri: Bytes, version: HttpVersion) -> bool {
        self.pending_version = Some(version);
        if !version.is_supported() {
            self.abort_reason = Some(TransportError::VersionUnsupported);
            return false;
        }
        self.scratch = Some(Scratch {
            method,
            uri,
            version,
            headers: HeaderFieldList::new(),
        });
        true
    }

    fn on_header(&mut self, name: Bytes, value: Bytes) -> bool {
        // incoming connection-level headers (Connection, Keep-Alive, TE, Upgrade) are accepted
        // and stored here for the transport's use, per `spec.md` §4.3 — only the *outgoing* side
        // rejects them (see `h1::response::HttpResponse::set_header`).
        if let Some(scratch) = &mut self.scratch {
            scratch.headers.push(name, value);
        }
        true
    }

    fn on_headers_end(&mut self, body: TransferCoding) -> bool {
        if self.scratch.is_none() {
            return false;
        }
        self.dispatch(body);
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{log::LogAggregator, reactor::executor::SpawnLocalExecutor};
    use std::rc::Rc;
    use tokio::task::LocalSet;

    struct Echo;

    #[async_trait::async_trait(?Send)]
    impl HttpHandler for Echo {
        async fn invoke(&self, request: HttpRequest, response: HttpResponse) -> Result<(), HandlerError> {
            request.mark_handled();
            response.set_status(200);
            response.set_fixed_length(0);
            response.complete();
            Ok(())
        }
    }

    struct NotFoundByOmission;

    #[async_trait::async_trait(?Send)]
    impl HttpHandler for NotFoundByOmission {
        async fn invoke(&self, _request: HttpRequest, response: HttpResponse) -> Result<(), HandlerError> {
            // never calls mark_handled or set_status.
            response.set_fixed_length(0);
            response.complete();
            Ok(())
        }
    }

    fn log() -> LogSource {
        LogAggregator::new().source("test.channel")
    }

    #[tokio::test]
    async fn dispatched_request_completes_with_handler_status() {
        LocalSet::new()
            .run_until(async {
                let executor = Rc::new(SpawnLocalExecutor);
                let mut channel = HttpChannel::new(Rc::new(Echo), executor, 1024, log(), None);

                assert!(channel.on_message_begin(Bytes::from_static(b"GET"), Bytes::from_static(b"/"), HttpVersion::Http11));
                assert!(channel.on_headers_end(TransferCoding::length(0)));

                let mut handle = channel.take_response_handle().expect("response handle");
                // the handler runs on a spawned local task; draining its body channel to EOF
                // synchronizes with that task having already called `complete()`.
                assert_eq!(handle.next_chunk().await, None);
                assert_eq!(handle.status(), 200);
                assert!(handle.is_completed());
            })
            .await;
    }

    #[tokio::test]
    async fn unhandled_request_is_forced_to_404() {
        LocalSet::new()
            .run_until(async {
                let executor = Rc::new(SpawnLocalExecutor);
                let mut channel = HttpChannel::new(Rc::new(NotFoundByOmission), executor, 1024, log(), None);

                assert!(channel.on_message_begin(
                    Bytes::from_static(b"GET"),
                    Bytes::from_static(b"/missing"),
                    HttpVersion::Http11
                ));
                assert!(channel.on_headers_end(TransferCoding::length(0)));

                let mut handle = channel.take_response_handle().expect("response handle");
                assert_eq!(handle.next_chunk().await, None);
                assert_eq!(handle.status(), 404);
            })
            .await;
    }

    #[tokio::test]
    async fn unsupported_version_aborts_before_dispatch() {
        let executor = Rc::new(SpawnLocalExecutor);
        let mut channel = HttpChannel::new(Rc::new(Echo), executor, 1024, log(), None);

        assert!(!channel.on_message_begin(Bytes::from_static(b"GET"), Bytes::from_static(b"/"), HttpVersion::Http20));
        assert!(matches!(channel.take_abort_reason(), Some(TransportError::VersionUnsupported)));
        assert!(channel.take_response_handle().is_none());
    }
}
