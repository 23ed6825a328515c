//! `spec.md` §4.4: the per-connection state machine that drives [`super::parser::Parser`] and
//! [`super::channel::HttpChannel`] against an [`crate::net::Endpoint`], resolves persistence, and
//! serializes responses back onto the wire in request-arrival order.
//!
//! grounded on the teacher's `h1/dispatcher.rs::Dispatcher::_run` (the read → decode_head →
//! service.call → encode_head → body-write loop) but reshaped around this crate's explicit
//! `Reading`/`Handling`/`Writing`/`KeepAlive`/`Closing` state labels (`spec.md` §4.4's table)
//! rather than the teacher's single big loop with inline `match` arms — each label here is a
//! distinct, independently resumable point since [`crate::net::Connection`]'s callback methods can
//! return control to the caller (and be re-entered later) at any of them, unlike the teacher's
//! dispatcher which owns its own `poll`-driven future end to end.

use std::{io, net::SocketAddr, rc::Rc};

use bytes::{Bytes, BytesMut};

use crate::{
    buffer::Buffer,
    clock::Clock,
    config::ServerConfig,
    log::LogSource,
    net::{Connection, Endpoint},
    reactor::executor::LocalExecutor,
    service::HttpHandler,
};

use super::{
    channel::{ConnectionDirective, HttpChannel},
    codec::{ChunkResult, TransferCoding},
    date::DateHandle,
    encode::{encode_head, Persistence},
    error::{ProtoError, TransportError},
    header::HeaderFieldList,
    parser::{Parser, Status},
    response::{BodyLength, ResponseHandle},
    version::HttpVersion,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reading,
    Handling,
    Writing,
    KeepAlive,
    Closing,
}

/// the HTTP/1 [`Connection`] implementation. one instance per accepted socket; `H` is the user
/// handler shared (via `Rc`) across every connection a [`crate::net::ConnectionFactory`] produces.
pub struct Transport<H> {
    state: State,
    parser: Parser,
    buf: Buffer,
    channel: HttpChannel<H>,
    write_buf: BytesMut,

    /// the active body decoder for the request currently being read, carried across `on_fillable`
    /// calls when a chunk boundary falls outside the buffered data.
    body_decoder: Option<TransferCoding>,
    /// set once `HttpChannel::feed_body_chunk` reports the body exceeded `max_body_size`; forces
    /// the eventual response to 413 regardless of whatever the handler produces, per `spec.md`
    /// §4.3.
    oversized_body: bool,

    /// latched `false` the first time any condition revokes it; per the glossary's
    /// `Connection.persistent`, never re-set within the same connection.
    persistent: bool,
    requests_served: u32,
    request_max: u32,
    keep_alive_timeout_secs: u64,
    request_version: Option<HttpVersion>,

    date: Rc<DateHandle>,
    clock: Rc<dyn Clock>,
    log: LogSource,
}

impl<H> Transport<H>
where
    H: HttpHandler + 'static,
{
    pub fn new(
        handler: Rc<H>,
        executor: Rc<dyn LocalExecutor>,
        config: &ServerConfig,
        date: Rc<DateHandle>,
        clock: Rc<dyn Clock>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        let log = config.log_aggregator.source("http1.transport");
        let channel_log = config.log_aggregator.source("http1.channel");
        Self {
            state: State::Reading,
            parser: Parser::new(config.max_head_size),
            buf: Buffer::with_capacity(config.read_buffer_capacity),
            channel: HttpChannel::new(handler, executor, config.max_body_size as u64, channel_log, remote_addr),
            write_buf: BytesMut::new(),
            body_decoder: None,
            oversized_body: false,
            persistent: true,
            requests_served: 0,
            request_max: config.max_requests_per_connection,
            keep_alive_timeout_secs: config.idle_timeout.as_secs(),
            request_version: None,
            date,
            clock,
            log,
        }
    }

    /// `spec.md` §4.4 persistence rule: HTTP/1.1 without `Connection: close`, or HTTP/1.0 with
    /// `Connection: keep-alive`, and fewer than `request_max` requests served, and no protocol
    /// error or oversized body. Mutates `self.persistent` (one-way, never re-set) and returns its
    /// new value. Must be called after `self.requests_served` has already been incremented for the
    /// request currently being finished.
    fn resolve_persistence(&mut self) -> bool {
        if !self.persistent {
            return false;
        }
        let version = self.request_version.unwrap_or(HttpVersion::Http11);
        let wants_keep_alive = match self.channel.request_connection_directive() {
            Some(ConnectionDirective::Close) => false,
            Some(ConnectionDirective::KeepAlive) => true,
            None => version.default_keep_alive(),
        };
        if !wants_keep_alive || self.oversized_body {
            self.persistent = false;
        }
        if self.requests_served >= self.request_max {
            self.persistent = false;
        }
        self.persistent
    }

    /// drive the Reading state: parse as many already-buffered request heads/bodies as possible,
    /// dispatching each to the handler and writing its response, re-entering Reading immediately
    /// for any pipelined leftover per `spec.md` §4.4 ("without waiting for readable events").
    async fn drive_reading(&mut self, endpoint: &mut dyn Endpoint) {
        loop {
            if self.body_decoder.is_none() {
                match self.parser.parse(&mut self.buf, &mut self.channel) {
                    Ok(Status::NeedMoreData) => return,
                    Ok(Status::Complete { consumed }) => {
                        self.buf.split_to(consumed);
                        self.parser.reset();
                        self.request_version = self.channel.request_version();
                        self.body_decoder = self.channel.take_body_decoder();
                    }
                    Ok(Status::Aborted { .. }) => {
                        self.request_version = self.channel.request_version();
                        let reason = self
                            .channel
                            .take_abort_reason()
                            .unwrap_or(TransportError::Protocol(ProtoError::Malformed("request rejected")));
                        self.fail_request(reason, endpoint).await;
                        return;
                    }
                    Err(e) => {
                        self.fail_request(TransportError::from(e), endpoint).await;
                        return;
                    }
                }
            }

            if let Some(mut decoder) = self.body_decoder.take() {
                loop {
                    match decoder.decode(self.buf.body_buf_mut()) {
                        ChunkResult::Ok(bytes) => {
                            if !self.channel.feed_body_chunk(bytes).await {
                                self.oversized_body = true;
                                self.channel.end_body();
                                break;
                            }
                        }
                        ChunkResult::Eof | ChunkResult::AlreadyEof => {
                            self.channel.end_body();
                            break;
                        }
                        ChunkResult::InsufficientData => {
                            self.body_decoder = Some(decoder);
                            return;
                        }
                        ChunkResult::Err(_) => {
                            self.channel.end_body();
                            self.fail_request(
                                TransportError::Protocol(ProtoError::Malformed("invalid body framing")),
                                endpoint,
                            )
                            .await;
                            return;
                        }
                    }
                }
            }

            let response = self
                .channel
                .take_response_handle()
                .expect("a completed head dispatch always produces a response handle");
            self.state = State::Handling;
            self.drive_handling(response).await;
            self.drive_writing(endpoint).await;

            if self.state != State::Reading {
                return;
            }
        }
    }

    /// drain the handler's response to completion, resolve persistence, and encode the head +
    /// buffered body into `self.write_buf`. buffering the whole body rather than streaming
    /// chunk-by-chunk is deliberate: the handler-contract's 404/500 status substitution
    /// (`h1::channel::HttpChannel::dispatch`) only takes effect once the handler's future
    /// resolves, which is exactly when `ResponseHandle::next_chunk` yields its final `None` — so
    /// `status()`/`headers()`/`body_length()` are only safe to read after that point.
    async fn drive_handling(&mut self, mut response: ResponseHandle) {
        let mut chunks: Vec<Bytes> = Vec::new();
        while let Some(chunk) = response.next_chunk().await {
            chunks.push(chunk);
        }

        let status = if self.oversized_body { 413 } else { response.status() };
        let reason = if self.oversized_body { None } else { response.reason() };
        let headers = response.headers().clone();
        let body_length = if self.oversized_body {
            BodyLength::Fixed(0)
        } else {
            response.body_length()
        };

        self.requests_served += 1;
        let keep_alive = self.resolve_persistence();
        let persistence = Persistence {
            keep_alive,
            timeout_secs: self.keep_alive_timeout_secs,
            requests_remaining: self.request_max.saturating_sub(self.requests_served),
        };
        let version = self.request_version.unwrap_or(HttpVersion::Http11);

        let mut encoder = encode_head(
            status,
            reason.as_deref(),
            &headers,
            body_length,
            version,
            &persistence,
            &self.date,
            &mut self.write_buf,
        );

        if !self.oversized_body {
            for chunk in chunks {
                encoder.encode(chunk, &mut self.write_buf);
            }
        }
        encoder.encode_eof(&mut self.write_buf);
    }

    /// flush `self.write_buf` as far as the endpoint allows right now; pauses in `Writing` if the
    /// socket would block (resumed by a later `on_flushable`), otherwise transitions onward via
    /// [`Self::finish_write`].
    async fn drive_writing(&mut self, endpoint: &mut dyn Endpoint) {
        self.state = State::Writing;
        if !self.write_buf.is_empty() {
            endpoint.set_corking(true);
            while !self.write_buf.is_empty() {
                match endpoint.flush(&self.write_buf) {
                    Ok(0) => return,
                    Ok(n) => {
                        let _ = self.write_buf.split_to(n);
                        endpoint.idle_timeout_mut().touch(self.clock.now());
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                    Err(e) => {
                        self.log.error(&format!("write failed: {e}"));
                        self.persistent = false;
                        self.state = State::Closing;
                        endpoint.close();
                        return;
                    }
                }
            }
            endpoint.set_corking(false);
        }
        self.finish_write(endpoint).await;
    }

    /// `self.write_buf` is fully flushed: close if persistence was lost, otherwise reset for the
    /// next request and re-enter Reading immediately if pipelined bytes are already buffered.
    async fn finish_write(&mut self, endpoint: &mut dyn Endpoint) {
        if !self.persistent {
            self.state = State::Closing;
            endpoint.close();
            return;
        }

        self.channel.reset();
        self.body_decoder = None;
        self.oversized_body = false;
        self.request_version = None;
        self.state = State::KeepAlive;
        endpoint.idle_timeout_mut().activate(self.clock.now());

        if !self.buf.unparsed().is_empty() {
            self.state = State::Reading;
            self.drive_reading(endpoint).await;
        }
    }

    /// `spec.md` §7: write the error status this `err` implies (if any) and close; errors with no
    /// status (`Io`/`TimeoutExpired`/`ProgrammerError`) close without attempting a response.
    async fn fail_request(&mut self, err: TransportError, endpoint: &mut dyn Endpoint) {
        self.persistent = false;
        self.body_decoder = None;
        self.log.warn(&format!("request failed: {err}"));
        match err.status_code() {
            Some(status) => {
                self.queue_error_response(status);
                self.drive_writing(endpoint).await;
            }
            None => {
                self.state = State::Closing;
                endpoint.close();
            }
        }
    }

    fn queue_error_response(&mut self, status: u16) {
        self.requests_served += 1;
        let version = self.request_version.unwrap_or(HttpVersion::Http11);
        let persistence = Persistence {
            keep_alive: false,
            timeout_secs: 0,
            requests_remaining: 0,
        };
        let headers = HeaderFieldList::new();
        let mut encoder = encode_head(
            status,
            None,
            &headers,
            BodyLength::Empty,
            version,
            &persistence,
            &self.date,
            &mut self.write_buf,
        );
        encoder.encode_eof(&mut self.write_buf);
    }
}

fn drain_and_discard(endpoint: &mut dyn Endpoint) {
    let mut scratch = [0u8; 4096];
    loop {
        match endpoint.fill(&mut scratch) {
            Ok(0) => break,
            Ok(_) => continue,
            Err(_) => break,
        }
    }
}

#[async_trait::async_trait(?Send)]
impl<H> Connection for Transport<H>
where
    H: HttpHandler + 'static,
{
    async fn on_open(&mut self, endpoint: &mut dyn Endpoint) {
        endpoint.idle_timeout_mut().activate(self.clock.now());
    }

    async fn on_close(&mut self, endpoint: &mut dyn Endpoint) {
        endpoint.idle_timeout_mut().deactivate();
    }

    async fn on_fillable(&mut self, endpoint: &mut dyn Endpoint) {
        if self.state == State::Closing {
            drain_and_discard(endpoint);
            return;
        }

        let mut scratch = [0u8; 8192];
        loop {
            match endpoint.fill(&mut scratch) {
                Ok(0) => break,
                Ok(n) => {
                    self.buf.append(&scratch[..n]);
                    endpoint.idle_timeout_mut().touch(self.clock.now());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    self.log.error(&format!("read failed: {e}"));
                    self.persistent = false;
                    self.state = State::Closing;
                    endpoint.close();
                    return;
                }
            }
        }

        // `Handling`/`Writing` just buffer pipelined bytes (`spec.md` §4.4's table); only
        // `Reading`/`KeepAlive` act on them immediately.
        if matches!(self.state, State::Reading | State::KeepAlive) {
            self.state = State::Reading;
            self.drive_reading(endpoint).await;
        }
    }

    async fn on_flushable(&mut self, endpoint: &mut dyn Endpoint) {
        if matches!(self.state, State::Writing | State::Closing) {
            self.drive_writing(endpoint).await;
        }
    }

    async fn on_read_timeout(&mut self, endpoint: &mut dyn Endpoint) {
        self.persistent = false;
        if self.state == State::Writing {
            // best-effort: try to get whatever is already encoded onto the wire, but the outcome
            // no longer matters — the connection is closing either way.
            let _ = endpoint.flush(&self.write_buf);
        }
        self.state = State::Closing;
        endpoint.close();
    }

    fn set_input_buffer_size(&mut self, size: usize) {
        self.buf = Buffer::with_capacity(size);
    }

    fn wants_flush(&self) -> bool {
        matches!(self.state, State::Writing | State::Closing) && !self.write_buf.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        clock::SystemClock,
        config::ServerConfig,
        h1::{date::DateState, request::HttpRequest, response::HttpResponse},
        net::mock::MockEndpoint,
        reactor::executor::SpawnLocalExecutor,
        service::HandlerError,
    };
    use std::{cell::RefCell, time::Duration};
    use tokio::task::LocalSet;

    struct EchoPath;

    #[async_trait::async_trait(?Send)]
    impl HttpHandler for EchoPath {
        async fn invoke(&self, request: HttpRequest, response: HttpResponse) -> Result<(), HandlerError> {
            request.mark_handled();
            response.set_status(200);
            let body = Bytes::copy_from_slice(format!("{}\n", request.uri()).as_bytes());
            response.set_fixed_length(body.len() as u64);
            response.write(body).await.ok();
            response.complete();
            Ok(())
        }
    }

    fn transport(config: ServerConfig) -> Transport<EchoPath> {
        let date = Rc::new(RefCell::new(DateState::new()));
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let executor: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
        Transport::new(Rc::new(EchoPath), executor, &config, date, clock, None)
    }

    #[tokio::test]
    async fn single_request_round_trips_with_keep_alive() {
        LocalSet::new()
            .run_until(async {
                let mut t = transport(ServerConfig::default());
                let mut ep = MockEndpoint::new(Duration::from_secs(60));
                ep.push_inbound(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n");

                t.on_fillable(&mut ep).await;

                let text = String::from_utf8(ep.written().to_vec()).unwrap();
                assert!(text.starts_with("HTTP/1.1 200 OK"));
                assert!(text.contains("connection: keep-alive"));
                assert!(text.contains("keep-alive: timeout=60, max=99"));
                assert!(text.ends_with("/hello\n"));
                assert!(ep.is_open());
            })
            .await;
    }

    #[tokio::test]
    async fn pipelined_requests_are_answered_in_order() {
        LocalSet::new()
            .run_until(async {
                let mut t = transport(ServerConfig::default());
                let mut ep = MockEndpoint::new(Duration::from_secs(60));
                ep.push_inbound(b"GET /one HTTP/1.1\r\n\r\nGET /two HTTP/1.1\r\n\r\n");

                t.on_fillable(&mut ep).await;

                let text = String::from_utf8(ep.written().to_vec()).unwrap();
                let one = text.find("/one\n").expect("first response present");
                let two = text.find("/two\n").expect("second response present");
                assert!(one < two, "responses must appear in request-arrival order");
                assert!(text.contains("max=99"));
                assert!(text.contains("max=98"));
            })
            .await;
    }

    #[tokio::test]
    async fn unsupported_version_emits_505_and_closes() {
        LocalSet::new()
            .run_until(async {
                let mut t = transport(ServerConfig::default());
                let mut ep = MockEndpoint::new(Duration::from_secs(60));
                ep.push_inbound(b"GET / HTTP/2.0\r\n\r\n");

                t.on_fillable(&mut ep).await;

                let text = String::from_utf8(ep.written().to_vec()).unwrap();
                assert!(text.starts_with("HTTP/1.1 505"));
                assert!(text.contains("connection: close"));
                assert!(!ep.is_open());
            })
            .await;
    }

    #[tokio::test]
    async fn connection_close_header_revokes_persistence() {
        LocalSet::new()
            .run_until(async {
                let mut t = transport(ServerConfig::default());
                let mut ep = MockEndpoint::new(Duration::from_secs(60));
                ep.push_inbound(b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n");

                t.on_fillable(&mut ep).await;

                let text = String::from_utf8(ep.written().to_vec()).unwrap();
                assert!(text.contains("connection: close"));
                assert!(!ep.is_open());
            })
            .await;
    }
}
