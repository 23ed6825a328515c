//! the HTTP/1 request-line + header-block parser (`spec.md` §4.2).
//!
//! grounded on `xzero-http/http1/HttpParser.cc`'s byte-at-a-time `State` machine — the teacher
//! (`HFQR-xitca-web`) parses heads in one shot via `httparse` against a fully-buffered slice and
//! retries on `Status::Partial`; this crate instead keeps its own scan position (`pos`) and token
//! start offsets across calls, so a request line or header split across two `Endpoint::fill`
//! reads resumes exactly where it left off rather than restarting the scan. Body framing still
//! reuses `super::codec::TransferCoding` — this parser never decodes body bytes itself, only
//! decides which framing applies from `Content-Length`/`Transfer-Encoding`.

use bytes::Bytes;

use crate::buffer::Buffer;

use super::{codec::TransferCoding, error::ProtoError, version::HttpVersion};

/// recipient of parse events. `on_header` is not called for `Content-Length`/`Transfer-Encoding`
/// — `spec.md` §4.2: "intercepted by the parser itself, not forwarded to the listener." Returning
/// `false` from any method aborts parsing at the current byte; `Parser::parse` then returns
/// `Status::Aborted` and the state machine remains resumable.
pub trait ParserEvents {
    fn on_message_begin(&mut self, method: Bytes, uri: Bytes, version: HttpVersion) -> bool;
    fn on_header(&mut self, name: Bytes, value: Bytes) -> bool;
    fn on_headers_end(&mut self, body: TransferCoding) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    MethodStart,
    Method,
    UriStart,
    Uri,
    VersionStart,
    Version,
    RequestLineCr,
    RequestLineLf,
    /// HTTP/0.9 request line has no version token; only the CRLF that terminates the line itself.
    Http09Lf,
    HeaderLineStart,
    HeaderName,
    HeaderLws,
    HeaderValue,
    HeaderValueCr,
    HeaderValueLf,
    HeadersEndLf,
    Done,
    ProtocolError,
}

/// outcome of one `Parser::parse` call.
pub enum Status {
    /// the fragment ended mid-head; call again once more bytes have been appended to `buf`.
    NeedMoreData,
    /// a full request head was recognized and events emitted; `consumed` bytes may now be
    /// `Buffer::split_to`-ed off and the parser is ready for the next pipelined request via
    /// [`Parser::reset`].
    Complete { consumed: usize },
    /// a listener callback returned `false`; `consumed` bytes were processed before the abort.
    Aborted { consumed: usize },
}

/// one request head's worth of parsing state. restartable at any byte boundary: every field here
/// is either a `State` tag or an absolute offset into the `Buffer` being scanned, never a copy of
/// its bytes, so appending more data never invalidates an in-progress scan (`Buffer` is pre-sized
/// to `max_head_size`, per its own design note, so it never reallocates mid-parse).
pub struct Parser {
    state: State,
    pos: usize,
    token_start: usize,
    method: Option<(usize, usize)>,
    uri: Option<(usize, usize)>,
    version: HttpVersion,
    header_name: Option<(usize, usize)>,
    content_length: Option<u64>,
    chunked: bool,
    max_head_size: usize,
}

impl Parser {
    pub fn new(max_head_size: usize) -> Self {
        Self {
            state: State::MethodStart,
            pos: 0,
            token_start: 0,
            method: None,
            uri: None,
            version: HttpVersion::Unknown,
            header_name: None,
            content_length: None,
            chunked: false,
            max_head_size,
        }
    }

    /// reset for the next pipelined request on the same connection. the scan position is *not*
    /// carried over: the caller has already `Buffer::split_to`-ed the consumed head off, so
    /// offsets restart at 0 against the remaining bytes.
    pub fn reset(&mut self) {
        *self = Self::new(self.max_head_size);
    }

    pub fn is_protocol_error(&self) -> bool {
        self.state == State::ProtocolError
    }

    /// whether the scan is still somewhere inside the request line (method/URI/version) rather
    /// than the header block — distinguishes an over-limit URI (414, `spec.md` §7) from an
    /// over-limit header block (400 via `ProtoError::HeadTooLarge`).
    fn in_request_line(&self) -> bool {
        matches!(
            self.state,
            State::MethodStart
                | State::Method
                | State::UriStart
                | State::Uri
                | State::VersionStart
                | State::Version
                | State::RequestLineCr
                | State::RequestLineLf
                | State::Http09Lf
        )
    }

    /// drive the state machine against `buf.unparsed()`, starting from wherever the previous call
    /// left off. `events` receives callbacks as soon as enough of the head has been recognized;
    /// `Content-Length`/`Transfer-Encoding` headers are withheld from `on_header` and instead fold
    /// into the `TransferCoding` passed to `on_headers_end`.
    pub fn parse(&mut self, buf: &mut Buffer, events: &mut dyn ParserEvents) -> Result<Status, ProtoError> {
        let len = buf.as_slice().len();

        loop {
            if self.state == State::Done {
                return Ok(Status::Complete { consumed: self.pos });
            }
            if self.pos >= len {
                if self.pos > self.max_head_size {
                    self.state = State::ProtocolError;
                    return Err(if self.in_request_line() {
                        ProtoError::UriTooLong
                    } else {
                        ProtoError::HeadTooLarge
                    });
                }
                return Ok(Status::NeedMoreData);
            }

            let b = buf.as_slice()[self.pos];

            match self.state {
                State::MethodStart => {
                    if is_token_byte(b) {
                        self.token_start = self.pos;
                        self.state = State::Method;
                        self.pos += 1;
                    } else {
                        return self.fail(ProtoError::Malformed("empty method"));
                    }
                }
                State::Method => {
                    if b == b' ' {
                        self.method = Some((self.token_start, self.pos));
                        self.state = State::UriStart;
                        self.pos += 1;
                    } else if is_token_byte(b) {
                        self.pos += 1;
                    } else {
                        return self.fail(ProtoError::Malformed("invalid method token"));
                    }
                }
                State::UriStart => {
                    if b == b' ' {
                        return self.fail(ProtoError::Malformed("empty request target"));
                    }
                    self.token_start = self.pos;
                    self.state = State::Uri;
                    self.pos += 1;
                }
                State::Uri => match b {
                    b' ' => {
                        self.uri = Some((self.token_start, self.pos));
                        self.state = State::VersionStart;
                        self.pos += 1;
                    }
                    b'\r' => {
                        self.uri = Some((self.token_start, self.pos));
                        self.version = HttpVersion::Http09;
                        self.state = State::Http09Lf;
                        self.pos += 1;
                    }
                    b'\n' => return self.fail(ProtoError::Malformed("bare LF in request line")),
                    _ => self.pos += 1,
                },
                State::VersionStart => {
                    if b == b' ' || b == b'\r' {
                        return self.fail(ProtoError::Malformed("empty protocol version"));
                    }
                    self.token_start = self.pos;
                    self.state = State::Version;
                    self.pos += 1;
                }
                State::Version => {
                    if b == b'\r' {
                        self.version = HttpVersion::parse(&buf.as_slice()[self.token_start..self.pos]);
                        self.state = State::RequestLineCr;
                        // reprocess this CR in RequestLineCr without re-reading the byte class
                        continue;
                    } else if b == b'\n' || b == b' ' {
                        return self.fail(ProtoError::Malformed("malformed protocol version"));
                    } else {
                        self.pos += 1;
                    }
                }
                State::RequestLineCr => {
                    debug_assert_eq!(b, b'\r');
                    self.state = State::RequestLineLf;
                    self.pos += 1;
                }
                State::RequestLineLf => {
                    if b != b'\n' {
                        return self.fail(ProtoError::Malformed("missing LF after request line"));
                    }
                    self.pos += 1;
                    if !self.version.is_supported() {
                        self.state = State::ProtocolError;
                        return Err(ProtoError::UnsupportedVersion);
                    }
                    if !self.begin_message(buf, events) {
                        return Ok(Status::Aborted { consumed: self.pos });
                    }
                    self.state = State::HeaderLineStart;
                }
                State::Http09Lf => {
                    if b != b'\n' {
                        return self.fail(ProtoError::Malformed("missing LF after request line"));
                    }
                    self.pos += 1;
                    // `spec.md` §4.2's 0.9 form is the *entire* request: method SP entity CRLF and
                    // nothing else. Any further buffered bytes mean the client sent something that
                    // does not fit 0.9's no-header-section grammar, so this is rejected rather than
                    // silently parsed as a second pipelined message (see `DESIGN.md`).
                    if self.pos < len {
                        return self.fail(ProtoError::Malformed("trailing data after HTTP/0.9 request"));
                    }
                    if !self.begin_message(buf, events) {
                        return Ok(Status::Aborted { consumed: self.pos });
                    }
                    let decoder = TransferCoding::eof();
                    if !events.on_headers_end(decoder) {
                        return Ok(Status::Aborted { consumed: self.pos });
                    }
                    self.state = State::Done;
                }
                State::HeaderLineStart => {
                    if b == b'\r' {
                        self.state = State::HeadersEndLf;
                        self.pos += 1;
                    } else if is_token_byte(b) {
                        self.token_start = self.pos;
                        self.state = State::HeaderName;
                        self.pos += 1;
                    } else {
                        return self.fail(ProtoError::Malformed("invalid header name"));
                    }
                }
                State::HeaderName => {
                    if b == b':' {
                        self.header_name = Some((self.token_start, self.pos));
                        self.state = State::HeaderLws;
                        self.pos += 1;
                    } else if is_token_byte(b) {
                        self.pos += 1;
                    } else {
                        return self.fail(ProtoError::Malformed("invalid header name"));
                    }
                }
                State::HeaderLws => {
                    if b == b' ' || b == b'\t' {
                        self.pos += 1;
                    } else {
                        self.token_start = self.pos;
                        self.state = State::HeaderValue;
                        // reprocess this byte as the first byte of the value (may be `\r` for an
                        // empty value).
                        continue;
                    }
                }
                State::HeaderValue => {
                    if b == b'\r' {
                        self.state = State::HeaderValueCr;
                        self.pos += 1;
                    } else {
                        self.pos += 1;
                    }
                }
                State::HeaderValueCr => {
                    if b != b'\n' {
                        return self.fail(ProtoError::Malformed("missing LF after header value"));
                    }
                    self.state = State::HeaderValueLf;
                    self.pos += 1;
                }
                State::HeaderValueLf => {
                    // `b` is the byte right after the CRLF just consumed (the top-of-loop
                    // `pos >= len` guard already covers waiting for it to arrive).
                    if b == b' ' || b == b'\t' {
                        // obsolete line folding: back-track the CRLF we just consumed into spaces
                        // so the value span stays contiguous (`spec.md` §4.2).
                        buf.overwrite(self.pos - 2, b' ');
                        buf.overwrite(self.pos - 1, b' ');
                        self.state = State::HeaderValue;
                    } else {
                        let value_end = self.pos - 2;
                        match self.emit_header(buf, events, value_end) {
                            Ok(true) => self.state = State::HeaderLineStart,
                            Ok(false) => return Ok(Status::Aborted { consumed: self.pos }),
                            Err(e) => return self.fail(e),
                        }
                    }
                }
                State::HeadersEndLf => {
                    if b != b'\n' {
                        return self.fail(ProtoError::Malformed("missing LF after header block"));
                    }
                    self.pos += 1;
                    let decoder = if self.chunked {
                        TransferCoding::decode_chunked()
                    } else if let Some(len) = self.content_length {
                        TransferCoding::length(len)
                    } else {
                        TransferCoding::eof()
                    };
                    if !events.on_headers_end(decoder) {
                        return Ok(Status::Aborted { consumed: self.pos });
                    }
                    self.state = State::Done;
                }
                State::Done | State::ProtocolError => unreachable!("handled above"),
            }
        }
    }

    fn fail(&mut self, err: ProtoError) -> Result<Status, ProtoError> {
        self.state = State::ProtocolError;
        Err(err)
    }

    fn begin_message(&mut self, buf: &Buffer, events: &mut dyn ParserEvents) -> bool {
        let (ms, me) = self.method.expect("method recorded before request line completes");
        let (us, ue) = self.uri.expect("uri recorded before request line completes");
        let method = Bytes::copy_from_slice(&buf.as_slice()[ms..me]);
        let uri = Bytes::copy_from_slice(&buf.as_slice()[us..ue]);
        events.on_message_begin(method, uri, self.version)
    }

    /// finish one header line: either forward it to the listener, or fold it into body framing if
    /// it is `Content-Length`/`Transfer-Encoding` (withheld from the listener per §4.2). `Ok(true)`
    /// to keep parsing, `Ok(false)` if the listener aborted, `Err` for a malformed/duplicate
    /// framing header.
    fn emit_header(
        &mut self,
        buf: &mut Buffer,
        events: &mut dyn ParserEvents,
        value_end: usize,
    ) -> Result<bool, ProtoError> {
        let (ns, ne) = self.header_name.take().expect("header name recorded before value ends");
        let name = Bytes::copy_from_slice(&buf.as_slice()[ns..ne]);
        let value = Bytes::copy_from_slice(&buf.as_slice()[self.token_start..value_end]);

        if name.eq_ignore_ascii_case(b"content-length") {
            match parse_content_length(&value) {
                Some(n) if self.content_length.map_or(true, |existing| existing == n) => {
                    self.content_length = Some(n);
                    Ok(true)
                }
                _ => Err(ProtoError::DuplicateFraming),
            }
        } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
            if value.eq_ignore_ascii_case(b"chunked") {
                self.chunked = true;
            }
            Ok(true)
        } else {
            Ok(events.on_header(name, value))
        }
    }
}

fn is_token_byte(b: u8) -> bool {
    !matches!(b, b' ' | b'\r' | b'\n')
}

fn parse_content_length(value: &[u8]) -> Option<u64> {
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        method: Option<Bytes>,
        uri: Option<Bytes>,
        version: Option<HttpVersion>,
        headers: Vec<(Bytes, Bytes)>,
        ended: Option<TransferCoding>,
    }

    impl ParserEvents for Recorder {
        fn on_message_begin(&mut self, method: Bytes, uri: Bytes, version: HttpVersion) -> bool {
            self.method = Some(method);
            self.uri = Some(uri);
            self.version = Some(version);
            true
        }
        fn on_header(&mut self, name: Bytes, value: Bytes) -> bool {
            self.headers.push((name, value));
            true
        }
        fn on_headers_end(&mut self, body: TransferCoding) -> bool {
            self.ended = Some(body);
            true
        }
    }

    fn parse_whole(input: &[u8]) -> (Parser, Buffer, Recorder, usize) {
        let mut parser = Parser::new(8 * 1024);
        let mut buf = Buffer::with_capacity(8 * 1024);
        let mut rec = Recorder::default();
        buf.append(input);
        let consumed = match parser.parse(&mut buf, &mut rec).unwrap() {
            Status::Complete { consumed } => consumed,
            _ => panic!("expected Complete"),
        };
        (parser, buf, rec, consumed)
    }

    #[test]
    fn parses_simple_get() {
        let (_p, _buf, rec, consumed) = parse_whole(b"GET /foo HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n");
        assert_eq!(rec.method.unwrap(), Bytes::from_static(b"GET"));
        assert_eq!(rec.uri.unwrap(), Bytes::from_static(b"/foo"));
        assert_eq!(rec.version.unwrap(), HttpVersion::Http11);
        assert_eq!(rec.headers, vec![
            (Bytes::from_static(b"Host"), Bytes::from_static(b"x")),
            (Bytes::from_static(b"Connection"), Bytes::from_static(b"close")),
        ]);
        assert!(matches!(rec.ended, Some(TransferCoding::Eof)));
        assert_eq!(consumed, b"GET /foo HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n".len());
    }

    #[test]
    fn chunk_boundary_invariance_byte_at_a_time() {
        let input = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let head_only = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\n";

        let mut parser = Parser::new(8 * 1024);
        let mut buf = Buffer::with_capacity(8 * 1024);
        let mut rec = Recorder::default();

        let mut consumed_total = 0;
        for &byte in &input[..head_only.len()] {
            buf.append(&[byte]);
            match parser.parse(&mut buf, &mut rec).unwrap() {
                Status::NeedMoreData => {}
                Status::Complete { consumed } => {
                    consumed_total = consumed;
                    break;
                }
                Status::Aborted { .. } => panic!("unexpected abort"),
            }
        }

        assert_eq!(consumed_total, head_only.len());
        assert_eq!(rec.method.unwrap(), Bytes::from_static(b"POST"));
        assert!(matches!(rec.ended, Some(TransferCoding::Length(5))));
    }

    #[test]
    fn chunked_wins_over_content_length() {
        let (_p, _buf, rec, _consumed) = parse_whole(
            b"POST /x HTTP/1.1\r\nContent-Length: 5\r\nTransfer-Encoding: chunked\r\n\r\n",
        );
        assert!(matches!(rec.ended, Some(TransferCoding::DecodeChunked(..))));
    }

    #[test]
    fn http09_bare_request_line_has_no_headers() {
        let (_p, _buf, rec, consumed) = parse_whole(b"GET /old\r\n");
        assert_eq!(rec.version.unwrap(), HttpVersion::Http09);
        assert!(rec.headers.is_empty());
        assert!(matches!(rec.ended, Some(TransferCoding::Eof)));
        assert_eq!(consumed, b"GET /old\r\n".len());
    }

    #[test]
    fn http09_with_trailing_bytes_is_rejected() {
        let mut parser = Parser::new(8 * 1024);
        let mut buf = Buffer::with_capacity(8 * 1024);
        let mut rec = Recorder::default();
        buf.append(b"GET /\r\n\r\n");
        let err = parser.parse(&mut buf, &mut rec).unwrap_err();
        assert!(matches!(err, ProtoError::Malformed(_)));
        assert!(parser.is_protocol_error());
    }

    #[test]
    fn unknown_version_is_protocol_error() {
        let mut parser = Parser::new(8 * 1024);
        let mut buf = Buffer::with_capacity(8 * 1024);
        let mut rec = Recorder::default();
        buf.append(b"GET / HTTP/9.9\r\n\r\n");
        let err = parser.parse(&mut buf, &mut rec).unwrap_err();
        assert!(matches!(err, ProtoError::UnsupportedVersion));
    }

    #[test]
    fn header_value_lws_folding_keeps_a_contiguous_span() {
        let (_p, _buf, rec, _consumed) = parse_whole(b"GET / HTTP/1.1\r\nX-Long: first\r\n second\r\n\r\n");
        let (_name, value) = &rec.headers[0];
        // the CRLF that introduced the continuation is folded into two spaces in place, so the
        // value's byte span stays contiguous with the original leading space of " second".
        assert_eq!(&value[..], b"first   second");
    }
}
