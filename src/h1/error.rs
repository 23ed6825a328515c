//! error taxonomy (`spec.md` §7), split into a parser-facing [`ProtoError`] (grounded on
//! `h1/proto/error.rs`'s `ProtoError`/`Parse`) and a connection-facing [`TransportError`]
//! (grounded on `h1/error.rs`'s `Error<S, B>`) carrying the policy each kind implies.

use core::fmt;
use std::io;

/// failure while parsing a request head or decoding its body, surfaced by [`super::parser`] and
/// [`super::codec`].
#[derive(Debug)]
pub enum ProtoError {
    /// malformed request line, header line, or chunk framing.
    Malformed(&'static str),
    /// request URI exceeded the configured size limit, while still inside the request line.
    UriTooLong,
    /// header block (past the request line) exceeded the configured size limit.
    HeadTooLarge,
    /// `HttpVersion::Unknown`, or a version this transport does not serve.
    UnsupportedVersion,
    /// both `Content-Length` and conflicting `Transfer-Encoding: chunked` framing set, or a
    /// second attempt to set either after one is already fixed.
    DuplicateFraming,
}

impl fmt::Display for ProtoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(what) => write!(f, "malformed request: {what}"),
            Self::UriTooLong => f.write_str("request URI exceeded the configured size limit"),
            Self::HeadTooLarge => f.write_str("request head exceeded the configured size limit"),
            Self::UnsupportedVersion => f.write_str("unsupported HTTP version"),
            Self::DuplicateFraming => f.write_str("conflicting or duplicate body framing headers"),
        }
    }
}

impl std::error::Error for ProtoError {}

/// connection-level failure, covering every row of `spec.md` §7's error taxonomy table except
/// `SystemError` (which is a [`crate::net::Connector`]-level startup failure, not a per-connection
/// one — see `net::Connector::bind`).
#[derive(Debug)]
pub enum TransportError {
    /// parser rejected the request. policy: emit 400, set persistence=false, drain the
    /// connection's remaining input, then close.
    Protocol(ProtoError),
    /// `HttpVersion` this transport does not serve. policy: emit 505, close.
    VersionUnsupported,
    /// request URI exceeded the configured limit. policy: emit 414, close.
    ///
    /// request-body-too-large is not a row here: `h1::transport` detects it mid-body (via
    /// `HttpChannel::feed_body_chunk`'s `max_body_size` check) and drives the 413 response
    /// directly through its `oversized_body` flag, since by that point a response may already be
    /// in flight for this request.
    UriTooLong,
    /// I/O failure on `fill`/`flush`. policy: abort the connection, log.
    Io(io::Error),
    /// idle timer fired. policy: abort the connection.
    TimeoutExpired,
    /// [`crate::service::HttpHandler::invoke`] failed or returned without completing the
    /// response. policy: emit 500 if headers unsent, else abort.
    HandlerFault,
    /// misuse detected at runtime (e.g. the response's completion hook invoked twice). policy:
    /// fatal — this is a bug in this crate or its caller, not a protocol condition.
    ProgrammerError(&'static str),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => fmt::Display::fmt(e, f),
            Self::VersionUnsupported => f.write_str("HTTP version not supported"),
            Self::UriTooLong => f.write_str("request URI too long"),
            Self::Io(e) => fmt::Display::fmt(e, f),
            Self::TimeoutExpired => f.write_str("idle timeout expired"),
            Self::HandlerFault => f.write_str("handler fault"),
            Self::ProgrammerError(what) => write!(f, "programmer error: {what}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl From<ProtoError> for TransportError {
    fn from(e: ProtoError) -> Self {
        match e {
            ProtoError::UnsupportedVersion => Self::VersionUnsupported,
            ProtoError::UriTooLong => Self::UriTooLong,
            other => Self::Protocol(other),
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl TransportError {
    /// whether this error still permits writing a response before closing (`Protocol`,
    /// `VersionUnsupported`, `UriTooLong` all do; `Io`/`TimeoutExpired`/`ProgrammerError` do not
    /// since the connection itself may no longer be writable, or the error indicates a bug that
    /// shouldn't be papered over with a response).
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Protocol(_) => Some(400),
            Self::VersionUnsupported => Some(505),
            Self::UriTooLong => Some(414),
            Self::HandlerFault => Some(500),
            Self::Io(_) | Self::TimeoutExpired | Self::ProgrammerError(_) => None,
        }
    }
}
