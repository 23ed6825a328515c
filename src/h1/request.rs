//! `spec.md` §3: "HttpRequest — method (token), path+query (raw URI), version, headers,
//! content-length hint, a bounded input stream handle, and a `handled` flag." Grounded on the
//! shape of the teacher's `Request<B>` (`request.rs`), flattened into one concrete struct since
//! this crate has no generic body type to parameterize over — `HttpInput` is the only body type.

use std::cell::Cell;
use std::net::SocketAddr;
use std::rc::Rc;

use bytes::Bytes;

use super::{body::HttpInput, header::HeaderFieldList, version::HttpVersion};

pub struct HttpRequest {
    method: Bytes,
    uri: Bytes,
    version: HttpVersion,
    headers: HeaderFieldList,
    content_length: Option<u64>,
    input: HttpInput,
    remote_addr: Option<SocketAddr>,
    /// set by the handler to acknowledge it recognized the request; shared via `Rc` with
    /// `h1::channel` (which takes ownership of this `HttpRequest` to hand to the handler) so the
    /// channel can still observe it afterward and apply the "unhandled → 404" rule of `spec.md`
    /// §4.3.
    handled: Rc<Cell<bool>>,
}

impl HttpRequest {
    pub(crate) fn new(
        method: Bytes,
        uri: Bytes,
        version: HttpVersion,
        headers: HeaderFieldList,
        content_length: Option<u64>,
        input: HttpInput,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            method,
            uri,
            version,
            headers,
            content_length,
            input,
            remote_addr,
            handled: Rc::new(Cell::new(false)),
        }
    }

    pub fn method(&self) -> &str {
        std::str::from_utf8(&self.method).unwrap_or("")
    }

    pub fn uri(&self) -> &str {
        std::str::from_utf8(&self.uri).unwrap_or("")
    }

    pub fn version(&self) -> HttpVersion {
        self.version
    }

    pub fn headers(&self) -> &HeaderFieldList {
        &self.headers
    }

    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn input(&mut self) -> &mut HttpInput {
        &mut self.input
    }

    /// the handler calls this to acknowledge it recognized the request. a handler that completes
    /// the response without ever calling this is treated as a 404 by `h1::channel`, per
    /// `spec.md` §4.3.
    pub fn mark_handled(&self) {
        self.handled.set(true);
    }

    pub fn is_handled(&self) -> bool {
        self.handled.get()
    }

    /// a clone of the shared `handled` flag, for `h1::channel` to retain after handing this
    /// request (by value) to [`crate::service::HttpHandler::invoke`].
    pub(crate) fn handled_flag(&self) -> Rc<Cell<bool>> {
        self.handled.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::h1::body::HttpInput;

    #[test]
    fn handled_flag_starts_false() {
        let req = HttpRequest::new(
            Bytes::from_static(b"GET"),
            Bytes::from_static(b"/"),
            HttpVersion::Http11,
            HeaderFieldList::new(),
            None,
            HttpInput::empty(),
            None,
        );
        assert!(!req.is_handled());
        req.mark_handled();
        assert!(req.is_handled());
    }
}
