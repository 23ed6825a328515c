//! growable byte buffer with a tracked mark and cheap zero-copy subranges (`spec.md` §3).
//!
//! `Buffer` reserves its maximum size up front (Design Note (a): "disallowing realloc while any
//! subrange is live, by reserving the maximum request size up front"), so a [`Subrange`] handed
//! out while parsing never needs rebasing against a reallocated backing store. Once a message's
//! head is fully buffered the bytes are frozen and split off into an independently-owned,
//! reference-counted [`bytes::Bytes`] — that freeze is the only allocation-adjacent operation the
//! parser performs, and it happens exactly once per message head.

use bytes::{Bytes, BytesMut};

/// a zero-copy `(offset, length)` reference into a buffer, realized as a ref-counted slice.
///
/// `Subrange` is just [`bytes::Bytes`]: cloning/slicing it bumps a refcount rather than copying,
/// and because the parent [`Buffer`] never reallocates while a subrange derived from it is live,
/// the offset/length baked into a `Bytes::slice` stays valid for the subrange's entire lifetime.
pub type Subrange = Bytes;

/// growable byte buffer fed by `Endpoint::fill` and consumed by the HTTP/1 parser.
#[derive(Debug, Default)]
pub struct Buffer {
    bytes: BytesMut,
    /// position up to which the parser has already consumed bytes; never rewound except by
    /// [`Buffer::compact`].
    mark: usize,
}

impl Buffer {
    pub fn new() -> Self {
        Self {
            bytes: BytesMut::new(),
            mark: 0,
        }
    }

    /// construct a buffer whose backing storage is reserved to `capacity` up front. parsing a
    /// message whose head would exceed `capacity` must fail with a size-limit protocol error
    /// rather than let the buffer grow past it (see `h1::parser::Parser`'s `max_head_size`).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
            mark: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.bytes.capacity()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// append bytes delivered by the endpoint. panics never occur here: `BytesMut::extend`
    /// grows as needed, but callers that care about Design Note (a) should pre-size via
    /// [`Buffer::with_capacity`] and treat growth past that size as a caller-level bug.
    pub fn append(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    #[inline]
    pub fn mark(&self) -> usize {
        self.mark
    }

    #[inline]
    pub fn set_mark(&mut self, mark: usize) {
        debug_assert!(mark <= self.bytes.len());
        self.mark = mark;
    }

    /// remaining unparsed bytes from `mark` onward.
    #[inline]
    pub fn unparsed(&self) -> &[u8] {
        &self.bytes[self.mark..]
    }

    /// rewrite a single already-buffered byte in place. used exclusively by
    /// [`crate::h1::parser`] to fold obsolete line-wrapped header continuations (a CRLF followed
    /// by SP/HT) into a single space without disturbing the header value's span, per `spec.md`
    /// §4.2: "LWS ... is accepted and folded by back-tracking the write mark."
    #[inline]
    pub(crate) fn overwrite(&mut self, pos: usize, byte: u8) {
        self.bytes[pos] = byte;
    }

    /// freeze and split off the first `len` bytes as an independent [`Subrange`], resetting the
    /// mark to 0 for what remains. used once per message head and once per decoded body chunk.
    pub fn split_to(&mut self, len: usize) -> Subrange {
        let frozen = self.bytes.split_to(len).freeze();
        self.mark = self.mark.saturating_sub(len);
        frozen
    }

    /// drop everything already consumed and shift the remainder to the front, so a long-lived
    /// connection's buffer doesn't retain unbounded dead space across pipelined requests.
    pub fn compact(&mut self) {
        if self.mark > 0 {
            let _ = self.bytes.split_to(self.mark);
            self.mark = 0;
        }
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
        self.mark = 0;
    }

    /// raw mutable access to the backing store, for `h1::transport::Transport` to drive
    /// `TransferCoding::decode` directly against buffered body bytes (that machinery operates on
    /// `bytes::BytesMut`, not through this type's head-parsing accessors). only valid once the
    /// head parser's mark has already been reset to `0` by a `split_to` of the consumed head —
    /// the debug assertion below catches a caller that forgot that step.
    pub(crate) fn body_buf_mut(&mut self) -> &mut BytesMut {
        debug_assert_eq!(self.mark, 0, "body decode must not run while a head parse is still pending");
        &mut self.bytes
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn subrange_survives_further_appends() {
        let mut buf = Buffer::with_capacity(64);
        buf.append(b"GET / HTTP/1.1\r\n");
        let head_len = buf.len();
        let sub = buf.split_to(head_len);
        buf.append(b"more data that would have reallocated a Vec");
        assert_eq!(&sub[..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn compact_shifts_unparsed_tail_to_front() {
        let mut buf = Buffer::with_capacity(64);
        buf.append(b"GET /one HTTP/1.1\r\n\r\nGET /two");
        buf.set_mark(22);
        buf.compact();
        assert_eq!(buf.unparsed(), b"GET /two");
    }
}
