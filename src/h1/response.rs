//! `spec.md` §3: "HttpResponse — status code, status reason (optional; defaulted from code),
//! headers, a content-length or chunked indicator, and a write-output handle. Lifecycle: created
//! at message start, mutated by the handler until `completed()`, then consumed by the transport."
//!
//! the status-line/body-size mechanics are grounded on `h1/proto/encode.rs`'s
//! `encode_version_status_reason`/`encode_headers`; the one-shot completion guard is
//! `SPEC_FULL.md` §9's resolved design note: "a `taken: Cell<bool>` flag on `HttpResponse` that
//! panics with a `ProgrammerError` on double-completion."

use std::{cell::Cell, rc::Rc};

use bytes::Bytes;
use tokio::sync::mpsc;

use super::header::{HeaderFieldList, CONNECTION_LEVEL_RESPONSE_HEADERS};

/// how the response body is framed, chosen by whichever of `set_fixed_length`/`set_chunked` the
/// handler calls (or inferred `Empty` if neither is called before `complete`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyLength {
    Fixed(u64),
    Chunked,
    Empty,
}

/// mutable response head, shared between the handler-facing [`HttpResponse`] and the
/// transport-facing [`ResponseHandle`] so the transport can read the finished head without taking
/// ownership away from the handler mid-request.
pub(crate) struct ResponseHead {
    pub status: u16,
    /// whether the handler itself ever called [`HttpResponse::set_status`], as opposed to the
    /// default `200` or a channel-forced override — `spec.md` §4.3: "if the handler fails to set
    /// a status, status 500 is substituted."
    pub status_set: bool,
    pub reason: Option<Bytes>,
    pub headers: HeaderFieldList,
    pub body_length: BodyLength,
}

impl ResponseHead {
    fn new() -> Self {
        Self {
            status: 200,
            status_set: false,
            reason: None,
            headers: HeaderFieldList::new(),
            body_length: BodyLength::Empty,
        }
    }
}

/// the value the handler actually gets; writes to it stream body chunks to the transport over an
/// internal channel, and `complete()` signals end-of-body.
///
/// `Clone` shares the same underlying state (all fields are `Rc`-based) — `h1::channel` keeps a
/// clone alongside the one handed to the handler so it can apply the handler-contract's
/// status-substitution rules (`spec.md` §4.3) after `invoke` resolves.
#[derive(Clone)]
pub struct HttpResponse {
    head: Rc<std::cell::RefCell<ResponseHead>>,
    body_tx: Rc<std::cell::RefCell<Option<mpsc::Sender<Bytes>>>>,
    taken: Rc<Cell<bool>>,
}

/// the transport's side of one response: reads the finished head and drains body chunks as the
/// handler produces them.
pub(crate) struct ResponseHandle {
    head: Rc<std::cell::RefCell<ResponseHead>>,
    body_rx: mpsc::Receiver<Bytes>,
    taken: Rc<Cell<bool>>,
}

impl HttpResponse {
    pub(crate) fn channel() -> (Self, ResponseHandle) {
        let head = Rc::new(std::cell::RefCell::new(ResponseHead::new()));
        let (body_tx, body_rx) = mpsc::channel(16);
        let taken = Rc::new(Cell::new(false));
        (
            Self {
                head: head.clone(),
                body_tx: Rc::new(std::cell::RefCell::new(Some(body_tx))),
                taken: taken.clone(),
            },
            ResponseHandle { head, body_rx, taken },
        )
    }

    pub fn set_status(&self, status: u16) {
        let mut head = self.head.borrow_mut();
        head.status = status;
        head.status_set = true;
    }

    /// override the canonical reason phrase for `status`; leaving this unset defaults the reason
    /// from the status code at encode time (`h1::encode::canonical_reason`).
    pub fn set_reason(&self, reason: impl Into<Bytes>) {
        self.head.borrow_mut().reason = Some(reason.into());
    }

    /// set a response header. connection-level headers the transport owns exclusively
    /// (`Connection`, `Keep-Alive`, `Transfer-Encoding`, `TE`, `Upgrade`, `Date`, `Server`) are
    /// silently dropped per `spec.md` §4.3's "reject connection-level headers if supplied by the
    /// user."
    pub fn set_header(&self, name: impl Into<Bytes>, value: impl Into<Bytes>) {
        let name = name.into();
        if CONNECTION_LEVEL_RESPONSE_HEADERS
            .iter()
            .any(|reserved| name.eq_ignore_ascii_case(reserved.as_bytes()))
        {
            return;
        }
        self.head.borrow_mut().headers.push(name, value);
    }

    pub fn set_fixed_length(&self, len: u64) {
        self.head.borrow_mut().body_length = BodyLength::Fixed(len);
    }

    pub fn set_chunked(&self) {
        self.head.borrow_mut().body_length = BodyLength::Chunked;
    }

    /// queue one body chunk. returns `Err` if the transport side has already gone away (e.g. the
    /// connection was aborted) or the response was already completed.
    pub async fn write(&self, chunk: Bytes) -> Result<(), ()> {
        let tx = self.body_tx.borrow().clone();
        match tx {
            Some(tx) => tx.send(chunk).await.map_err(|_| ()),
            None => Err(()),
        }
    }

    /// mark the response complete: no more body chunks will be sent. panics if called twice,
    /// per the one-shot completion-hook design note — a handler completing the same response
    /// object more than once is a bug in that handler, not a recoverable protocol condition.
    pub fn complete(&self) {
        if self.taken.replace(true) {
            panic!("ProgrammerError: HttpResponse::complete called twice on the same response");
        }
        // dropping the sender closes the channel, which is how `ResponseHandle` learns the body
        // stream ended.
        self.body_tx.borrow_mut().take();
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.taken.get()
    }

    pub(crate) fn status_was_set(&self) -> bool {
        self.head.borrow().status_set
    }

    /// overwrite the status code directly, bypassing `status_set` bookkeeping — used by
    /// `h1::channel` to apply the handler contract's 404/500 substitution rules, which are
    /// channel-driven overrides rather than the handler's own choice.
    pub(crate) fn force_status(&self, status: u16) {
        self.head.borrow_mut().status = status;
    }
}

impl ResponseHandle {
    pub(crate) fn status(&self) -> u16 {
        self.head.borrow().status
    }

    pub(crate) fn reason(&self) -> Option<Bytes> {
        self.head.borrow().reason.clone()
    }

    pub(crate) fn body_length(&self) -> BodyLength {
        self.head.borrow().body_length
    }

    pub(crate) fn headers(&self) -> std::cell::Ref<'_, HeaderFieldList> {
        std::cell::Ref::map(self.head.borrow(), |h| &h.headers)
    }

    pub(crate) async fn next_chunk(&mut self) -> Option<Bytes> {
        self.body_rx.recv().await
    }

    pub(crate) fn is_completed(&self) -> bool {
        self.taken.get()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn handler_writes_are_observed_by_transport_handle() {
        let (resp, mut handle) = HttpResponse::channel();
        resp.set_status(201);
        resp.set_fixed_length(5);
        resp.write(Bytes::from_static(b"hello")).await.unwrap();
        resp.complete();

        assert_eq!(handle.status(), 201);
        assert_eq!(handle.body_length(), BodyLength::Fixed(5));
        assert_eq!(handle.next_chunk().await, Some(Bytes::from_static(b"hello")));
        assert_eq!(handle.next_chunk().await, None);
    }

    #[tokio::test]
    #[should_panic(expected = "ProgrammerError")]
    async fn double_complete_panics() {
        let (resp, _handle) = HttpResponse::channel();
        resp.complete();
        resp.complete();
    }
}
