//! request body delivery channel, grounded on the role of `h1/body.rs`'s
//! `RequestBody`/`RequestBodySender` (a single-producer-single-consumer channel between the
//! transport, which feeds decoded chunks, and the handler, which reads them) but built on
//! `tokio::sync::mpsc` rather than a hand-rolled waker-driven `Inner` — this crate has no
//! io-uring body variant to share a common enum with, so the extra machinery the teacher needs to
//! unify those two paths buys nothing here.

use std::io;

use bytes::Bytes;
use futures_core::Stream;
use tokio::sync::mpsc;

/// bounded channel capacity: body chunks are produced as fast as the socket yields them but a
/// slow handler must not let the transport buffer unboundedly ahead of it.
const CHANNEL_CAPACITY: usize = 16;

/// handler-facing read end of a request body. `spec.md` §4.3: "defers body delivery until the
/// handler reads from `HttpInput`" — chunks only start flowing once something polls this stream,
/// because the `mpsc::Receiver` itself exerts the backpressure the channel relies on.
pub struct HttpInput {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

impl HttpInput {
    /// a body handle that yields nothing (no body on this request).
    pub fn empty() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self { rx }
    }

    pub(crate) fn channel() -> (HttpInputSender, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (HttpInputSender { tx }, Self { rx })
    }

    /// read the next body chunk, or `None` at EOF.
    pub async fn next_chunk(&mut self) -> Option<io::Result<Bytes>> {
        self.rx.recv().await
    }
}

impl Stream for HttpInput {
    type Item = io::Result<Bytes>;

    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// transport-facing write end of a request body; feeds decoded chunks as `TransferCoding::decode`
/// produces them.
#[derive(Clone)]
pub(crate) struct HttpInputSender {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl HttpInputSender {
    pub async fn feed_data(&self, chunk: Bytes) -> Result<(), ()> {
        self.tx.send(Ok(chunk)).await.map_err(|_| ())
    }

    pub async fn feed_error(&self, e: io::Error) {
        let _ = self.tx.send(Err(e)).await;
    }

    // EOF is signaled by dropping the sender; `mpsc::Receiver::recv` then yields `None`.
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn empty_input_yields_no_chunks() {
        let mut input = HttpInput::empty();
        assert!(input.next_chunk().await.is_none());
    }

    #[tokio::test]
    async fn sender_drop_signals_eof() {
        let (sender, mut input) = HttpInput::channel();
        sender.feed_data(Bytes::from_static(b"hi")).await.unwrap();
        drop(sender);

        assert_eq!(input.next_chunk().await.unwrap().unwrap(), Bytes::from_static(b"hi"));
        assert!(input.next_chunk().await.is_none());
    }
}
