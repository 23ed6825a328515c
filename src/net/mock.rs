//! in-memory [`Endpoint`], grounded on the role of `xzero-base/net/LocalConnector.h` ("inject
//! crafted HTTP client connections... ideal for unit-testing your server logic") and
//! `xzero-http/mock/MockTransport.h`. Unlike the original's `LocalConnector`, which injects a
//! whole request message at once, `MockEndpoint` works at the byte level so it can feed a
//! `Transport` one fragment at a time — the granularity `tests/parser_chunk_boundary.rs` and
//! `tests/keep_alive_pipelining.rs` need.

use std::{
    collections::VecDeque,
    io,
    time::Duration,
};

use async_trait::async_trait;

use super::{idle_timeout::IdleTimeout, Endpoint};

/// one side of an in-memory duplex byte stream. `inbound` holds bytes queued for the transport to
/// `fill()`; `outbound` accumulates whatever the transport `flush()`es, for test assertions.
pub struct MockEndpoint {
    inbound: VecDeque<u8>,
    /// set once the test simulates the peer half-closing its write side; distinguishes "nothing
    /// queued yet" (`fill` should report `WouldBlock`, matching a real non-blocking socket) from
    /// "nothing queued, ever again" (`fill` reports `Ok(0)`, matching `Endpoint::fill`'s EOF
    /// contract). A mock that always returned `Ok(0)` on an empty queue would make every pipelined
    /// read-ahead look like the peer closed the connection.
    eof: bool,
    outbound: Vec<u8>,
    open: bool,
    idle_timeout: IdleTimeout,
    corked: bool,
}

impl MockEndpoint {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            inbound: VecDeque::new(),
            eof: false,
            outbound: Vec::new(),
            open: true,
            idle_timeout: IdleTimeout::new(idle_timeout),
            corked: false,
        }
    }

    /// queue bytes as if the peer had just sent them; the next `fill()` call will return them.
    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.extend(data);
    }

    /// simulate the peer half-closing its write side: once the queued bytes are drained, `fill`
    /// reports EOF (`Ok(0)`) instead of `WouldBlock`.
    pub fn push_eof(&mut self) {
        self.eof = true;
    }

    /// everything written via `flush()` so far.
    pub fn written(&self) -> &[u8] {
        &self.outbound
    }

    pub fn clear_written(&mut self) {
        self.outbound.clear();
    }

    pub fn is_corked(&self) -> bool {
        self.corked
    }
}

#[async_trait(?Send)]
impl Endpoint for MockEndpoint {
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.inbound.is_empty() {
            return if self.eof {
                Ok(0)
            } else {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            };
        }
        let n = buf.len().min(self.inbound.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.inbound.pop_front().unwrap();
        }
        Ok(n)
    }

    fn flush(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outbound.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn want_fill(&mut self) -> io::Result<()> {
        // the mock never blocks: data is either already queued or never coming. test code drives
        // fragments explicitly via `push_inbound` between `step()` calls rather than relying on
        // this future ever being pending.
        Ok(())
    }

    async fn want_flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn idle_timeout(&self) -> &IdleTimeout {
        &self.idle_timeout
    }

    fn idle_timeout_mut(&mut self) -> &mut IdleTimeout {
        &mut self.idle_timeout
    }

    fn set_corking(&mut self, enabled: bool) {
        self.corked = enabled;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fill_drains_queued_inbound_bytes() {
        let mut ep = MockEndpoint::new(Duration::from_secs(60));
        ep.push_inbound(b"hello");
        let mut buf = [0u8; 3];
        assert_eq!(ep.fill(&mut buf).unwrap(), 3);
        assert_eq!(&buf, b"hel");
        let mut rest = [0u8; 8];
        assert_eq!(ep.fill(&mut rest).unwrap(), 2);
        assert_eq!(&rest[..2], b"lo");
    }

    #[test]
    fn flush_accumulates_into_written() {
        let mut ep = MockEndpoint::new(Duration::from_secs(60));
        ep.flush(b"HTTP/1.1 200").unwrap();
        ep.flush(b" OK\r\n").unwrap();
        assert_eq!(ep.written(), b"HTTP/1.1 200 OK\r\n");
    }
}
