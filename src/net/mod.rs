//! endpoint/connector collaborators (`spec.md` §2/§4.5/§6).

pub mod connector;
pub mod idle_timeout;
pub mod mock;
pub mod tcp;

use std::{io, net::SocketAddr, time::Duration};

use async_trait::async_trait;

pub use connector::{Connector, ConnectorError};
pub use idle_timeout::IdleTimeout;
pub use tcp::TcpEndpoint;

/// one end of a byte-stream connection. `fill`/`flush` are non-blocking best-effort transfers;
/// `want_fill`/`want_flush` resolve once the underlying fd is next readable/writable (one-shot —
/// callers must re-arm by calling again).
#[async_trait(?Send)]
pub trait Endpoint {
    /// read as many bytes as are immediately available into `buf`. `Ok(0)` means true EOF (peer
    /// half-close, never more data); `Err` with `ErrorKind::WouldBlock` means nothing is available
    /// *yet* — the caller should `want_fill().await` and retry, not treat it as closed.
    fn fill(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// write as many bytes from `buf` as can be sent immediately. `Err` with
    /// `ErrorKind::WouldBlock` means the socket's send buffer is full right now; the caller should
    /// `want_flush().await` and retry.
    fn flush(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// resolves when the endpoint has readable data (or EOF) pending.
    async fn want_fill(&mut self) -> io::Result<()>;

    /// resolves when the endpoint can accept more written bytes.
    async fn want_flush(&mut self) -> io::Result<()>;

    /// half/full close; idempotent.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    fn idle_timeout(&self) -> &IdleTimeout;
    fn idle_timeout_mut(&mut self) -> &mut IdleTimeout;

    /// enable/disable corking (batch small writes into one segment); a no-op where the platform
    /// has no such facility.
    fn set_corking(&mut self, enabled: bool);

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

/// a live HTTP connection driven by one endpoint. `spec.md` §9's cyclic-ownership note collapses
/// to: the endpoint's owning task owns both the endpoint and its `Connection` for the connection's
/// lifetime — neither the reactor nor the connector retains a strong reference to either past
/// `on_open`.
///
/// deliberately *not* `Send`: grounded on the teacher's h1 dispatcher (`h1/dispatcher.rs`), which
/// shares its request/response state via `Rc`/`RefCell` rather than `Arc`/`Mutex` because each
/// connection lives entirely on the worker thread that accepted it (see
/// `reactor::executor::ThreadedExecutor`) and is never handed to another thread mid-flight.
#[async_trait(?Send)]
pub trait Connection {
    async fn on_open(&mut self, endpoint: &mut dyn Endpoint);
    async fn on_close(&mut self, endpoint: &mut dyn Endpoint);
    async fn on_fillable(&mut self, endpoint: &mut dyn Endpoint);
    async fn on_flushable(&mut self, endpoint: &mut dyn Endpoint);
    async fn on_read_timeout(&mut self, endpoint: &mut dyn Endpoint);
    fn set_input_buffer_size(&mut self, size: usize);

    /// whether this connection currently has output queued to flush. the driving loop
    /// (`net::connector::drive`) only arms the endpoint's writable-readiness future while this is
    /// true, so a connection with nothing to write never busy-spins on an endpoint whose send
    /// buffer always has room.
    fn wants_flush(&self) -> bool;
}

/// builds a [`Connection`] for a freshly accepted endpoint (`spec.md` §6: "*ConnectionFactory*:
/// `create(connector, endpoint) → Connection`"). the factory itself is `Send + Sync` (one instance
/// is shared across every worker thread's accept loop) even though the connections it produces are
/// not.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self) -> Box<dyn Connection>;
}

/// accept-loop parameters shared by every listening socket, grounded on the teacher's
/// `worker/mod.rs` accept loop (error classification into per-connection-retryable vs.
/// resource-exhaustion-backoff) and `util/tcp_config.rs` (keepalive/no-delay options applied per
/// accepted stream).
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub backlog: u32,
    pub multi_accept_count: usize,
    pub tcp_nodelay: bool,
    pub tcp_keepalive: Option<Duration>,
    pub idle_timeout: Duration,
    /// number of accept-capable OS threads [`Connector::start`] spawns, each binding its own
    /// listener via `SO_REUSEPORT` (supplemented from `InetConnector.cc`'s multi-listener
    /// support — `spec.md` itself only specifies a single reactor thread).
    pub worker_threads: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            backlog: 128,
            multi_accept_count: 16,
            tcp_nodelay: true,
            tcp_keepalive: Some(Duration::from_secs(75)),
            idle_timeout: Duration::from_secs(60),
            worker_threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
        }
    }
}

/// classifies an `accept()` error the way the teacher's worker loop does: connection-scoped
/// errors just retry the next accept, everything else backs off for a second to avoid spinning
/// under resource exhaustion (EMFILE/ENFILE).
pub(crate) fn is_per_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset
    )
}
