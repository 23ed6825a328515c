//! `spec.md` §4.5/§6: the listening socket collaborator. Grounded on the teacher's
//! `server/src/worker/mod.rs` accept loop (`connection_error`/backoff split, one `spawn_local`
//! task per accepted stream) and, for the `SO_REUSEPORT` multi-listener-thread fan-out, on
//! `original_source`'s `InetConnector.cc`.
//!
//! unlike the teacher, which accepts onto a shared multi-threaded tokio runtime and lets the
//! runtime distribute `!Send` work via `spawn_local` on whichever worker polled it, this crate's
//! `Connection`/`HttpHandler` stack is `Rc`-based end to end (`spec.md` §5: "no intra-connection
//! locking"), so each accept-capable thread here owns a dedicated single-threaded runtime plus
//! `LocalSet` rather than sharing one multi-threaded runtime across threads.

use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use socket2::{Domain, Socket, Type};
use tokio::{net::TcpListener, task::LocalSet};

use crate::log::LogSource;

use super::{is_per_connection_error, tcp::TcpEndpoint, Connection, ConnectionFactory, ConnectorConfig, Endpoint};

/// startup-time failure binding or configuring a listening socket — the `SystemError` row of
/// `spec.md` §7's error taxonomy table, which is a connector-level concern rather than a
/// per-connection one (see `h1::error::TransportError`'s doc comment).
#[derive(Debug)]
pub enum ConnectorError {
    Bind(io::Error),
    Configure(io::Error),
}

impl std::fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bind(e) => write!(f, "failed to bind listening socket: {e}"),
            Self::Configure(e) => write!(f, "failed to configure listening socket: {e}"),
        }
    }
}

impl std::error::Error for ConnectorError {}

/// owns one `TcpListener` and repeatedly accepts connections, handing each to a
/// [`ConnectionFactory`]. one `Connector` runs on one accept-capable thread; [`Connector::start`]
/// is the multi-thread convenience wrapper described in `spec.md` §5.
pub struct Connector {
    listener: TcpListener,
    config: ConnectorConfig,
    log: LogSource,
}

impl Connector {
    /// bind a listener at `addr`, applying `SO_REUSEPORT` so multiple [`Connector`]s (one per
    /// accept-capable thread, per `spec.md` §5) can share the same port.
    fn bind(addr: SocketAddr, reuseport: bool) -> Result<TcpListener, ConnectorError> {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::STREAM, None).map_err(ConnectorError::Bind)?;
        socket.set_nonblocking(true).map_err(ConnectorError::Configure)?;
        socket.set_reuse_address(true).map_err(ConnectorError::Configure)?;
        if reuseport {
            #[cfg(unix)]
            socket.set_reuse_port(true).map_err(ConnectorError::Configure)?;
        }
        socket.bind(&addr.into()).map_err(ConnectorError::Bind)?;
        socket.listen(1024).map_err(ConnectorError::Bind)?;
        TcpListener::from_std(socket.into()).map_err(ConnectorError::Bind)
    }

    pub fn new(listener: TcpListener, config: ConnectorConfig, log: LogSource) -> Self {
        Self { listener, config, log }
    }

    /// run the accept loop forever on the caller's current single-threaded runtime, handing each
    /// accepted socket to `factory` as a freshly wrapped [`TcpEndpoint`]/[`Connection`] pair
    /// driven on its own `spawn_local` task.
    pub async fn run(self, factory: Arc<dyn ConnectionFactory>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, _peer)) => {
                    let _ = stream.set_nodelay(self.config.tcp_nodelay);
                    let idle_timeout = self.config.idle_timeout;
                    let keepalive = self.config.tcp_keepalive;
                    let factory = factory.clone();
                    tokio::task::spawn_local(async move {
                        let mut endpoint = TcpEndpoint::new(stream, idle_timeout);
                        let _ = endpoint.set_keepalive(keepalive);
                        let mut connection = factory.create();
                        drive(connection.as_mut(), &mut endpoint).await;
                    });
                }
                Err(e) if is_per_connection_error(&e) => continue,
                Err(e) => {
                    self.log.error(&format!("accept failed: {e}"));
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// `spec.md` §5's `SO_REUSEPORT` multi-reactor fan-out: spawn `config.worker_threads` OS
    /// threads, each binding its own listener at `addr` and running an independent
    /// [`Connector::run`] loop on a dedicated single-threaded runtime + `LocalSet`. blocks the
    /// calling thread until every worker thread's runtime panics or is torn down with the process.
    pub fn start(addr: SocketAddr, config: ConnectorConfig, log: LogSource, factory: Arc<dyn ConnectionFactory>) -> Result<(), ConnectorError> {
        let worker_threads = config.worker_threads.max(1);
        let reuseport = worker_threads > 1;

        let mut handles = Vec::with_capacity(worker_threads);
        for i in 0..worker_threads {
            let listener = Self::bind(addr, reuseport)?;
            let config = config.clone();
            let log = log.clone();
            let factory = factory.clone();
            handles.push(std::thread::Builder::new().name(format!("http1-core-worker-{i}")).spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build per-worker tokio runtime");
                let connector = Connector::new(listener, config, log);
                LocalSet::new().block_on(&rt, connector.run(factory))
            }));
        }

        for handle in handles.into_iter().flatten() {
            let _ = handle.join();
        }
        Ok(())
    }
}

/// resolves after `remaining`, or never, mirroring [`super::idle_timeout::IdleTimeout`]'s own
/// `Inactive` state — lets the idle-timeout branch of [`drive`]'s `select!` stay armed only while
/// the timer actually is.
async fn sleep_or_pending(remaining: Option<Duration>) {
    match remaining {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

/// computes how long until the endpoint's idle timer should next be checked, for arming
/// [`sleep_or_pending`].
fn remaining_idle(endpoint: &dyn Endpoint) -> Option<Duration> {
    endpoint.idle_timeout().is_active().then(|| {
        let elapsed = endpoint.idle_timeout().elapsed(tokio::time::Instant::now());
        endpoint.idle_timeout().duration().saturating_sub(elapsed)
    })
}

/// checks the endpoint's idle timer and, if it has actually expired (as opposed to a spurious or
/// early wakeup, which just means the remainder needs recomputing on the next loop pass), drives
/// [`Connection::on_read_timeout`].
async fn on_idle_wakeup(connection: &mut dyn Connection, endpoint: &mut dyn Endpoint) {
    if let super::idle_timeout::Wakeup::Expired = endpoint.idle_timeout_mut().on_wakeup(tokio::time::Instant::now()) {
        connection.on_read_timeout(endpoint).await;
    }
}

/// drives one accepted connection end to end: `on_open`, then alternating `want_fill`/`want_flush`
/// readiness against `on_fillable`/`on_flushable`, racing the endpoint's own
/// [`super::idle_timeout::IdleTimeout`] (re-armed to the deadline's actual remainder each pass,
/// per `IdleTimeout::on_wakeup`'s "spurious/early wakeup reschedules the remainder" contract)
/// until the endpoint reports closed; then `on_close`.
///
/// `want_fill`/`want_flush` both take `&mut dyn Endpoint`, so at most one of them can be a live
/// `select!` branch at a time (driving both simultaneously would hold two overlapping mutable
/// borrows of the same endpoint). This also fixes a busy-loop: an idle connection with nothing
/// queued to write would otherwise win `want_flush` every pass (a writable socket resolves that
/// future immediately) and spin on a no-op `on_flushable`, starving the idle-timeout branch.
/// [`Connection::wants_flush`] picks the one readiness interest that actually matters right now.
async fn drive(connection: &mut dyn Connection, endpoint: &mut dyn Endpoint) {
    connection.on_open(endpoint).await;

    while endpoint.is_open() {
        let remaining = remaining_idle(endpoint);

        if connection.wants_flush() {
            tokio::select! {
                res = endpoint.want_flush() => {
                    match res {
                        Ok(()) => connection.on_flushable(endpoint).await,
                        Err(_) => break,
                    }
                }
                _ = sleep_or_pending(remaining) => on_idle_wakeup(connection, endpoint).await,
            }
        } else {
            tokio::select! {
                res = endpoint.want_fill() => {
                    match res {
                        Ok(()) => connection.on_fillable(endpoint).await,
                        Err(_) => break,
                    }
                }
                _ = sleep_or_pending(remaining) => on_idle_wakeup(connection, endpoint).await,
            }
        }
    }

    connection.on_close(endpoint).await;
}
