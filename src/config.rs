//! runtime server configuration (`spec.md` §6, Open Question "config architecture" resolved in
//! `SPEC_FULL.md` §9 in favor of a plain runtime struct over the teacher's const-generic
//! `HttpServiceConfig<H, R, W>` — nothing in this crate's scope varies at compile time).

use std::time::Duration;

use crate::log::LogAggregator;

/// tunables for a single [`crate::h1::Transport`] / listening [`crate::net::Connector`].
///
/// all fields have defaults drawn from `spec.md`'s Concurrency & Resource Model section; callers
/// construct via [`ServerConfig::default`] and override individual fields.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// threaded down to every component that wants a named [`crate::log::LogSource`], rather than
    /// reached for as a global (see `SPEC_FULL.md` §9's `LogAggregator` resolution).
    pub log_aggregator: LogAggregator,
    /// backlog passed to `listen(2)` for a new listening socket.
    pub backlog: u32,
    /// how long a connection may sit with no readable activity before it is closed.
    pub idle_timeout: Duration,
    /// maximum bytes accepted for a request line + header block before `414`/`431`.
    pub max_head_size: usize,
    /// maximum bytes accepted for a request body before `413`.
    pub max_body_size: usize,
    /// maximum number of requests served on one keep-alive connection before the server sets
    /// `Connection: close` on the response and transitions to `Closing` (exclusive bound, per
    /// the Open Question resolution: a value of 100 permits exactly 100 requests).
    pub max_requests_per_connection: u32,
    /// initial capacity reserved for a connection's read buffer; grows up to `max_head_size` +
    /// body framing overhead as described in `crate::buffer`.
    pub read_buffer_capacity: usize,
    /// corresponds to `TCP_NODELAY`; disabled automatically while corking a response head+body
    /// write (`crate::net::tcp`).
    pub tcp_nodelay: bool,
    /// `SO_KEEPALIVE` and its interval, forwarded to the OS socket.
    pub tcp_keepalive: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_aggregator: LogAggregator::new(),
            backlog: 128,
            idle_timeout: Duration::from_secs(60),
            max_head_size: 8 * 1024,
            max_body_size: 4 * 1024 * 1024,
            max_requests_per_connection: 100,
            read_buffer_capacity: 16 * 1024,
            tcp_nodelay: true,
            tcp_keepalive: Some(Duration::from_secs(75)),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_match_resource_model() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.backlog, 128);
        assert_eq!(cfg.idle_timeout, Duration::from_secs(60));
        assert_eq!(cfg.max_requests_per_connection, 100);
    }
}
