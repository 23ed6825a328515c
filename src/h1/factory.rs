//! `spec.md` §6's supplemented glue (grounded on `xzero-http/HttpConnectionFactory.h`'s role):
//! [`Http1ConnectionFactory`] wires a [`ServerConfig`] and a user [`HttpHandler`] into a
//! [`ConnectionFactory`], so a caller can go straight from "I have a handler" to
//! `Connector::start` without hand-assembling a [`Transport`] per connection itself.

use std::{cell::RefCell, rc::Rc};

use crate::{
    clock::{Clock, SystemClock},
    config::ServerConfig,
    net::{Connection, ConnectionFactory},
    reactor::executor::{LocalExecutor, SpawnLocalExecutor},
};

use super::{
    date::{DateHandle, DateState},
    transport::Transport,
};
use crate::service::HttpHandler;

thread_local! {
    /// one `Date` header cache per accept-capable OS thread (`spec.md` §4.2: the value only needs
    /// to be refreshed at most once a second, and every connection accepted on a given thread can
    /// share the same cache — mirrors the teacher's `DateTimeService`, which is likewise one
    /// instance per worker rather than per connection).
    static DATE: RefCell<Option<Rc<DateHandle>>> = const { RefCell::new(None) };
}

fn thread_local_date() -> Rc<DateHandle> {
    DATE.with(|cell| {
        cell.borrow_mut()
            .get_or_insert_with(|| Rc::new(RefCell::new(DateState::new())))
            .clone()
    })
}

/// builds a [`Transport<H>`] per accepted connection. `H` must be `Send + Sync + Clone` so that
/// one `Http1ConnectionFactory` can be shared (via `Arc<dyn ConnectionFactory>`) across every
/// accept-capable thread `net::Connector::start` spawns, even though the `Transport` each
/// `create()` call produces is `Rc`-based and confined to the thread that calls it — the same
/// split the teacher's `WorkerService::new_boxed` draws between a `Send` factory and the
/// `Rc`-wrapped service it hands each worker (`server/src/worker/service.rs`).
pub struct Http1ConnectionFactory<H> {
    handler: H,
    config: ServerConfig,
}

impl<H> Http1ConnectionFactory<H>
where
    H: HttpHandler + Clone + Send + Sync + 'static,
{
    pub fn new(handler: H, config: ServerConfig) -> Self {
        Self { handler, config }
    }
}

impl<H> ConnectionFactory for Http1ConnectionFactory<H>
where
    H: HttpHandler + Clone + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn Connection> {
        let executor: Rc<dyn LocalExecutor> = Rc::new(SpawnLocalExecutor);
        let clock: Rc<dyn Clock> = Rc::new(SystemClock);
        let transport = Transport::new(
            Rc::new(self.handler.clone()),
            executor,
            &self.config,
            thread_local_date(),
            clock,
            None,
        );
        Box::new(transport)
    }
}
