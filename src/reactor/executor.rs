//! task execution strategies (`spec.md` §2/§4, *Executor*: `execute(task)` with optional
//! `execute_after`).
//!
//! [`DirectExecutor`] is ported from `xzero-base/executor/DirectExecutor.{h,cc}`: a task run while
//! another task is already running on the same executor is deferred to a queue rather than
//! recursing, unless the executor is explicitly marked recursive. [`ThreadedExecutor`] and
//! [`ReactorExecutor`] have no equivalent in that source (xzero's other executors live in sibling
//! files not in this pack) and are grounded instead on the teacher's worker/runtime split
//! (`server/src/worker/mod.rs` spawns one task per connection on the shared tokio runtime).

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    future::Future,
    pin::Pin,
};

use crate::reactor::Reactor;

/// a unit of work handed to an [`Executor`]. boxed because executors are trait objects and tasks
/// come from arbitrary call sites. `Send`-bound: for work that may genuinely cross threads (e.g.
/// [`ThreadedExecutor`] handing a task to a dedicated OS thread). Per-connection work that closes
/// over `Rc`-based state (`h1::channel`'s handler dispatch) cannot satisfy this bound — see
/// [`LocalTask`]/[`LocalExecutor`] below.
pub type Task = Pin<Box<dyn Future<Output = ()> + Send>>;

pub trait Executor: Send + Sync {
    fn execute(&self, task: Task);
}

/// a unit of work confined to the single task-set that accepted its connection — never `Send`,
/// since it closes over `Rc`-based state (`HttpRequest`/`HttpResponse`, `h1::channel`'s own
/// fields), matching `net::Connection`/`service::HttpHandler`'s `?Send` design (grounded on the
/// teacher's `h1/dispatcher.rs`, which holds its `Io` in an `Rc` for the same reason).
pub type LocalTask = Pin<Box<dyn Future<Output = ()>>>;

/// executes [`LocalTask`]s without requiring them to be `Send`. `h1::channel` holds one of these
/// to enqueue a handler invocation per `spec.md` §4.3 ("enqueue the user handler on the channel's
/// Executor").
pub trait LocalExecutor {
    fn execute(&self, task: LocalTask);
}

/// spawns each task via `tokio::task::spawn_local`. requires the caller to be running inside a
/// `tokio::task::LocalSet` — the execution context every real per-connection task runs under in
/// this crate (see `h1::date::DateService`, which spawns its refresh loop the same way).
pub struct SpawnLocalExecutor;

impl LocalExecutor for SpawnLocalExecutor {
    fn execute(&self, task: LocalTask) {
        tokio::task::spawn_local(task);
    }
}

/// runs a task synchronously on the caller, flattening recursive `execute` calls into a FIFO
/// queue unless constructed with `recursive = true`. not `Send`/`Sync`: matches the source's "not
/// thread-safe" note, and this crate only ever uses it from a single connection's owning task.
pub struct DirectExecutor {
    recursive: bool,
    running: Cell<u32>,
    deferred: RefCell<VecDeque<Task>>,
}

impl DirectExecutor {
    pub fn new(recursive: bool) -> Self {
        Self {
            recursive,
            running: Cell::new(0),
            deferred: RefCell::new(VecDeque::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.get() > 0
    }

    pub fn backlog(&self) -> usize {
        self.deferred.borrow().len()
    }

    /// run `task` to completion inline, then drain anything it deferred. futures handed to a
    /// `DirectExecutor` are expected to be ready-or-near-ready (this crate uses it only for
    /// synchronous handler dispatch in tests); a genuinely pending future will block this call.
    pub async fn execute(&self, task: Task) {
        if self.is_running() && !self.recursive {
            self.deferred.borrow_mut().push_back(task);
            return;
        }

        self.running.set(self.running.get() + 1);
        task.await;

        loop {
            let next = self.deferred.borrow_mut().pop_front();
            match next {
                Some(t) => t.await,
                None => break,
            }
        }
        self.running.set(self.running.get() - 1);
    }
}

/// spawns each task onto its own OS thread via a dedicated single-threaded tokio runtime. useful
/// for handler code that is known to block.
pub struct ThreadedExecutor;

impl Executor for ThreadedExecutor {
    fn execute(&self, task: Task) {
        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to build per-task tokio runtime");
            rt.block_on(task);
        });
    }
}

/// enqueues the task onto a [`Reactor`]'s shared multi-threaded runtime (the common case: the
/// accept loop's connection-handling future and the channel's handler dispatch both run here).
pub struct ReactorExecutor {
    reactor: Reactor,
}

impl ReactorExecutor {
    pub fn new(reactor: Reactor) -> Self {
        Self { reactor }
    }
}

impl Executor for ReactorExecutor {
    fn execute(&self, task: Task) {
        self.reactor.handle().spawn(task);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn direct_executor_flattens_recursion() {
        let exec = std::sync::Arc::new(DirectExecutor::new(false));
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

        let exec2 = exec.clone();
        let order2 = order.clone();
        exec.execute(Box::pin(async move {
            order2.lock().unwrap().push(1);
            let order3 = order2.clone();
            exec2
                .execute(Box::pin(async move {
                    order3.lock().unwrap().push(2);
                }))
                .await;
            order2.lock().unwrap().push(3);
        }))
        .await;

        assert_eq!(*order.lock().unwrap(), vec![1, 3, 2]);
    }
}
