//! the reactor collaborator (`spec.md` §2/§4.1): single-threaded-per-connection cooperative
//! scheduling, one-shot readable/writable interest, a sorted timer list, and a task queue, with
//! the ordering guarantee that one pass of the loop drains timers, then fd handles, then tasks.
//!
//! tokio's runtime plays this role directly — see `SPEC_FULL.md` §0/§4.1 for why this crate does
//! not hand-roll an epoll/mio reactor: the teacher (`xitca-web`) is itself built entirely on
//! tokio, and no repo in this corpus hand-rolls a raw-syscall event loop. [`Reactor`] is a thin
//! handle around [`tokio::runtime::Handle`] plus the timer [`timer::Wheel`] this crate's
//! idle-timeout and keep-alive machinery schedule against.

pub mod executor;
pub mod timer;

use std::sync::Arc;

use tokio::time::Instant;

use self::{executor::Task, timer::TimerHandle};

#[derive(Clone)]
pub struct Reactor {
    handle: tokio::runtime::Handle,
    timers: Arc<timer::Wheel>,
}

impl Reactor {
    /// build a reactor bound to the tokio runtime the caller is currently inside.
    pub fn current() -> Self {
        Self {
            handle: tokio::runtime::Handle::current(),
            timers: Arc::new(timer::Wheel::new()),
        }
    }

    pub fn handle(&self) -> &tokio::runtime::Handle {
        &self.handle
    }

    /// run `task` on the reactor's runtime as soon as possible.
    pub fn execute(&self, task: Task) {
        self.handle.spawn(task);
    }

    /// run `task` no earlier than `delay` from now.
    pub fn execute_after(&self, delay: std::time::Duration, task: Task) -> TimerHandle {
        self.execute_at(Instant::now() + delay, task)
    }

    /// run `task` no earlier than the monotonic instant `deadline`.
    ///
    /// realized as a spawned task that sleeps until `deadline` then checks the returned
    /// [`TimerHandle`] for cancellation before running the payload — the payload itself also sits
    /// in `self.timers` purely so `run_loop_once` (used by tests) can observe and drain it without
    /// a real sleep.
    pub fn execute_at(&self, deadline: Instant, task: Task) -> TimerHandle {
        let handle = self.timers.schedule(deadline, task);
        let timers = self.timers.clone();
        let poll_handle = handle.clone();
        self.handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if !poll_handle.is_cancelled() {
                for due in timers.drain_due(Instant::now()) {
                    due.await;
                }
            }
        });
        handle
    }
}

/// a reactor driven by explicit single steps rather than a running tokio executor, used by
/// `h1::transport::Transport` unit tests to exercise the pipelining/persistence properties of
/// `spec.md` §8 without a real socket or a live runtime (`SPEC_FULL.md` §4.1: "`run_loop_once`
/// is exposed for the mock/test reactor").
pub mod testing {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    pub struct StepReactor {
        timers: timer::Wheel,
        ready_fds: VecDeque<Task>,
        tasks: VecDeque<Task>,
    }

    impl StepReactor {
        pub fn new() -> Self {
            Self {
                timers: timer::Wheel::new(),
                ready_fds: VecDeque::new(),
                tasks: VecDeque::new(),
            }
        }

        pub fn schedule_timer(&self, deadline: Instant, task: Task) -> TimerHandle {
            self.timers.schedule(deadline, task)
        }

        pub fn mark_fd_ready(&mut self, task: Task) {
            self.ready_fds.push_back(task);
        }

        pub fn enqueue_task(&mut self, task: Task) {
            self.tasks.push_back(task);
        }

        /// one pass: drain every due timer, drain one ready pseudo-fd, drain the task queue. in
        /// that order, per `spec.md` §4.1 algorithm step 7.
        pub async fn run_loop_once(&mut self, now: Instant) {
            for due in self.timers.drain_due(now) {
                due.await;
            }
            if let Some(fd_task) = self.ready_fds.pop_front() {
                fd_task.await;
            }
            while let Some(task) = self.tasks.pop_front() {
                task.await;
            }
        }

        pub fn is_idle(&self) -> bool {
            self.timers.is_empty() && self.ready_fds.is_empty() && self.tasks.is_empty()
        }
    }

    #[tokio::test]
    async fn ordering_is_timers_then_fds_then_tasks() {
        let mut reactor = StepReactor::new();
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

        let now = Instant::now();
        let o1 = order.clone();
        reactor.schedule_timer(now, Box::pin(async move { o1.lock().unwrap().push("timer") }));
        let o2 = order.clone();
        reactor.mark_fd_ready(Box::pin(async move { o2.lock().unwrap().push("fd") }));
        let o3 = order.clone();
        reactor.enqueue_task(Box::pin(async move { o3.lock().unwrap().push("task") }));

        reactor.run_loop_once(now).await;

        assert_eq!(*order.lock().unwrap(), vec!["timer", "fd", "task"]);
    }
}
