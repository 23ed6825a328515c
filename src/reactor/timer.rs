//! sorted timer list backing `Reactor::execute_after`/`execute_at` (`spec.md` §4.1: timers fire
//! in deadline order; a cancelled handle's callback must never fire afterward, and a second
//! cancellation is a no-op — the `tests/idle_timeout.rs` properties under test).

use std::{
    cmp::Ordering,
    collections::BinaryHeap,
    sync::{
        atomic::{AtomicU64, AtomicU8, Ordering as AtomicOrdering},
        Arc, Mutex,
    },
};

use tokio::time::Instant;

use crate::reactor::executor::Task;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Pending = 0,
    Fired = 1,
    Cancelled = 2,
}

/// a live registration in the [`Wheel`]. cloning shares the same underlying cancellation flag.
#[derive(Clone)]
pub struct TimerHandle {
    state: Arc<AtomicU8>,
}

impl TimerHandle {
    fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(HandleState::Pending as u8)),
        }
    }

    /// idempotent: returns `true` if this call is the one that transitioned the timer out of
    /// `Pending` (i.e. it raced the firing and won), `false` if it was already fired or already
    /// cancelled.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(
                HandleState::Pending as u8,
                HandleState::Cancelled as u8,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            )
            .is_ok()
    }

    fn try_fire(&self) -> bool {
        self.state
            .compare_exchange(
                HandleState::Pending as u8,
                HandleState::Fired as u8,
                AtomicOrdering::SeqCst,
                AtomicOrdering::SeqCst,
            )
            .is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(AtomicOrdering::SeqCst) == HandleState::Cancelled as u8
    }
}

struct Entry {
    deadline: Instant,
    /// insertion order, used as a tiebreak so two timers scheduled for the same deadline fire in
    /// the order they were scheduled (`spec.md` §5/§8: "timers with equal deadlines fire in
    /// insertion order") — `Instant` alone gives `BinaryHeap` no stable ordering for ties.
    seq: u64,
    handle: TimerHandle,
    task: Task,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap, we want earliest deadline (then lowest seq) first.
        other.deadline.cmp(&self.deadline).then_with(|| other.seq.cmp(&self.seq))
    }
}

/// sorted (by deadline, then insertion order) set of pending timers, guarded by the single mutex
/// §5 allocates to "a reactor's interest lists and timer list".
#[derive(Default)]
pub struct Wheel {
    entries: Mutex<BinaryHeap<Entry>>,
    next_seq: AtomicU64,
}

impl Wheel {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BinaryHeap::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn schedule(&self, deadline: Instant, task: Task) -> TimerHandle {
        let handle = TimerHandle::new();
        let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
        self.entries.lock().unwrap().push(Entry {
            deadline,
            seq,
            handle: handle.clone(),
            task,
        });
        handle
    }

    /// next pending deadline, ignoring entries that have already been cancelled.
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut entries = self.entries.lock().unwrap();
        while let Some(top) = entries.peek() {
            if top.handle.is_cancelled() {
                entries.pop();
                continue;
            }
            return Some(top.deadline);
        }
        None
    }

    /// pop and return every entry whose deadline is `<= now` and that hasn't been cancelled,
    /// marking each `Fired` as it's removed so a racing [`TimerHandle::cancel`] loses.
    pub fn drain_due(&self, now: Instant) -> Vec<Task> {
        let mut entries = self.entries.lock().unwrap();
        let mut due = Vec::new();
        while let Some(top) = entries.peek() {
            if top.deadline > now {
                break;
            }
            let entry = entries.pop().unwrap();
            if entry.handle.try_fire() {
                due.push(entry.task);
            }
        }
        due
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}
