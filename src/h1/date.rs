//! low-resolution, cached `Date` header value, ported from the teacher's `date.rs`
//! (`DateTimeService`/`DateTimeState`): a background task refreshes a formatted HTTP-date string
//! once per tick rather than calling `SystemTime::now()`/formatting on every response, while still
//! satisfying `spec.md` §8's "Date header value is byte-identical for all responses flushed within
//! the same wall-clock second" property (`tests/date_header.rs`).

use std::{
    cell::RefCell,
    fmt::{self, Write},
    ops::Deref,
    rc::Rc,
    time::{Duration, SystemTime},
};

use httpdate::HttpDate;
use tokio::{task::JoinHandle, time::Instant};

pub const DATE_VALUE_LENGTH: usize = 29;

#[derive(Copy, Clone)]
pub struct DateState {
    pub date: [u8; DATE_VALUE_LENGTH],
    pub now: Instant,
}

impl Default for DateState {
    fn default() -> Self {
        Self::new()
    }
}

impl DateState {
    pub fn new() -> Self {
        let mut state = Self {
            date: [0; DATE_VALUE_LENGTH],
            now: Instant::now(),
        };
        let _ = write!(state, "{}", HttpDate::from(SystemTime::now()));
        state
    }
}

impl Write for DateState {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.date.copy_from_slice(s.as_bytes());
        Ok(())
    }
}

/// `pub` (not `pub(crate)`): [`crate::h1::transport::Transport::new`] takes a `Rc<DateHandle>`
/// directly and is itself part of this crate's public surface, so the parameter type must be too.
pub type DateHandle = RefCell<DateState>;

/// background-refreshed `Date` header cache, one per connection-accepting task (not shared across
/// tasks: the teacher's version is `Rc`-based and pinned to a `LocalSet`, which this crate mirrors
/// since the value only needs per-task, not process-wide, sharing).
pub struct DateService {
    state: Rc<DateHandle>,
    handle: JoinHandle<()>,
}

impl Default for DateService {
    fn default() -> Self {
        Self::new()
    }
}

impl DateService {
    pub fn new() -> Self {
        let state = Rc::new(RefCell::new(DateState::new()));
        let state_clone = Rc::clone(&state);
        let handle = tokio::task::spawn_local(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(500));
            loop {
                interval.tick().await;
                *state_clone.borrow_mut() = DateState::new();
            }
        });
        Self { state, handle }
    }

    pub fn get(&self) -> &DateHandle {
        self.state.deref()
    }
}

impl Drop for DateService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// writes just the cached date value bytes into `dst` — the caller supplies the header name and
/// surrounding CRLFs, matching the rest of `h1::encode::encode_head`'s per-field style.
pub fn write_header(handle: &DateHandle, dst: &mut bytes::BytesMut) {
    dst.extend_from_slice(&handle.borrow().date);
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn formats_as_rfc1123() {
        let state = DateState::new();
        let text = std::str::from_utf8(&state.date).unwrap();
        assert_eq!(text.len(), DATE_VALUE_LENGTH);
        assert!(text.ends_with("GMT"));
    }
}
