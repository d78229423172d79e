//! Event Loop
//!
//! Single-threaded timer queue on a simulated millisecond clock. The host
//! moves time forward; nothing here sleeps.

use crate::{LoadId, SessionId};

/// Work scheduled on the engine's event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    /// Crossfade of a session finished
    FadeComplete(SessionId),
    /// A load request has waited too long
    LoadTimeout(LoadId),
    /// Window resizing stopped for the debounce window
    ResizeSettled,
}

/// Timer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Timer<T> {
    id: TimerId,
    due_at: u64,
    task: T,
}

/// Timer queue with a simulated clock
#[derive(Debug)]
pub struct EventLoop<T> {
    timers: Vec<Timer<T>>,
    next_timer_id: u64,
    /// Current timestamp (ms)
    current_time: u64,
}

impl<T> EventLoop<T> {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_timer_id: 1,
            current_time: 0,
        }
    }

    /// Current timestamp (ms)
    pub fn now(&self) -> u64 {
        self.current_time
    }

    /// Schedule `task` to run `delay_ms` from now
    pub fn set_timeout(&mut self, task: T, delay_ms: u64) -> TimerId {
        let id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;
        self.timers.push(Timer {
            id,
            due_at: self.current_time + delay_ms,
            task,
        });
        id
    }

    /// Cancel a timer; returns whether it was still pending
    pub fn clear_timer(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        self.timers.len() != before
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn has_pending(&self) -> bool {
        !self.timers.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.timers.len()
    }

    /// Due time of the earliest pending timer
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.due_at).min()
    }

    /// Remove and return the earliest timer due at or before `deadline`,
    /// moving the clock to its due time. Ties fire in scheduling order.
    pub fn pop_due(&mut self, deadline: u64) -> Option<T> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .filter(|(_, t)| t.due_at <= deadline)
            .min_by_key(|(_, t)| (t.due_at, t.id))
            .map(|(i, _)| i)?;
        let timer = self.timers.remove(index);
        self.current_time = self.current_time.max(timer.due_at);
        Some(timer.task)
    }

    /// Move the clock forward to `time` without firing anything
    pub fn advance_to(&mut self, time: u64) {
        self.current_time = self.current_time.max(time);
    }
}

impl<T> Default for EventLoop<T> {
    fn default() -> Self {
        Self::new()
    }
}
