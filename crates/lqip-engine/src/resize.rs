//! Resize Reactor
//!
//! One coordinator per document debounces window resize events. Sessions
//! subscribe once they have swapped and are told when resizing settles.

use std::collections::BTreeSet;

use crate::{EventLoop, Task, TimerId};

/// Debounced resize fan-out shared by all sessions
#[derive(Debug)]
pub struct ResizeCoordinator<K: Ord + Copy> {
    debounce_ms: u64,
    /// The single pending "settled" timer
    pending: Option<TimerId>,
    subscribers: BTreeSet<K>,
    settled_count: u64,
}

impl<K: Ord + Copy> ResizeCoordinator<K> {
    pub fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            pending: None,
            subscribers: BTreeSet::new(),
            settled_count: 0,
        }
    }

    pub fn subscribe(&mut self, key: K) {
        self.subscribers.insert(key);
    }

    pub fn unsubscribe(&mut self, key: K) {
        self.subscribers.remove(&key);
    }

    pub fn is_subscribed(&self, key: K) -> bool {
        self.subscribers.contains(&key)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Record a resize event: the previous pending timer is cleared and a
    /// fresh one scheduled for a full debounce window from now.
    pub fn notify_resize(&mut self, timers: &mut EventLoop<Task>) {
        if let Some(previous) = self.pending.take() {
            timers.clear_timer(previous);
        }
        self.pending = Some(timers.set_timeout(Task::ResizeSettled, self.debounce_ms));
    }

    /// A settle timer is pending
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// The settle timer fired: returns the subscribers to recompute
    pub fn settle(&mut self) -> Vec<K> {
        self.pending = None;
        self.settled_count += 1;
        self.subscribers.iter().copied().collect()
    }

    /// How many times resizing has settled
    pub fn settled_count(&self) -> u64 {
        self.settled_count
    }
}
