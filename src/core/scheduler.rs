/// Timer scheduler — cancellable delayed continuations on a virtual clock.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Identifies one activation of a stage. Every activation, including a
/// restart of the same stage, gets a fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle for one scheduled timer, chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerToken {
    pub instance: InstanceId,
    pub seq: u64,
}

/// Single-threaded timer wheel driven by `advance`.
///
/// Timers due at the same instant fire in the order they were scheduled.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now: Duration,
    next_order: u64,
    queue: BTreeMap<(Duration, u64), TimerToken>,
    index: FxHashMap<TimerToken, (Duration, u64)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time elapsed since the scheduler was created.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Fire `token` after `delay`. Scheduling a token that is already
    /// pending replaces the earlier entry.
    pub fn schedule(&mut self, delay: Duration, token: TimerToken) {
        self.cancel(token);
        let key = (self.now.saturating_add(delay), self.next_order);
        self.next_order += 1;
        self.queue.insert(key, token);
        self.index.insert(token, key);
    }

    /// Returns true if the token was pending.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        match self.index.remove(&token) {
            Some(key) => {
                self.queue.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Drop every pending timer owned by `instance`. Returns how many were dropped.
    pub fn cancel_instance(&mut self, instance: InstanceId) -> usize {
        let doomed: Vec<TimerToken> = self
            .index
            .keys()
            .filter(|t| t.instance == instance)
            .copied()
            .collect();
        for token in &doomed {
            self.cancel(*token);
        }
        doomed.len()
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.index.contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Time until the earliest pending timer is due.
    pub fn until_next(&self) -> Option<Duration> {
        self.queue
            .first_key_value()
            .map(|((due, _), _)| due.saturating_sub(self.now))
    }

    /// Move the clock forward and return every token that came due, in
    /// firing order. The clock stops at `Duration::MAX`.
    pub fn advance(&mut self, dt: Duration) -> Vec<TimerToken> {
        self.now = self.now.saturating_add(dt);
        let mut fired = Vec::new();
        while let Some((&key, &token)) = self.queue.first_key_value() {
            if key.0 > self.now {
                break;
            }
            self.queue.remove(&key);
            self.index.remove(&token);
            fired.push(token);
        }
        fired
    }
}
