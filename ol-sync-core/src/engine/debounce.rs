use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

/// Per-path debounce: each path is due `delay` after its most recent event.
#[derive(Debug)]
pub struct DebounceQueue {
    delay: Duration,
    pending: HashMap<String, Instant>,
}

impl DebounceQueue {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: HashMap::new(),
        }
    }

    /// Records an event, pushing the path's deadline back.
    pub fn push(&mut self, path: impl Into<String>, now: Instant) {
        self.pending.insert(path.into(), now + self.delay);
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Removes and returns every path due at `now`, earliest deadline first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<String> {
        let mut due: Vec<(Instant, String)> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, deadline)| (*deadline, path.clone()))
            .collect();
        due.sort();
        for (_, path) in &due {
            self.pending.remove(path);
        }
        due.into_iter().map(|(_, path)| path).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
