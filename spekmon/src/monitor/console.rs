//! Bounded scrollback for device chatter and local notices.

use std::collections::VecDeque;
use std::sync::Mutex;

pub static DEFAULT_CAPACITY: usize = 300;

/// Fixed-capacity line ring. Once full, each push evicts the oldest
/// line, so the buffer always holds the most recent window.
pub struct ConsoleRing {
    lines: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl ConsoleRing {
    pub fn new(capacity: usize) -> ConsoleRing {
        ConsoleRing {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap();
        lines.push_back(line);
        while lines.len() > self.capacity {
            lines.pop_front();
        }
    }

    /// Last `k` lines, oldest first.
    pub fn tail(&self, k: usize) -> Vec<String> {
        let lines = self.lines.lock().unwrap();
        lines
            .iter()
            .skip(lines.len().saturating_sub(k))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConsoleRing {
    fn default() -> ConsoleRing {
        ConsoleRing::new(DEFAULT_CAPACITY)
    }
}
