//! Single-slot mailbox between the reader thread and the display tick.

use crossbeam::queue::ArrayQueue;

use crate::proto::ScanReading;

/// Holds at most one [`ScanReading`]. A push overwrites whatever the
/// consumer has not collected yet, so the slot always hands out the
/// newest scan and never makes the reader wait.
pub struct LatestSlot {
    slot: ArrayQueue<ScanReading>,
}

impl LatestSlot {
    pub fn new() -> LatestSlot {
        LatestSlot {
            slot: ArrayQueue::new(1),
        }
    }

    /// Publish a reading, displacing any unconsumed one.
    pub fn push(&self, reading: ScanReading) {
        let _ = self.slot.force_push(reading);
    }

    /// Take the newest reading, emptying the slot.
    pub fn take(&self) -> Option<ScanReading> {
        let mut latest = None;
        while let Some(reading) = self.slot.pop() {
            latest = Some(reading);
        }
        latest
    }
}

impl Default for LatestSlot {
    fn default() -> LatestSlot {
        LatestSlot::new()
    }
}
