// SPDX-License-Identifier: Apache-2.0 OR MIT
// Bounded in-memory log buffer
//
// The agent core runs on one thread, so the buffer only needs to tolerate the
// consumer task reading while the core writes. A short mutex section per entry
// is enough; when the buffer is full new entries are dropped and counted.

use super::entry::LogEntry;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

pub struct LogBuffer {
    entries: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    overruns: AtomicU64,
}

impl LogBuffer {
    /// Create a buffer holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "log buffer capacity must be non-zero");
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            overruns: AtomicU64::new(0),
        }
    }

    /// Append an entry, dropping it if the buffer is full
    pub fn write(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() >= self.capacity {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            return;
        }
        entries.push_back(entry);
    }

    /// Pop the oldest entry
    pub fn read(&self) -> Option<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Number of entries dropped because the buffer was full
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
