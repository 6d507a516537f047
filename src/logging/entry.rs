// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log entry structure

use super::{Facility, Severity};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// At most this many key-value pairs are kept per entry
pub const MAX_KVS: usize = 4;

/// Messages longer than this are truncated (on a char boundary)
pub const MAX_MESSAGE_LEN: usize = 256;

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Key-value pair for structured logging
#[derive(Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl std::fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// A single log record
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: Severity,
    pub facility: Facility,
    /// Wall-clock time in nanoseconds since the Unix epoch
    pub timestamp_ns: u64,
    /// Process-wide sequence number, strictly increasing
    pub sequence: u64,
    message: String,
    kvs: Vec<KeyValue>,
}

impl LogEntry {
    pub fn new(severity: Severity, facility: Facility, message: &str) -> Self {
        Self {
            severity,
            facility,
            timestamp_ns: wall_clock_nanos(),
            sequence: NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            message: truncate(message, MAX_MESSAGE_LEN).to_string(),
            kvs: Vec::new(),
        }
    }

    pub fn get_message(&self) -> &str {
        &self.message
    }

    /// Add a key-value pair (extra pairs beyond MAX_KVS are dropped)
    pub fn add_kv(&mut self, key: &str, value: &str) {
        if self.kvs.len() < MAX_KVS {
            self.kvs.push(KeyValue {
                key: key.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn get_kvs(&self) -> &[KeyValue] {
        &self.kvs
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn wall_clock_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_message_and_kvs() {
        let mut entry = LogEntry::new(Severity::Info, Facility::Test, "entry added");
        entry.add_kv("table", "report_expectation");
        entry.add_kv("vlan", "10");

        assert_eq!(entry.get_message(), "entry added");
        assert_eq!(entry.get_kvs().len(), 2);
        assert_eq!(format!("{:?}", entry.get_kvs()[1]), "vlan=10");
    }

    #[test]
    fn test_kv_limit() {
        let mut entry = LogEntry::new(Severity::Debug, Facility::Test, "kvs");
        for i in 0..10 {
            entry.add_kv("k", &i.to_string());
        }
        assert_eq!(entry.get_kvs().len(), MAX_KVS);
    }

    #[test]
    fn test_long_message_truncated_on_char_boundary() {
        let message = "é".repeat(200); // 400 bytes
        let entry = LogEntry::new(Severity::Info, Facility::Test, &message);
        assert!(entry.get_message().len() <= MAX_MESSAGE_LEN);
        assert!(entry.get_message().chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_sequence_increases() {
        let a = LogEntry::new(Severity::Info, Facility::Test, "a");
        let b = LogEntry::new(Severity::Info, Facility::Test, "b");
        assert!(b.sequence > a.sequence);
    }
}
