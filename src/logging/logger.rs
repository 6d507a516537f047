// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logger and LogRegistry for managing per-facility log buffers

use super::buffer::LogBuffer;
use super::entry::{LogEntry, MAX_KVS};
use super::{Facility, Severity};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

type FacilityLevels = Arc<RwLock<HashMap<Facility, Severity>>>;

/// Destination for entries that passed the severity filter
pub trait LogTarget: Send + Sync {
    fn write(&self, entry: LogEntry);
}

impl LogTarget for LogBuffer {
    fn write(&self, entry: LogEntry) {
        LogBuffer::write(self, entry);
    }
}

/// Writes one JSON object per entry straight to stderr
///
/// Used before the consumer task exists (config checking, startup failures).
pub struct StderrJsonLogger;

impl LogTarget for StderrJsonLogger {
    fn write(&self, entry: LogEntry) {
        let log_msg = serde_json::json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": entry.severity.as_str(),
            "facility": entry.facility.as_str(),
            "message": entry.get_message(),
        });
        eprintln!("{}", log_msg);
    }
}

/// Logger handle for writing log entries
///
/// Cheap to clone; the target and the level settings are shared.
#[derive(Clone)]
pub struct Logger {
    target: Arc<dyn LogTarget>,
    global_min_level: Arc<AtomicU8>,
    facility_min_levels: FacilityLevels,
}

impl Logger {
    pub fn new(
        target: Arc<dyn LogTarget>,
        global_min_level: Arc<AtomicU8>,
        facility_min_levels: FacilityLevels,
    ) -> Self {
        Self {
            target,
            global_min_level,
            facility_min_levels,
        }
    }

    /// Logger writing JSON to stderr at Info and above
    pub fn stderr_json() -> Self {
        Self::new(
            Arc::new(StderrJsonLogger),
            Arc::new(AtomicU8::new(Severity::Info as u8)),
            Arc::new(RwLock::new(HashMap::new())),
        )
    }

    /// Logger that discards everything (for tests and embedded use)
    pub fn disabled() -> Self {
        struct Discard;
        impl LogTarget for Discard {
            fn write(&self, _entry: LogEntry) {}
        }
        Self::new(
            Arc::new(Discard),
            Arc::new(AtomicU8::new(Severity::Emergency as u8)),
            Arc::new(RwLock::new(HashMap::new())),
        )
    }

    /// A facility-specific level, when set, overrides the global one
    #[inline]
    pub fn should_log(&self, severity: Severity, facility: Facility) -> bool {
        let levels = self
            .facility_min_levels
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(&min_level) = levels.get(&facility) {
            return severity <= min_level;
        }
        drop(levels);

        (severity as u8) <= self.global_min_level.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn log(&self, severity: Severity, facility: Facility, message: &str) {
        if !self.should_log(severity, facility) {
            return;
        }
        self.target.write(LogEntry::new(severity, facility, message));
    }

    /// Write a log entry with key-value pairs
    #[inline]
    pub fn log_kv(
        &self,
        severity: Severity,
        facility: Facility,
        message: &str,
        kvs: &[(&str, &str)],
    ) {
        if !self.should_log(severity, facility) {
            return;
        }

        let mut entry = LogEntry::new(severity, facility, message);
        for (key, value) in kvs.iter().take(MAX_KVS) {
            entry.add_kv(key, value);
        }
        self.target.write(entry);
    }

    #[inline]
    pub fn emergency(&self, facility: Facility, message: &str) {
        self.log(Severity::Emergency, facility, message);
    }

    #[inline]
    pub fn alert(&self, facility: Facility, message: &str) {
        self.log(Severity::Alert, facility, message);
    }

    #[inline]
    pub fn critical(&self, facility: Facility, message: &str) {
        self.log(Severity::Critical, facility, message);
    }

    #[inline]
    pub fn error(&self, facility: Facility, message: &str) {
        self.log(Severity::Error, facility, message);
    }

    #[inline]
    pub fn warning(&self, facility: Facility, message: &str) {
        self.log(Severity::Warning, facility, message);
    }

    #[inline]
    pub fn notice(&self, facility: Facility, message: &str) {
        self.log(Severity::Notice, facility, message);
    }

    #[inline]
    pub fn info(&self, facility: Facility, message: &str) {
        self.log(Severity::Info, facility, message);
    }

    #[inline]
    pub fn debug(&self, facility: Facility, message: &str) {
        self.log(Severity::Debug, facility, message);
    }
}

/// Registry for creating and managing loggers
///
/// Owns one `LogBuffer` per facility, sized by `Facility::buffer_size`, and
/// the level settings shared by every logger it hands out.
pub struct LogRegistry {
    loggers: HashMap<Facility, Logger>,
    buffers: Vec<(Facility, Arc<LogBuffer>)>,
    global_min_level: Arc<AtomicU8>,
    facility_min_levels: FacilityLevels,
}

impl LogRegistry {
    pub fn new() -> Self {
        let global_min_level = Arc::new(AtomicU8::new(Severity::Info as u8));
        let facility_min_levels: FacilityLevels = Arc::new(RwLock::new(HashMap::new()));
        let mut loggers = HashMap::new();
        let mut buffers = Vec::new();

        for facility in Facility::ALL {
            let buffer = Arc::new(LogBuffer::new(facility.buffer_size()));
            let logger = Logger::new(
                Arc::clone(&buffer) as Arc<dyn LogTarget>,
                Arc::clone(&global_min_level),
                Arc::clone(&facility_min_levels),
            );
            loggers.insert(facility, logger);
            buffers.push((facility, buffer));
        }

        Self {
            loggers,
            buffers,
            global_min_level,
            facility_min_levels,
        }
    }

    pub fn get(&self, facility: Facility) -> Option<&Logger> {
        self.loggers.get(&facility)
    }

    /// Cloned logger for a facility; unregistered facilities get a disabled logger
    pub fn logger(&self, facility: Facility) -> Logger {
        self.loggers
            .get(&facility)
            .cloned()
            .unwrap_or_else(Logger::disabled)
    }

    /// Buffers for the consumer task
    pub fn buffers(&self) -> Vec<(Facility, Arc<LogBuffer>)> {
        self.buffers
            .iter()
            .map(|(facility, buffer)| (*facility, Arc::clone(buffer)))
            .collect()
    }

    /// Total entries dropped across all facilities
    pub fn overruns(&self) -> u64 {
        self.buffers.iter().map(|(_, b)| b.overruns()).sum()
    }

    pub fn set_global_level(&self, level: Severity) {
        self.global_min_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> Severity {
        Severity::from_u8(self.global_min_level.load(Ordering::Relaxed)).unwrap_or(Severity::Info)
    }

    pub fn set_facility_level(&self, facility: Facility, level: Severity) {
        self.facility_min_levels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(facility, level);
    }

    pub fn clear_facility_level(&self, facility: Facility) {
        self.facility_min_levels
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&facility);
    }

    /// Facility-specific level if set, otherwise the global level
    pub fn get_facility_level(&self, facility: Facility) -> Severity {
        self.facility_min_levels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&facility)
            .copied()
            .unwrap_or_else(|| self.get_global_level())
    }
}

impl Default for LogRegistry {
    fn default() -> Self {
        Self::new()
    }
}
