// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Timeout configuration table
//!
//! Four named intervals parameterize the engines. The table is the only
//! writer; each engine holds a read-only `TimeoutHandle` and reads the
//! current value whenever it computes a deadline. Deleting a row restores
//! the compiled default.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{TableError, TableResult};
use crate::logging::{Facility, Logger, Severity};
use crate::tlv::{Tlv, TlvCursor};
use crate::{log_kv, validation};

pub const DEFAULT_EXPECTATION_TIMEOUT: Duration = Duration::from_secs(255);
pub const DEFAULT_TX_INTERVAL: Duration = Duration::from_secs(125);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutName {
    /// General-query and PIM-hello expectation timeout
    QueryTimeout,
    /// Membership-report expectation timeout
    ReportTimeout,
    /// General-query transmission interval
    QueryTxInterval,
    /// Membership-report transmission interval
    ReportTxInterval,
}

impl TimeoutName {
    pub const ALL: [TimeoutName; 4] = [
        TimeoutName::QueryTimeout,
        TimeoutName::ReportTimeout,
        TimeoutName::QueryTxInterval,
        TimeoutName::ReportTxInterval,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            TimeoutName::QueryTimeout => "query_timeout",
            TimeoutName::ReportTimeout => "report_timeout",
            TimeoutName::QueryTxInterval => "query_tx_interval",
            TimeoutName::ReportTxInterval => "report_tx_interval",
        }
    }

    pub const fn default_value(self) -> Duration {
        match self {
            TimeoutName::QueryTimeout | TimeoutName::ReportTimeout => DEFAULT_EXPECTATION_TIMEOUT,
            TimeoutName::QueryTxInterval | TimeoutName::ReportTxInterval => DEFAULT_TX_INTERVAL,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for TimeoutName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeoutName {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeoutName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| TableError::UnknownTimeout(s.to_string()))
    }
}

/// Read-only view of one interval
#[derive(Debug, Clone)]
pub struct TimeoutHandle(Arc<AtomicU64>);

impl TimeoutHandle {
    /// A handle that is never written after creation
    #[cfg(test)]
    pub(crate) fn fixed(value: Duration) -> Self {
        Self(Arc::new(AtomicU64::new(value.as_millis() as u64)))
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::Relaxed))
    }
}

/// Current values of the four intervals
#[derive(Debug)]
pub struct Timeouts {
    values: [Arc<AtomicU64>; 4],
}

impl Timeouts {
    pub fn new() -> Self {
        Self {
            values: TimeoutName::ALL
                .map(|name| Arc::new(AtomicU64::new(name.default_value().as_millis() as u64))),
        }
    }

    pub fn handle(&self, name: TimeoutName) -> TimeoutHandle {
        TimeoutHandle(Arc::clone(&self.values[name.index()]))
    }

    pub fn get(&self, name: TimeoutName) -> Duration {
        Duration::from_millis(self.values[name.index()].load(Ordering::Relaxed))
    }

    fn set(&self, name: TimeoutName, value: Duration) {
        self.values[name.index()].store(value.as_millis() as u64, Ordering::Relaxed);
    }

    fn reset(&self, name: TimeoutName) {
        self.set(name, name.default_value());
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::new()
    }
}

/// The `timeout` table: key [name], value [interval_ms]
pub struct TimeoutTable {
    timeouts: Timeouts,
    configured: HashSet<TimeoutName>,
    logger: Logger,
}

impl TimeoutTable {
    pub fn new(logger: Logger) -> Self {
        Self {
            timeouts: Timeouts::new(),
            configured: HashSet::new(),
            logger,
        }
    }

    pub fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    pub fn handle(&self, name: TimeoutName) -> TimeoutHandle {
        self.timeouts.handle(name)
    }

    fn parse_key(key: &[Tlv]) -> TableResult<TimeoutName> {
        let mut cursor = TlvCursor::new(key);
        let name: TimeoutName = cursor.name()?.parse()?;
        cursor.finish()?;
        Ok(name)
    }

    fn parse_value(value: &[Tlv]) -> TableResult<Duration> {
        let mut cursor = TlvCursor::new(value);
        let interval_ms = cursor.interval_ms()?;
        cursor.finish()?;
        validation::validate_interval_ms(interval_ms, "interval_ms")
            .map_err(|reason| TableError::invalid("interval_ms", reason))?;
        Ok(Duration::from_millis(interval_ms as u64))
    }

    pub fn add(&mut self, key: &[Tlv], value: &[Tlv]) -> TableResult<()> {
        let name = Self::parse_key(key)?;
        let interval = Self::parse_value(value)?;
        if self.configured.contains(&name) {
            return Err(TableError::Exists);
        }
        self.configured.insert(name);
        self.write(name, interval);
        Ok(())
    }

    pub fn modify(&mut self, key: &[Tlv], value: &[Tlv]) -> TableResult<()> {
        let name = Self::parse_key(key)?;
        let interval = Self::parse_value(value)?;
        if !self.configured.contains(&name) {
            return Err(TableError::NotFound);
        }
        self.write(name, interval);
        Ok(())
    }

    pub fn delete(&mut self, key: &[Tlv]) -> TableResult<()> {
        let name = Self::parse_key(key)?;
        if !self.configured.remove(&name) {
            return Err(TableError::NotFound);
        }
        self.timeouts.reset(name);
        let ms = self.timeouts.get(name).as_millis().to_string();
        log_kv!(self.logger, Severity::Info, Facility::Timeout, "timeout restored to default",
            "name" => name.as_str(), "interval_ms" => ms.as_str());
        Ok(())
    }

    /// Apply a startup override as if it had been added through the table
    pub fn apply_initial(&mut self, name: TimeoutName, interval: Duration) {
        self.configured.insert(name);
        self.write(name, interval);
    }

    fn write(&self, name: TimeoutName, interval: Duration) {
        self.timeouts.set(name, interval);
        let ms = interval.as_millis().to_string();
        log_kv!(self.logger, Severity::Info, Facility::Timeout, "timeout set",
            "name" => name.as_str(), "interval_ms" => ms.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> Vec<Tlv> {
        vec![Tlv::Name(name.to_string())]
    }

    fn value(ms: u32) -> Vec<Tlv> {
        vec![Tlv::IntervalMs(ms)]
    }

    #[test]
    fn test_defaults() {
        let timeouts = Timeouts::new();
        assert_eq!(timeouts.get(TimeoutName::QueryTimeout), Duration::from_secs(255));
        assert_eq!(timeouts.get(TimeoutName::ReportTimeout), Duration::from_secs(255));
        assert_eq!(timeouts.get(TimeoutName::QueryTxInterval), Duration::from_secs(125));
        assert_eq!(timeouts.get(TimeoutName::ReportTxInterval), Duration::from_secs(125));
    }

    #[test]
    fn test_add_updates_handles() {
        let mut table = TimeoutTable::new(Logger::disabled());
        let handle = table.handle(TimeoutName::QueryTimeout);

        table.add(&key("query_timeout"), &value(2000)).unwrap();
        assert_eq!(handle.get(), Duration::from_millis(2000));
        assert_eq!(
            table.handle(TimeoutName::ReportTimeout).get(),
            DEFAULT_EXPECTATION_TIMEOUT
        );
    }

    #[test]
    fn test_delete_restores_default() {
        let mut table = TimeoutTable::new(Logger::disabled());
        let handle = table.handle(TimeoutName::ReportTxInterval);

        table.add(&key("report_tx_interval"), &value(500)).unwrap();
        table.modify(&key("report_tx_interval"), &value(700)).unwrap();
        assert_eq!(handle.get(), Duration::from_millis(700));

        table.delete(&key("report_tx_interval")).unwrap();
        assert_eq!(handle.get(), DEFAULT_TX_INTERVAL);
        assert_eq!(
            table.delete(&key("report_tx_interval")),
            Err(TableError::NotFound)
        );
    }

    #[test]
    fn test_unknown_name_rejected() {
        let mut table = TimeoutTable::new(Logger::disabled());
        assert_eq!(
            table.add(&key("hello_timeout"), &value(10)),
            Err(TableError::UnknownTimeout("hello_timeout".into()))
        );
    }

    #[test]
    fn test_duplicate_add_and_missing_modify() {
        let mut table = TimeoutTable::new(Logger::disabled());
        table.add(&key("query_timeout"), &value(10)).unwrap();
        assert_eq!(
            table.add(&key("query_timeout"), &value(20)),
            Err(TableError::Exists)
        );
        assert_eq!(
            table.modify(&key("report_timeout"), &value(20)),
            Err(TableError::NotFound)
        );
    }

    #[test]
    fn test_bad_value_leaves_state_untouched() {
        let mut table = TimeoutTable::new(Logger::disabled());
        assert!(table.add(&key("query_timeout"), &value(0)).is_err());
        assert!(table.add(&key("query_timeout"), &[]).is_err());
        assert!(table
            .add(&key("query_timeout"), &[Tlv::IntervalMs(5), Tlv::IntervalMs(6)])
            .is_err());
        assert_eq!(
            table.timeouts().get(TimeoutName::QueryTimeout),
            DEFAULT_EXPECTATION_TIMEOUT
        );
        // Nothing was recorded, so a valid add still succeeds
        table.add(&key("query_timeout"), &value(5)).unwrap();
    }

    #[test]
    fn test_fixed_handle() {
        let handle = TimeoutHandle::fixed(Duration::from_secs(105));
        assert_eq!(handle.clone().get(), Duration::from_secs(105));
    }
}
