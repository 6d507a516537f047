// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Keepalive-expectation engine
//!
//! Each entry says "traffic matching this key is expected at least once per
//! timeout". A match pushes the deadline forward. When the deadline passes
//! the controller is told the entry is idle, and told again every further
//! timeout for as long as the silence lasts.
//!
//! One generic table serves the three instances; `ExpectationKind` supplies
//! the key shape, the notification and the stats layout.

mod kinds;

pub use kinds::{GeneralQuery, PimHello, Report};

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::channel::ControlChannel;
use crate::error::{TableError, TableResult};
use crate::logging::{Facility, Logger, Severity};
use crate::scheduler::{drain_expired, ExpiryQueue};
use crate::timeout::TimeoutHandle;
use crate::tlv::{expect_empty, Tlv};
use crate::{log_debug, log_emergency, log_kv, IdleNotification, TableId};

/// Protocol instance of the expectation engine
pub trait ExpectationKind {
    type Key: Clone + Eq + Hash + Display;

    const TABLE: TableId;

    /// Whether get_stats reports the notification count
    const STATS_INCLUDE_TX: bool;

    fn parse_key(key: &[Tlv]) -> TableResult<Self::Key>;

    fn notification(key: &Self::Key) -> IdleNotification;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationEntry<K> {
    pub key: K,
    /// Last matching packet, or creation time before the first match
    pub last_hit: Instant,
    pub rx_packets: u64,
    /// Idle notifications successfully sent
    pub tx_packets: u64,
}

impl<K> ExpectationEntry<K> {
    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_hit)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExpectationCounters {
    pub matches: u64,
    pub expirations: u64,
    pub notifications_sent: u64,
    /// No controller, or one that cannot take asynchronous messages
    pub notifications_skipped: u64,
    pub notifications_failed: u64,
}

pub struct ExpectationTable<P: ExpectationKind> {
    entries: HashMap<P::Key, ExpectationEntry<P::Key>>,
    queue: ExpiryQueue<P::Key>,
    timeout: TimeoutHandle,
    counters: ExpectationCounters,
    logger: Logger,
}

impl<P: ExpectationKind> ExpectationTable<P> {
    pub fn new(timeout: TimeoutHandle, logger: Logger) -> Self {
        Self {
            entries: HashMap::new(),
            queue: ExpiryQueue::new(),
            timeout,
            counters: ExpectationCounters::default(),
            logger,
        }
    }

    pub fn add(&mut self, key: &[Tlv], value: &[Tlv], now: Instant) -> TableResult<()> {
        let key = P::parse_key(key)?;
        expect_empty(value)?;
        if self.entries.contains_key(&key) {
            return Err(TableError::Exists);
        }

        self.queue.insert(key.clone(), now + self.timeout.get());
        self.log_entry("expectation added", &key);
        self.entries.insert(
            key.clone(),
            ExpectationEntry {
                key,
                last_hit: now,
                rx_packets: 0,
                tx_packets: 0,
            },
        );
        Ok(())
    }

    /// There is no value to change; the key must exist and the value be empty
    pub fn modify(&mut self, key: &[Tlv], value: &[Tlv]) -> TableResult<()> {
        let key = P::parse_key(key)?;
        expect_empty(value)?;
        if !self.entries.contains_key(&key) {
            return Err(TableError::NotFound);
        }
        Ok(())
    }

    pub fn delete(&mut self, key: &[Tlv]) -> TableResult<()> {
        let key = P::parse_key(key)?;
        if !self.entries.contains_key(&key) {
            return Err(TableError::NotFound);
        }
        // Unregister before the entry goes away
        self.queue.remove(&key);
        self.entries.remove(&key);
        self.log_entry("expectation deleted", &key);
        Ok(())
    }

    pub fn get_stats(&self, key: &[Tlv], now: Instant) -> TableResult<Vec<Tlv>> {
        let key = P::parse_key(key)?;
        let entry = self.entries.get(&key).ok_or(TableError::NotFound)?;

        let mut stats = vec![
            Tlv::IdleTime(entry.idle_time(now).as_millis() as u64),
            Tlv::RxPackets(entry.rx_packets),
        ];
        if P::STATS_INCLUDE_TX {
            stats.push(Tlv::TxPackets(entry.tx_packets));
        }
        Ok(stats)
    }

    pub fn lookup(&self, key: &P::Key) -> Option<&ExpectationEntry<P::Key>> {
        self.entries.get(key)
    }

    /// Record matching traffic: refresh the entry and push its deadline to
    /// `now + timeout`. Returns false when no entry has this key.
    pub fn on_match(&mut self, key: &P::Key, now: Instant) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        entry.last_hit = now;
        entry.rx_packets += 1;
        self.queue.insert(key.clone(), now + self.timeout.get());
        self.counters.matches += 1;
        ::metrics::counter!(crate::metrics::EXPECTATION_MATCHES, "table" => P::TABLE.as_str())
            .increment(1);
        true
    }

    /// Notify the controller about up to 32 idle entries and reschedule them.
    /// Returns the delay until this should run again.
    pub fn on_timer_tick(&mut self, now: Instant, channel: &mut dyn ControlChannel) -> Duration {
        let interval = self.timeout.get();
        let entries = &mut self.entries;
        let counters = &mut self.counters;
        let logger = &self.logger;
        let async_capable = channel.async_capable();

        let drained = drain_expired(&mut self.queue, now, interval, |key| {
            let Some(entry) = entries.get_mut(key) else {
                log_emergency!(logger, Facility::Expectation, "timer fired for a deleted entry");
                panic!("{}: timer fired for deleted entry {}", P::TABLE, key);
            };
            counters.expirations += 1;

            if !async_capable {
                counters.notifications_skipped += 1;
                count_notification(P::TABLE, "skipped");
                return;
            }
            match channel.send(crate::ControllerMessage::IdleNotification(P::notification(key))) {
                Ok(()) => {
                    entry.tx_packets += 1;
                    counters.notifications_sent += 1;
                    count_notification(P::TABLE, "sent");
                    let key = key.to_string();
                    log_kv!(logger, Severity::Debug, Facility::Expectation, "idle notification sent",
                        "table" => P::TABLE.as_str(), "key" => key.as_str());
                }
                Err(e) => {
                    counters.notifications_failed += 1;
                    count_notification(P::TABLE, "failed");
                    let key = key.to_string();
                    let error = e.to_string();
                    log_kv!(logger, Severity::Warning, Facility::Expectation, "idle notification failed",
                        "table" => P::TABLE.as_str(), "key" => key.as_str(), "error" => error.as_str());
                }
            }
        });

        if drained.processed > 0 {
            log_debug!(
                self.logger,
                Facility::Expectation,
                &format!("{}: {} expired entries serviced", P::TABLE, drained.processed)
            );
        }
        drained.next_tick
    }

    pub fn counters(&self) -> ExpectationCounters {
        self.counters
    }

    /// Deadline currently registered for a key
    pub fn deadline(&self, key: &P::Key) -> Option<Instant> {
        self.queue.deadline(key)
    }

    /// Number of live scheduler registrations
    pub fn registrations(&self) -> usize {
        self.queue.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn log_entry(&self, msg: &str, key: &P::Key) {
        let key = key.to_string();
        log_kv!(self.logger, Severity::Info, Facility::Expectation, msg,
            "table" => P::TABLE.as_str(), "key" => key.as_str());
    }
}

fn count_notification(table: TableId, result: &'static str) {
    ::metrics::counter!(crate::metrics::IDLE_NOTIFICATIONS,
        "table" => table.as_str(), "result" => result)
    .increment(1);
}
