// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Periodic-transmission engine
//!
//! Entries originate an IGMP frame immediately on add and then once per
//! interval. The egress port is looked up by port-group name at every send,
//! so moving a group to another port takes effect on the next transmission.

mod kinds;

pub use kinds::{GeneralQueryTx, ReportTx};

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;
use std::time::{Duration, Instant};

use crate::channel::PacketOut;
use crate::error::{TableError, TableResult};
use crate::logging::{Facility, Logger, Severity};
use crate::port_group::TxPortGroupTable;
use crate::protocols::igmp::IgmpTxParams;
use crate::scheduler::{drain_expired, ExpiryQueue};
use crate::timeout::TimeoutHandle;
use crate::tlv::{Tlv, TlvCursor};
use crate::{log_debug, log_kv, TableId};

/// Protocol instance of the transmission engine
pub trait TransmissionKind {
    type Key: Clone + Eq + Hash + Display;

    const TABLE: TableId;

    /// Parse the key. The leading reference must name an existing
    /// `tx_port_group` row when `ports` is given.
    fn parse_key(key: &[Tlv], ports: Option<&TxPortGroupTable>) -> TableResult<Self::Key>;

    /// Port-group name the key snapshots
    fn port_group(key: &Self::Key) -> &str;

    fn build_frame(key: &Self::Key, params: &IgmpTxParams) -> Vec<u8>;
}

/// Parse `[vlan_vid, ipv4_src, eth_src]`
pub fn parse_tx_params(value: &[Tlv]) -> TableResult<IgmpTxParams> {
    let mut cursor = TlvCursor::new(value);
    let vlan_id = cursor.vlan_vid()?;
    let src_ip = cursor.ipv4_src()?;
    let src_mac = cursor.eth_src()?;
    cursor.finish()?;
    Ok(IgmpTxParams {
        src_mac: src_mac.0,
        vlan_id,
        src_ip,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionEntry<K> {
    pub key: K,
    pub params: IgmpTxParams,
    /// Last successful transmission, or creation time before the first one
    pub last_hit: Instant,
    pub tx_packets: u64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransmissionCounters {
    pub sent: u64,
    /// Port group missing from `tx_port_group` at send time
    pub unresolved: u64,
    pub transmit_failed: u64,
}

/// Borrowed collaborators a send needs
pub struct TxContext<'a> {
    pub ports: &'a TxPortGroupTable,
    pub out: &'a mut dyn PacketOut,
}

pub struct TransmissionTable<P: TransmissionKind> {
    entries: HashMap<P::Key, TransmissionEntry<P::Key>>,
    queue: ExpiryQueue<P::Key>,
    interval: TimeoutHandle,
    counters: TransmissionCounters,
    logger: Logger,
}

impl<P: TransmissionKind> TransmissionTable<P> {
    pub fn new(interval: TimeoutHandle, logger: Logger) -> Self {
        Self {
            entries: HashMap::new(),
            queue: ExpiryQueue::new(),
            interval,
            counters: TransmissionCounters::default(),
            logger,
        }
    }

    /// Create the entry, send once and schedule the next send
    pub fn add(
        &mut self,
        key: &[Tlv],
        value: &[Tlv],
        ctx: TxContext<'_>,
        now: Instant,
    ) -> TableResult<()> {
        let key = P::parse_key(key, Some(ctx.ports))?;
        let params = parse_tx_params(value)?;
        if self.entries.contains_key(&key) {
            return Err(TableError::Exists);
        }

        let mut entry = TransmissionEntry {
            key: key.clone(),
            params,
            last_hit: now,
            tx_packets: 0,
        };
        send::<P>(&mut entry, &mut self.counters, &self.logger, ctx, now);
        self.queue.insert(key.clone(), now + self.interval.get());
        self.log_entry("transmission added", &key);
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Replace the value, send immediately and restart the interval
    pub fn modify(
        &mut self,
        key: &[Tlv],
        value: &[Tlv],
        ctx: TxContext<'_>,
        now: Instant,
    ) -> TableResult<()> {
        let key = P::parse_key(key, None)?;
        let params = parse_tx_params(value)?;
        let entry = self.entries.get_mut(&key).ok_or(TableError::NotFound)?;

        entry.params = params;
        self.queue.remove(&key);
        send::<P>(entry, &mut self.counters, &self.logger, ctx, now);
        self.queue.insert(key.clone(), now + self.interval.get());
        self.log_entry("transmission modified", &key);
        Ok(())
    }

    pub fn delete(&mut self, key: &[Tlv]) -> TableResult<()> {
        let key = P::parse_key(key, None)?;
        if !self.entries.contains_key(&key) {
            return Err(TableError::NotFound);
        }
        self.queue.remove(&key);
        self.entries.remove(&key);
        self.log_entry("transmission deleted", &key);
        Ok(())
    }

    pub fn get_stats(&self, key: &[Tlv], now: Instant) -> TableResult<Vec<Tlv>> {
        let key = P::parse_key(key, None)?;
        let entry = self.entries.get(&key).ok_or(TableError::NotFound)?;
        Ok(vec![
            Tlv::IdleTime(now.saturating_duration_since(entry.last_hit).as_millis() as u64),
            Tlv::TxPackets(entry.tx_packets),
        ])
    }

    pub fn lookup(&self, key: &P::Key) -> Option<&TransmissionEntry<P::Key>> {
        self.entries.get(key)
    }

    /// Send up to 32 due entries and reschedule them. Returns the delay
    /// until this should run again.
    pub fn on_timer_tick(&mut self, now: Instant, ctx: TxContext<'_>) -> Duration {
        let interval = self.interval.get();
        let entries = &mut self.entries;
        let counters = &mut self.counters;
        let logger = &self.logger;
        let ports = ctx.ports;
        let out = ctx.out;

        let drained = drain_expired(&mut self.queue, now, interval, |key| {
            let Some(entry) = entries.get_mut(key) else {
                crate::log_emergency!(logger, Facility::Transmission, "timer fired for a deleted entry");
                panic!("{}: timer fired for deleted entry {}", P::TABLE, key);
            };
            send::<P>(entry, counters, logger, TxContext { ports, out: &mut *out }, now);
        });

        if drained.processed > 0 {
            log_debug!(
                self.logger,
                Facility::Transmission,
                &format!("{}: {} periodic sends", P::TABLE, drained.processed)
            );
        }
        drained.next_tick
    }

    pub fn counters(&self) -> TransmissionCounters {
        self.counters
    }

    pub fn deadline(&self, key: &P::Key) -> Option<Instant> {
        self.queue.deadline(key)
    }

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
        log_kv!(self.logger, Severity::Info, Facility::Transmission, msg,
            "table" => P::TABLE.as_str(), "key" => key.as_str());
    }
}

/// Resolve the egress port by name and transmit one frame. Failures are
/// counted and logged; the caller reschedules either way.
fn send<P: TransmissionKind>(
    entry: &mut TransmissionEntry<P::Key>,
    counters: &mut TransmissionCounters,
    logger: &Logger,
    ctx: TxContext<'_>,
    now: Instant,
) {
    let group = P::port_group(&entry.key);
    let Some(port) = ctx.ports.lookup(group) else {
        counters.unresolved += 1;
        count_transmission(P::TABLE, "unresolved");
        log_kv!(logger, Severity::Warning, Facility::Transmission, "port group not configured",
            "table" => P::TABLE.as_str(), "name" => group);
        return;
    };

    let frame = P::build_frame(&entry.key, &entry.params);
    match ctx.out.transmit(port, &frame) {
        Ok(()) => {
            entry.last_hit = now;
            entry.tx_packets += 1;
            counters.sent += 1;
            count_transmission(P::TABLE, "sent");
            if logger.should_log(Severity::Debug, Facility::Transmission) {
                let key = entry.key.to_string();
                let port = port.to_string();
                log_kv!(logger, Severity::Debug, Facility::Transmission, "frame sent",
                    "table" => P::TABLE.as_str(), "key" => key.as_str(), "port" => port.as_str());
            }
        }
        Err(e) => {
            counters.transmit_failed += 1;
            count_transmission(P::TABLE, "failed");
            let error = e.to_string();
            log_kv!(logger, Severity::Warning, Facility::Transmission, "transmit failed",
                "table" => P::TABLE.as_str(), "name" => group, "error" => error.as_str());
        }
    }
}

fn count_transmission(table: TableId, result: &'static str) {
    ::metrics::counter!(crate::metrics::TRANSMISSIONS,
        "table" => table.as_str(), "result" => result)
    .increment(1);
}
