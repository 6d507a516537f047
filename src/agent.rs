// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The agent: every table, the classifier and the two outbound interfaces.
//!
//! All methods are synchronous and take the current time from the caller.
//! The runtime serializes requests, packet-ins and engine ticks onto one
//! `Agent`, so no table needs interior locking.

use std::time::{Duration, Instant};

use crate::channel::{ControlChannel, PacketOut};
use crate::classifier::{Classifier, ClassifierCounters, ClassifierTargets, Disposition};
use crate::error::{TableError, TableResult};
use crate::expectation::{ExpectationTable, GeneralQuery, PimHello, Report};
use crate::logging::{Facility, LogRegistry, Logger, Severity};
use crate::port_group::{RxPortGroupTable, TxPortGroupTable};
use crate::timeout::{TimeoutName, TimeoutTable};
use crate::transmission::{GeneralQueryTx, ReportTx, TransmissionTable, TxContext};
use crate::tlv::Tlv;
use crate::{log_info, log_kv, TableId, TableOp, TableRequest, TableResponse};

/// One of the five timer-driven engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineId {
    GeneralQueryExpectation,
    ReportExpectation,
    PimExpectation,
    GeneralQueryTx,
    ReportTx,
}

impl EngineId {
    pub const ALL: [EngineId; 5] = [
        EngineId::GeneralQueryExpectation,
        EngineId::ReportExpectation,
        EngineId::PimExpectation,
        EngineId::GeneralQueryTx,
        EngineId::ReportTx,
    ];
}

pub struct Agent<C, O> {
    timeouts: TimeoutTable,
    rx_port_groups: RxPortGroupTable,
    tx_port_groups: TxPortGroupTable,
    general_query: ExpectationTable<GeneralQuery>,
    report: ExpectationTable<Report>,
    pim_hello: ExpectationTable<PimHello>,
    general_query_tx: TransmissionTable<GeneralQueryTx>,
    report_tx: TransmissionTable<ReportTx>,
    classifier: Classifier,
    channel: C,
    packet_out: O,
    logger: Logger,
}

impl<C: ControlChannel, O: PacketOut> Agent<C, O> {
    /// Both router-liveness expectations (general query and PIM hello) run
    /// on `query_timeout`; the other three engines each have their own row.
    pub fn new(max_ports: u32, logs: &LogRegistry, channel: C, packet_out: O) -> Self {
        let timeouts = TimeoutTable::new(logs.logger(Facility::Timeout));
        let expectation_logger = logs.logger(Facility::Expectation);
        let transmission_logger = logs.logger(Facility::Transmission);

        let agent = Self {
            rx_port_groups: RxPortGroupTable::new(max_ports, logs.logger(Facility::PortGroup)),
            tx_port_groups: TxPortGroupTable::new(max_ports, logs.logger(Facility::PortGroup)),
            general_query: ExpectationTable::new(
                timeouts.handle(TimeoutName::QueryTimeout),
                expectation_logger.clone(),
            ),
            report: ExpectationTable::new(
                timeouts.handle(TimeoutName::ReportTimeout),
                expectation_logger.clone(),
            ),
            pim_hello: ExpectationTable::new(
                timeouts.handle(TimeoutName::QueryTimeout),
                expectation_logger,
            ),
            general_query_tx: TransmissionTable::new(
                timeouts.handle(TimeoutName::QueryTxInterval),
                transmission_logger.clone(),
            ),
            report_tx: TransmissionTable::new(
                timeouts.handle(TimeoutName::ReportTxInterval),
                transmission_logger,
            ),
            classifier: Classifier::new(logs.logger(Facility::Classifier)),
            timeouts,
            channel,
            packet_out,
            logger: logs.logger(Facility::Agent),
        };

        let max_ports = max_ports.to_string();
        log_kv!(agent.logger, Severity::Info, Facility::Agent, "agent created",
            "max_ports" => max_ports.as_str());
        agent
    }

    /// Apply startup timeout overrides before any entry exists
    pub fn apply_initial_timeouts(&mut self, timeouts: &[(TimeoutName, Duration)]) {
        for (name, interval) in timeouts {
            self.timeouts.apply_initial(*name, *interval);
        }
    }

    /// Execute one controller table request
    pub fn handle_request(&mut self, request: &TableRequest, now: Instant) -> TableResponse {
        let result = self.dispatch(request, now);
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => error_label(e),
        };
        ::metrics::counter!(crate::metrics::TABLE_REQUESTS,
            "table" => request.table.as_str(), "op" => request.op.name(), "result" => outcome)
        .increment(1);

        match result {
            Ok(None) => TableResponse::Ok,
            Ok(Some(stats)) => TableResponse::Stats(stats),
            Err(e) => {
                let error = e.to_string();
                log_kv!(self.logger, Severity::Notice, Facility::Agent, "table request rejected",
                    "table" => request.table.as_str(), "op" => request.op.name(),
                    "error" => error.as_str());
                TableResponse::from(&e)
            }
        }
    }

    fn dispatch(&mut self, request: &TableRequest, now: Instant) -> TableResult<Option<Vec<Tlv>>> {
        let table = request.table;
        match &request.op {
            TableOp::Add { key, value } => self.add(table, key, value, now).map(|_| None),
            TableOp::Modify { key, value } => self.modify(table, key, value, now).map(|_| None),
            TableOp::Delete { key } => self.delete(table, key).map(|_| None),
            TableOp::GetStats { key } => self.get_stats(table, key, now).map(Some),
        }
    }

    fn add(&mut self, table: TableId, key: &[Tlv], value: &[Tlv], now: Instant) -> TableResult<()> {
        match table {
            TableId::Timeout => self.timeouts.add(key, value),
            TableId::RxPortGroup => self.rx_port_groups.add(key, value),
            TableId::TxPortGroup => self.tx_port_groups.add(key, value),
            TableId::GeneralQueryExpectation => self.general_query.add(key, value, now),
            TableId::ReportExpectation => self.report.add(key, value, now),
            TableId::PimExpectation => self.pim_hello.add(key, value, now),
            TableId::GeneralQueryTx => self.general_query_tx.add(
                key,
                value,
                TxContext {
                    ports: &self.tx_port_groups,
                    out: &mut self.packet_out,
                },
                now,
            ),
            TableId::ReportTx => self.report_tx.add(
                key,
                value,
                TxContext {
                    ports: &self.tx_port_groups,
                    out: &mut self.packet_out,
                },
                now,
            ),
        }
    }

    fn modify(
        &mut self,
        table: TableId,
        key: &[Tlv],
        value: &[Tlv],
        now: Instant,
    ) -> TableResult<()> {
        match table {
            TableId::Timeout => self.timeouts.modify(key, value),
            TableId::RxPortGroup => self.rx_port_groups.modify(key, value),
            TableId::TxPortGroup => self.tx_port_groups.modify(key, value),
            TableId::GeneralQueryExpectation => self.general_query.modify(key, value),
            TableId::ReportExpectation => self.report.modify(key, value),
            TableId::PimExpectation => self.pim_hello.modify(key, value),
            TableId::GeneralQueryTx => self.general_query_tx.modify(
                key,
                value,
                TxContext {
                    ports: &self.tx_port_groups,
                    out: &mut self.packet_out,
                },
                now,
            ),
            TableId::ReportTx => self.report_tx.modify(
                key,
                value,
                TxContext {
                    ports: &self.tx_port_groups,
                    out: &mut self.packet_out,
                },
                now,
            ),
        }
    }

    fn delete(&mut self, table: TableId, key: &[Tlv]) -> TableResult<()> {
        match table {
            TableId::Timeout => self.timeouts.delete(key),
            TableId::RxPortGroup => self.rx_port_groups.delete(key),
            TableId::TxPortGroup => self.tx_port_groups.delete(key),
            TableId::GeneralQueryExpectation => self.general_query.delete(key),
            TableId::ReportExpectation => self.report.delete(key),
            TableId::PimExpectation => self.pim_hello.delete(key),
            TableId::GeneralQueryTx => self.general_query_tx.delete(key),
            TableId::ReportTx => self.report_tx.delete(key),
        }
    }

    fn get_stats(&self, table: TableId, key: &[Tlv], now: Instant) -> TableResult<Vec<Tlv>> {
        match table {
            TableId::GeneralQueryExpectation => self.general_query.get_stats(key, now),
            TableId::ReportExpectation => self.report.get_stats(key, now),
            TableId::PimExpectation => self.pim_hello.get_stats(key, now),
            TableId::GeneralQueryTx => self.general_query_tx.get_stats(key, now),
            TableId::ReportTx => self.report_tx.get_stats(key, now),
            TableId::Timeout | TableId::RxPortGroup | TableId::TxPortGroup => {
                Err(TableError::StatsNotSupported(table.as_str()))
            }
        }
    }

    /// Classify one packet-in received on `in_port`
    pub fn classify(&mut self, frame: &[u8], in_port: u32, now: Instant) -> Disposition {
        self.classifier.classify(
            frame,
            in_port,
            now,
            ClassifierTargets {
                rx_port_groups: &self.rx_port_groups,
                general_query: &mut self.general_query,
                report: &mut self.report,
                pim_hello: &mut self.pim_hello,
            },
        )
    }

    /// Run one engine's timer tick; returns the delay until its next tick
    pub fn tick(&mut self, engine: EngineId, now: Instant) -> Duration {
        match engine {
            EngineId::GeneralQueryExpectation => {
                self.general_query.on_timer_tick(now, &mut self.channel)
            }
            EngineId::ReportExpectation => self.report.on_timer_tick(now, &mut self.channel),
            EngineId::PimExpectation => self.pim_hello.on_timer_tick(now, &mut self.channel),
            EngineId::GeneralQueryTx => self.general_query_tx.on_timer_tick(
                now,
                TxContext {
                    ports: &self.tx_port_groups,
                    out: &mut self.packet_out,
                },
            ),
            EngineId::ReportTx => self.report_tx.on_timer_tick(
                now,
                TxContext {
                    ports: &self.tx_port_groups,
                    out: &mut self.packet_out,
                },
            ),
        }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Connection state changes go through here
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    pub fn packet_out(&self) -> &O {
        &self.packet_out
    }

    pub fn timeouts(&self) -> &TimeoutTable {
        &self.timeouts
    }

    pub fn rx_port_groups(&self) -> &RxPortGroupTable {
        &self.rx_port_groups
    }

    pub fn tx_port_groups(&self) -> &TxPortGroupTable {
        &self.tx_port_groups
    }

    pub fn general_query(&self) -> &ExpectationTable<GeneralQuery> {
        &self.general_query
    }

    pub fn report(&self) -> &ExpectationTable<Report> {
        &self.report
    }

    pub fn pim_hello(&self) -> &ExpectationTable<PimHello> {
        &self.pim_hello
    }

    pub fn general_query_tx(&self) -> &TransmissionTable<GeneralQueryTx> {
        &self.general_query_tx
    }

    pub fn report_tx(&self) -> &TransmissionTable<ReportTx> {
        &self.report_tx
    }

    pub fn classifier_counters(&self) -> &ClassifierCounters {
        self.classifier.counters()
    }

    /// Log a one-line summary of table sizes
    pub fn log_summary(&self) {
        log_info!(
            self.logger,
            Facility::Agent,
            &format!(
                "tables: rx_port_group={} tx_port_group={} gq_exp={} report_exp={} pim_exp={} gq_tx={} report_tx={}",
                self.rx_port_groups.len(),
                self.tx_port_groups.len(),
                self.general_query.len(),
                self.report.len(),
                self.pim_hello.len(),
                self.general_query_tx.len(),
                self.report_tx.len(),
            )
        );
    }
}

fn error_label(e: &TableError) -> &'static str {
    match e.code() {
        crate::ErrorCode::Param => "param",
        crate::ErrorCode::Exists => "exists",
        crate::ErrorCode::NotFound => "not_found",
        crate::ErrorCode::NotSupported => "not_supported",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ControllerLink, FrameSender};
    use crate::keys::VlanKey;
    use crate::protocols::frame::Ipv4FrameBuilder;
    use crate::protocols::pim::{PimHelloBuilder, ALL_PIM_ROUTERS};
    use crate::protocols::PacketBuilder;
    use crate::ErrorCode;
    use std::net::Ipv4Addr;
    use tokio::sync::mpsc;

    fn agent() -> Agent<ControllerLink, FrameSender> {
        let (msg_tx, _) = mpsc::unbounded_channel();
        let (frame_tx, _) = mpsc::unbounded_channel();
        Agent::new(
            64,
            &LogRegistry::new(),
            ControllerLink::new(msg_tx),
            FrameSender::new(frame_tx),
        )
    }

    fn request(table: TableId, op: TableOp) -> TableRequest {
        TableRequest { table, op }
    }

    #[test]
    fn test_dispatch_by_table() {
        let mut agent = agent();
        let now = Instant::now();

        let add = request(
            TableId::RxPortGroup,
            TableOp::Add {
                key: vec![Tlv::PortNo(1)],
                value: vec![Tlv::Name("g1".into())],
            },
        );
        assert_eq!(agent.handle_request(&add, now), TableResponse::Ok);
        assert_eq!(agent.rx_port_groups().lookup(1), Some("g1"));

        let dup = agent.handle_request(&add, now);
        assert!(matches!(
            dup,
            TableResponse::Error {
                code: ErrorCode::Exists,
                ..
            }
        ));
    }

    #[test]
    fn test_stats_not_supported_on_directories() {
        let mut agent = agent();
        let response = agent.handle_request(
            &request(
                TableId::TxPortGroup,
                TableOp::GetStats {
                    key: vec![Tlv::Name("g1".into())],
                },
            ),
            Instant::now(),
        );
        assert!(matches!(
            response,
            TableResponse::Error {
                code: ErrorCode::NotSupported,
                ..
            }
        ));
    }

    #[test]
    fn test_initial_timeouts_reach_engines() {
        let mut agent = agent();
        agent.apply_initial_timeouts(&[(TimeoutName::QueryTimeout, Duration::from_secs(3))]);

        let now = Instant::now();
        let add = request(
            TableId::GeneralQueryExpectation,
            TableOp::Add {
                key: vec![Tlv::Name("g1".into()), Tlv::VlanVid(5)],
                value: vec![],
            },
        );
        assert_eq!(agent.handle_request(&add, now), TableResponse::Ok);
        assert_eq!(
            agent
                .general_query()
                .deadline(&VlanKey::new("g1", 5)),
            Some(now + Duration::from_secs(3))
        );
    }

    #[test]
    fn test_pim_hello_follows_query_timeout() {
        let mut agent = agent();
        let now = Instant::now();
        let add = request(
            TableId::PimExpectation,
            TableOp::Add {
                key: vec![Tlv::Name("r1".into()), Tlv::VlanVid(2)],
                value: vec![],
            },
        );
        assert_eq!(agent.handle_request(&add, now), TableResponse::Ok);
        let router = VlanKey::new("r1", 2);
        assert_eq!(
            agent.pim_hello().deadline(&router),
            Some(now + TimeoutName::QueryTimeout.default_value())
        );

        let tune = request(
            TableId::Timeout,
            TableOp::Add {
                key: vec![Tlv::Name("query_timeout".into())],
                value: vec![Tlv::IntervalMs(4000)],
            },
        );
        assert_eq!(agent.handle_request(&tune, now), TableResponse::Ok);
        let port = request(
            TableId::RxPortGroup,
            TableOp::Add {
                key: vec![Tlv::PortNo(5)],
                value: vec![Tlv::Name("r1".into())],
            },
        );
        assert_eq!(agent.handle_request(&port, now), TableResponse::Ok);

        // A matching hello reschedules with the tuned interval
        let pim = PimHelloBuilder::default().build();
        let hello = Ipv4FrameBuilder::pim(
            [0x02, 0, 0, 0, 0, 0x01],
            2,
            Ipv4Addr::new(10, 0, 0, 9),
            ALL_PIM_ROUTERS,
            &pim,
        )
        .build();
        let seen = now + Duration::from_secs(1);
        assert_eq!(agent.classify(&hello, 5, seen), Disposition::Drop);
        assert_eq!(
            agent.pim_hello().deadline(&router),
            Some(seen + Duration::from_secs(4))
        );
    }

    #[test]
    fn test_every_engine_ticks_idle_when_empty() {
        let mut agent = agent();
        for engine in EngineId::ALL {
            assert_eq!(
                agent.tick(engine, Instant::now()),
                crate::scheduler::IDLE_POLL_INTERVAL
            );
        }
    }
}
