// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Packet classifier
//!
//! Single entry point for snooped frames. A frame the agent fully accounts
//! for (a keepalive matching an expectation, or a message the controller
//! never needs) is dropped; everything else, including anything malformed,
//! is passed on to the controller.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::expectation::{ExpectationTable, GeneralQuery, PimHello, Report};
use crate::keys::{GroupKey, VlanKey};
use crate::logging::{Facility, Logger, Severity};
use crate::packet_parser::{parse_frame, ParseError, ParsedFrame};
use crate::port_group::RxPortGroupTable;
use crate::protocols::igmp::{IgmpHeader, IGMP_LEAVE_GROUP};
use crate::protocols::pim::{PimHeader, ALL_PIM_ROUTERS, PIM_HEADER_LEN};
use crate::protocols::{checksum_valid, IPPROTO_IGMP, IPPROTO_PIM};
use crate::log_kv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Handled locally
    Drop,
    /// Forward to the controller
    Pass,
}

/// Why a frame got its disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    NoVlan,
    NotIpv4,
    Malformed,
    IgmpBadLength,
    IgmpBadChecksum,
    GeneralQueryHit,
    GeneralQueryMiss,
    GroupSpecificQuery,
    ReportHit,
    ReportMiss,
    Leave,
    IgmpOther,
    PimBad,
    PimHelloHit,
    PimHelloMiss,
    PimOther,
    OtherProtocol,
}

impl Outcome {
    pub const ALL: [Outcome; 17] = [
        Outcome::NoVlan,
        Outcome::NotIpv4,
        Outcome::Malformed,
        Outcome::IgmpBadLength,
        Outcome::IgmpBadChecksum,
        Outcome::GeneralQueryHit,
        Outcome::GeneralQueryMiss,
        Outcome::GroupSpecificQuery,
        Outcome::ReportHit,
        Outcome::ReportMiss,
        Outcome::Leave,
        Outcome::IgmpOther,
        Outcome::PimBad,
        Outcome::PimHelloHit,
        Outcome::PimHelloMiss,
        Outcome::PimOther,
        Outcome::OtherProtocol,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Outcome::NoVlan => "no_vlan",
            Outcome::NotIpv4 => "not_ipv4",
            Outcome::Malformed => "malformed",
            Outcome::IgmpBadLength => "igmp_bad_length",
            Outcome::IgmpBadChecksum => "igmp_bad_checksum",
            Outcome::GeneralQueryHit => "general_query_hit",
            Outcome::GeneralQueryMiss => "general_query_miss",
            Outcome::GroupSpecificQuery => "group_specific_query",
            Outcome::ReportHit => "report_hit",
            Outcome::ReportMiss => "report_miss",
            Outcome::Leave => "leave",
            Outcome::IgmpOther => "igmp_other",
            Outcome::PimBad => "pim_bad",
            Outcome::PimHelloHit => "pim_hello_hit",
            Outcome::PimHelloMiss => "pim_hello_miss",
            Outcome::PimOther => "pim_other",
            Outcome::OtherProtocol => "other_protocol",
        }
    }

    pub const fn disposition(self) -> Disposition {
        match self {
            Outcome::GeneralQueryHit
            | Outcome::GroupSpecificQuery
            | Outcome::ReportHit
            | Outcome::IgmpOther
            | Outcome::PimHelloHit => Disposition::Drop,
            _ => Disposition::Pass,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassifierCounters {
    counts: [u64; Outcome::ALL.len()],
}

impl ClassifierCounters {
    pub fn get(&self, outcome: Outcome) -> u64 {
        self.counts[outcome as usize]
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    fn record(&mut self, outcome: Outcome) {
        self.counts[outcome as usize] += 1;
        ::metrics::counter!(crate::metrics::CLASSIFIER_PACKETS, "outcome" => outcome.as_str())
            .increment(1);
    }
}

/// Tables a classified frame can touch
pub struct ClassifierTargets<'a> {
    pub rx_port_groups: &'a RxPortGroupTable,
    pub general_query: &'a mut ExpectationTable<GeneralQuery>,
    pub report: &'a mut ExpectationTable<Report>,
    pub pim_hello: &'a mut ExpectationTable<PimHello>,
}

pub struct Classifier {
    counters: ClassifierCounters,
    logger: Logger,
}

impl Classifier {
    pub fn new(logger: Logger) -> Self {
        Self {
            counters: ClassifierCounters::default(),
            logger,
        }
    }

    pub fn classify(
        &mut self,
        frame: &[u8],
        in_port: u32,
        now: Instant,
        targets: ClassifierTargets<'_>,
    ) -> Disposition {
        let outcome = classify_frame(frame, in_port, now, targets);
        self.counters.record(outcome);

        if self.logger.should_log(Severity::Debug, Facility::Classifier) {
            let port = in_port.to_string();
            log_kv!(self.logger, Severity::Debug, Facility::Classifier, "packet classified",
                "port" => port.as_str(), "outcome" => outcome.as_str());
        }
        outcome.disposition()
    }

    pub fn counters(&self) -> &ClassifierCounters {
        &self.counters
    }
}

fn classify_frame(
    frame: &[u8],
    in_port: u32,
    now: Instant,
    targets: ClassifierTargets<'_>,
) -> Outcome {
    let parsed = match parse_frame(frame) {
        Ok(parsed) => parsed,
        Err(ParseError::MissingVlanTag(_)) => return Outcome::NoVlan,
        Err(ParseError::InvalidEtherType(_)) => return Outcome::NotIpv4,
        Err(_) => return Outcome::Malformed,
    };

    match parsed.ipv4.protocol {
        IPPROTO_IGMP => classify_igmp(frame, &parsed, in_port, now, targets),
        IPPROTO_PIM => classify_pim(frame, &parsed, in_port, now, targets),
        _ => Outcome::OtherProtocol,
    }
}

fn classify_igmp(
    frame: &[u8],
    parsed: &ParsedFrame,
    in_port: u32,
    now: Instant,
    targets: ClassifierTargets<'_>,
) -> Outcome {
    let payload = parsed.payload(frame);
    let Some(igmp) = IgmpHeader::parse(payload) else {
        return Outcome::IgmpBadLength;
    };
    if !checksum_valid(payload) {
        return Outcome::IgmpBadChecksum;
    }

    let vlan_id = parsed.vlan.vid;
    let name = targets.rx_port_groups.lookup(in_port);

    if igmp.is_general_query() {
        let hit = name.is_some_and(|name| {
            targets
                .general_query
                .on_match(&VlanKey::new(name, vlan_id), now)
        });
        return if hit {
            Outcome::GeneralQueryHit
        } else {
            Outcome::GeneralQueryMiss
        };
    }
    if igmp.is_report() {
        let hit = name.is_some_and(|name| {
            targets
                .report
                .on_match(&GroupKey::new(name, vlan_id, igmp.group), now)
        });
        return if hit {
            Outcome::ReportHit
        } else {
            Outcome::ReportMiss
        };
    }

    if igmp.is_group_specific_query() {
        Outcome::GroupSpecificQuery
    } else if igmp.msg_type == IGMP_LEAVE_GROUP {
        Outcome::Leave
    } else {
        Outcome::IgmpOther
    }
}

fn classify_pim(
    frame: &[u8],
    parsed: &ParsedFrame,
    in_port: u32,
    now: Instant,
    targets: ClassifierTargets<'_>,
) -> Outcome {
    let payload = parsed.payload(frame);
    if payload.len() < PIM_HEADER_LEN || !checksum_valid(payload) {
        return Outcome::PimBad;
    }
    let Some(pim) = PimHeader::parse(payload) else {
        return Outcome::PimBad;
    };
    if parsed.ipv4.dst_ip != ALL_PIM_ROUTERS {
        return Outcome::PimBad;
    }
    if !pim.is_hello() {
        return Outcome::PimOther;
    }

    let hit = targets.rx_port_groups.lookup(in_port).is_some_and(|name| {
        targets
            .pim_hello
            .on_match(&VlanKey::new(name, parsed.vlan.vid), now)
    });
    if hit {
        Outcome::PimHelloHit
    } else {
        Outcome::PimHelloMiss
    }
}
