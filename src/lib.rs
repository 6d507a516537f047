// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IGMP/PIM snooping offload agent
//!
//! Answers keepalive questions for the controller locally (is the querier
//! still querying, is the host still reporting, is the neighbor router still
//! sending hellos) and originates periodic queries and reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub mod logging;

pub mod agent;
pub mod channel;
pub mod classifier;
pub mod config;
pub mod control_socket;
pub mod error;
pub mod expectation;
pub mod keys;
pub mod metrics;
pub mod packet_parser;
pub mod port_group;
pub mod protocols;
pub mod runtime;
pub mod scheduler;
pub mod timeout;
pub mod tlv;
pub mod transmission;
pub mod validation;

pub use agent::Agent;
pub use error::{ErrorCode, TableError};
pub use tlv::{MacAddress, Tlv};

/// Controller-managed tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableId {
    Timeout,
    RxPortGroup,
    TxPortGroup,
    GeneralQueryExpectation,
    ReportExpectation,
    PimExpectation,
    GeneralQueryTx,
    ReportTx,
}

impl TableId {
    pub const ALL: [TableId; 8] = [
        TableId::Timeout,
        TableId::RxPortGroup,
        TableId::TxPortGroup,
        TableId::GeneralQueryExpectation,
        TableId::ReportExpectation,
        TableId::PimExpectation,
        TableId::GeneralQueryTx,
        TableId::ReportTx,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            TableId::Timeout => "timeout",
            TableId::RxPortGroup => "rx_port_group",
            TableId::TxPortGroup => "tx_port_group",
            TableId::GeneralQueryExpectation => "general_query_expectation",
            TableId::ReportExpectation => "report_expectation",
            TableId::PimExpectation => "pim_expectation",
            TableId::GeneralQueryTx => "general_query_tx",
            TableId::ReportTx => "report_tx",
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TableId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TableId::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown table '{}'", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TableOp {
    Add {
        key: Vec<Tlv>,
        #[serde(default)]
        value: Vec<Tlv>,
    },
    Modify {
        key: Vec<Tlv>,
        #[serde(default)]
        value: Vec<Tlv>,
    },
    Delete {
        key: Vec<Tlv>,
    },
    GetStats {
        key: Vec<Tlv>,
    },
}

impl TableOp {
    pub fn name(&self) -> &'static str {
        match self {
            TableOp::Add { .. } => "add",
            TableOp::Modify { .. } => "modify",
            TableOp::Delete { .. } => "delete",
            TableOp::GetStats { .. } => "get_stats",
        }
    }
}

/// One controller operation on one table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRequest {
    pub table: TableId,
    #[serde(flatten)]
    pub op: TableOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableResponse {
    Ok,
    Stats(Vec<Tlv>),
    Error { code: ErrorCode, message: String },
}

impl From<&TableError> for TableResponse {
    fn from(err: &TableError) -> Self {
        TableResponse::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Sent when expected traffic has not been seen within the timeout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleNotification {
    pub table: TableId,
    pub name: String,
    pub vlan_id: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Ipv4Addr>,
}

/// Asynchronous messages from the agent to the controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerMessage {
    IdleNotification(IdleNotification),
}
