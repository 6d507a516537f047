// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Errors returned by table operations.

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Error class reported back to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed or out-of-range key/value
    Param,
    /// Add of a key that is already present
    Exists,
    /// Modify/delete/get-stats of an absent key
    NotFound,
    /// Operation not supported by the table
    NotSupported,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("missing {0} TLV")]
    MissingTlv(&'static str),

    #[error("expected {expected} TLV, found {found}")]
    WrongTlv {
        expected: &'static str,
        found: &'static str,
    },

    #[error("unexpected {0} TLV after the last expected field")]
    TrailingTlv(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },

    #[error("{0} is not a multicast group address")]
    NotMulticast(Ipv4Addr),

    #[error("source address {0} must not be multicast")]
    MulticastSource(Ipv4Addr),

    #[error("unknown timeout name '{0}'")]
    UnknownTimeout(String),

    #[error("references into table '{0}' are not supported")]
    BadReferenceTable(String),

    #[error("tx port group '{0}' does not exist")]
    UnresolvedReference(String),

    #[error("this table has no value fields")]
    UnexpectedValue,

    #[error("entry already exists")]
    Exists,

    #[error("entry not found")]
    NotFound,

    #[error("get_stats is not supported on table '{0}'")]
    StatsNotSupported(&'static str),
}

impl TableError {
    pub fn code(&self) -> ErrorCode {
        match self {
            TableError::Exists => ErrorCode::Exists,
            TableError::NotFound => ErrorCode::NotFound,
            TableError::StatsNotSupported(_) => ErrorCode::NotSupported,
            _ => ErrorCode::Param,
        }
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        TableError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

pub type TableResult<T> = Result<T, TableError>;
