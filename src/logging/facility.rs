// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging facilities (component identifiers)

use serde::{Deserialize, Serialize};

/// Logging facility - identifies which agent component generated the message
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facility {
    /// Agent wiring, table dispatch
    Agent = 0,
    /// Timeout configuration table
    Timeout = 1,
    /// Receive/transmit port-group directories
    PortGroup = 2,
    /// Keepalive-expectation engines
    Expectation = 3,
    /// Periodic-transmission engines
    Transmission = 4,
    /// Inbound packet classification
    Classifier = 5,
    /// Southbound control channel (notifications, requests)
    ControlChannel = 6,
    /// Event loop and socket shim
    Runtime = 7,

    /// Test harness and fixtures
    Test = 12,

    /// Fallback for uncategorized messages
    Unknown = 255,
}

impl Facility {
    /// Every facility that gets a logger in the registry
    pub const ALL: [Facility; 9] = [
        Facility::Agent,
        Facility::Timeout,
        Facility::PortGroup,
        Facility::Expectation,
        Facility::Transmission,
        Facility::Classifier,
        Facility::ControlChannel,
        Facility::Runtime,
        Facility::Test,
    ];

    #[inline]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Facility::Agent => "Agent",
            Facility::Timeout => "Timeout",
            Facility::PortGroup => "PortGroup",
            Facility::Expectation => "Expectation",
            Facility::Transmission => "Transmission",
            Facility::Classifier => "Classifier",
            Facility::ControlChannel => "ControlChannel",
            Facility::Runtime => "Runtime",
            Facility::Test => "Test",
            Facility::Unknown => "Unknown",
        }
    }

    /// Create from u8 value (returns Unknown if invalid)
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Facility::Agent,
            1 => Facility::Timeout,
            2 => Facility::PortGroup,
            3 => Facility::Expectation,
            4 => Facility::Transmission,
            5 => Facility::Classifier,
            6 => Facility::ControlChannel,
            7 => Facility::Runtime,
            12 => Facility::Test,
            _ => Facility::Unknown,
        }
    }

    /// Per-packet facilities; these log at Debug only
    pub const fn is_high_frequency(self) -> bool {
        matches!(self, Facility::Classifier | Facility::Transmission)
    }

    /// Number of entries retained in this facility's log buffer
    pub const fn buffer_size(self) -> usize {
        match self {
            Facility::Classifier => 4096,
            Facility::Expectation | Facility::Transmission => 2048,
            Facility::Agent | Facility::Runtime => 1024,
            _ => 512,
        }
    }
}

impl std::fmt::Display for Facility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Facility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Facility::ALL
            .iter()
            .copied()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown log facility '{}'", s))
    }
}
