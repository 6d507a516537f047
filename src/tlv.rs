// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Typed key/value fields of table requests
//!
//! Keys and values arrive as ordered `Tlv` lists. Each table reads them
//! positionally through a `TlvCursor`; a field of the wrong type, a missing
//! field or a left-over field rejects the whole request before any state is
//! touched.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{TableError, TableResult};
use crate::protocols::frame::{MacAddr, VLAN_VID_MASK};
use crate::validation;

/// Ethernet address, written as `aa:bb:cc:dd:ee:ff` on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub MacAddr);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl FromStr for MacAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut parts = s.split(':');
        for octet in octets.iter_mut() {
            let part = parts
                .next()
                .ok_or_else(|| format!("MAC address '{}' has fewer than 6 octets", s))?;
            if part.len() != 2 {
                return Err(format!("invalid octet '{}' in MAC address '{}'", part, s));
            }
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| format!("invalid octet '{}' in MAC address '{}'", part, s))?;
        }
        if parts.next().is_some() {
            return Err(format!("MAC address '{}' has more than 6 octets", s));
        }
        Ok(MacAddress(octets))
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tlv {
    Name(String),
    /// Raw 16-bit value; only the low 12 bits are kept
    VlanVid(u16),
    Ipv4(Ipv4Addr),
    Ipv4Src(Ipv4Addr),
    EthSrc(MacAddress),
    PortNo(u32),
    IntervalMs(u32),
    /// Row of another table, identified by that table's key
    Reference { table: String, key: Vec<Tlv> },
    /// Milliseconds since the entry was last hit
    IdleTime(u64),
    RxPackets(u64),
    TxPackets(u64),
}

impl Tlv {
    pub fn kind(&self) -> &'static str {
        match self {
            Tlv::Name(_) => "name",
            Tlv::VlanVid(_) => "vlan_vid",
            Tlv::Ipv4(_) => "ipv4",
            Tlv::Ipv4Src(_) => "ipv4_src",
            Tlv::EthSrc(_) => "eth_src",
            Tlv::PortNo(_) => "port_no",
            Tlv::IntervalMs(_) => "interval_ms",
            Tlv::Reference { .. } => "reference",
            Tlv::IdleTime(_) => "idle_time",
            Tlv::RxPackets(_) => "rx_packets",
            Tlv::TxPackets(_) => "tx_packets",
        }
    }
}

/// Positional reader over a TLV list
#[derive(Debug)]
pub struct TlvCursor<'a> {
    tlvs: &'a [Tlv],
    pos: usize,
}

impl<'a> TlvCursor<'a> {
    pub fn new(tlvs: &'a [Tlv]) -> Self {
        Self { tlvs, pos: 0 }
    }

    fn next(&mut self, expected: &'static str) -> TableResult<&'a Tlv> {
        let tlv = self
            .tlvs
            .get(self.pos)
            .ok_or(TableError::MissingTlv(expected))?;
        self.pos += 1;
        Ok(tlv)
    }

    fn wrong(expected: &'static str, found: &Tlv) -> TableError {
        TableError::WrongTlv {
            expected,
            found: found.kind(),
        }
    }

    /// Port-group name, at most 63 bytes
    pub fn name(&mut self) -> TableResult<String> {
        match self.next("name")? {
            Tlv::Name(name) => {
                validation::validate_group_name(name)
                    .map_err(|reason| TableError::invalid("name", reason))?;
                Ok(name.clone())
            }
            other => Err(Self::wrong("name", other)),
        }
    }

    /// VLAN id, masked to 12 bits
    pub fn vlan_vid(&mut self) -> TableResult<u16> {
        match self.next("vlan_vid")? {
            Tlv::VlanVid(vid) => Ok(vid & VLAN_VID_MASK),
            other => Err(Self::wrong("vlan_vid", other)),
        }
    }

    /// Multicast group address
    pub fn ipv4_group(&mut self) -> TableResult<Ipv4Addr> {
        match self.next("ipv4")? {
            Tlv::Ipv4(addr) if addr.is_multicast() => Ok(*addr),
            Tlv::Ipv4(addr) => Err(TableError::NotMulticast(*addr)),
            other => Err(Self::wrong("ipv4", other)),
        }
    }

    /// Source address for originated packets; multicast is rejected
    pub fn ipv4_src(&mut self) -> TableResult<Ipv4Addr> {
        match self.next("ipv4_src")? {
            Tlv::Ipv4Src(addr) if addr.is_multicast() => Err(TableError::MulticastSource(*addr)),
            Tlv::Ipv4Src(addr) => Ok(*addr),
            other => Err(Self::wrong("ipv4_src", other)),
        }
    }

    pub fn eth_src(&mut self) -> TableResult<MacAddress> {
        match self.next("eth_src")? {
            Tlv::EthSrc(mac) => Ok(*mac),
            other => Err(Self::wrong("eth_src", other)),
        }
    }

    /// Port number below `max_ports`
    pub fn port_no(&mut self, max_ports: u32) -> TableResult<u32> {
        match self.next("port_no")? {
            Tlv::PortNo(port) => {
                validation::validate_port_no(*port, max_ports)
                    .map_err(|reason| TableError::invalid("port_no", reason))?;
                Ok(*port)
            }
            other => Err(Self::wrong("port_no", other)),
        }
    }

    pub fn interval_ms(&mut self) -> TableResult<u32> {
        match self.next("interval_ms")? {
            Tlv::IntervalMs(ms) => Ok(*ms),
            other => Err(Self::wrong("interval_ms", other)),
        }
    }

    /// Reference to a row of `table`; returns the referenced key
    pub fn reference(&mut self, table: &str) -> TableResult<&'a [Tlv]> {
        match self.next("reference")? {
            Tlv::Reference { table: t, key } if t == table => Ok(key),
            Tlv::Reference { table: t, .. } => Err(TableError::BadReferenceTable(t.clone())),
            other => Err(Self::wrong("reference", other)),
        }
    }

    /// Fail if anything is left unread
    pub fn finish(self) -> TableResult<()> {
        match self.tlvs.get(self.pos) {
            None => Ok(()),
            Some(extra) => Err(TableError::TrailingTlv(extra.kind())),
        }
    }
}

/// Tables without value fields accept only an empty value list
pub fn expect_empty(value: &[Tlv]) -> TableResult<()> {
    if value.is_empty() {
        Ok(())
    } else {
        Err(TableError::UnexpectedValue)
    }
}
