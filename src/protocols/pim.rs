// SPDX-License-Identifier: Apache-2.0 OR MIT
//! PIM v2 header (RFC 7761)
//!
//! Only enough of PIM to recognise Hello keepalives from adjacent routers.
//! Routing state is out of scope.
//!
//! | Type | Value | Description |
//! |------|-------|-------------|
//! | Hello | 0 | Neighbor discovery |
//! | Register | 1 | First-hop to RP |
//! | Register-Stop | 2 | RP to first-hop |
//! | Join/Prune | 3 | Tree maintenance |
//! | Bootstrap | 4 | BSR election |
//! | Assert | 5 | Forwarder election |

use std::net::Ipv4Addr;
use std::time::Duration;

use super::{fill_checksum, PacketBuilder};

// PIM message types
pub const PIM_HELLO: u8 = 0;
pub const PIM_JOIN_PRUNE: u8 = 3;

pub const PIM_VERSION: u8 = 2;

/// Fixed PIM header length
pub const PIM_HEADER_LEN: usize = 4;

// Hello option types
pub const PIM_HELLO_HOLDTIME: u16 = 1;

/// Neighbor liveness window advertised by default (3.5 * 30 s hello period)
pub const DEFAULT_HELLO_HOLDTIME: Duration = Duration::from_secs(105);

/// All PIM routers multicast address (224.0.0.13)
pub const ALL_PIM_ROUTERS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 13);

/// Parsed PIM header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PimHeader {
    pub version: u8,
    pub msg_type: u8,
    pub reserved: u8,
    pub checksum: u16,
}

impl PimHeader {
    /// Parse a PIM header; anything but version 2 is rejected
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < PIM_HEADER_LEN {
            return None;
        }

        let ver_type = data[0];
        let version = (ver_type >> 4) & 0x0F;
        let msg_type = ver_type & 0x0F;

        if version != PIM_VERSION {
            return None;
        }

        Some(Self {
            version,
            msg_type,
            reserved: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
        })
    }

    pub fn is_hello(&self) -> bool {
        self.msg_type == PIM_HELLO
    }
}

/// Builder for PIM Hello packets carrying only a Holdtime option
#[derive(Debug)]
pub struct PimHelloBuilder {
    pub holdtime: u16,
}

impl PimHelloBuilder {
    pub fn new(holdtime_secs: u16) -> Self {
        Self {
            holdtime: holdtime_secs,
        }
    }
}

impl Default for PimHelloBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HELLO_HOLDTIME.as_secs() as u16)
    }
}

impl PacketBuilder for PimHelloBuilder {
    fn build(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(10);

        packet.push((PIM_VERSION << 4) | PIM_HELLO);
        packet.push(0); // Reserved
        packet.extend_from_slice(&[0, 0]); // Checksum placeholder

        packet.extend_from_slice(&PIM_HELLO_HOLDTIME.to_be_bytes());
        packet.extend_from_slice(&2u16.to_be_bytes()); // Length
        packet.extend_from_slice(&self.holdtime.to_be_bytes());

        fill_checksum(&mut packet, 2);
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::checksum_valid;

    #[test]
    fn test_pim_header_parse_hello() {
        let data = [0x20, 0x00, 0x00, 0x00];
        let header = PimHeader::parse(&data).unwrap();
        assert_eq!(header.version, 2);
        assert!(header.is_hello());
    }

    #[test]
    fn test_pim_header_rejects_other_versions() {
        assert!(PimHeader::parse(&[0x10, 0x00, 0x00, 0x00]).is_none());
        assert!(PimHeader::parse(&[0x20, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_pim_join_prune_not_hello() {
        let header = PimHeader::parse(&[0x23, 0x00, 0x00, 0x00]).unwrap();
        assert!(!header.is_hello());
        assert_eq!(header.msg_type, PIM_JOIN_PRUNE);
    }

    #[test]
    fn test_hello_builder() {
        let packet = PimHelloBuilder::default().build();
        assert_eq!(packet.len(), 10);
        assert_eq!(packet[0], 0x20);
        assert_eq!(u16::from_be_bytes([packet[8], packet[9]]), 105);
        assert!(checksum_valid(&packet));
    }
}
