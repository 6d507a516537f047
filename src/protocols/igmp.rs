// SPDX-License-Identifier: Apache-2.0 OR MIT
//! IGMP v1/v2 messages (RFC 2236)
//!
//! The agent only needs the fixed 8-byte message: it matches received
//! queries and reports against expectations and originates general queries
//! and v2 reports on behalf of the switch. IGMPv3 reports are recognised by
//! type and dropped without looking at their source lists.

use std::net::Ipv4Addr;
use std::time::Duration;

use super::frame::{multicast_mac, Ipv4FrameBuilder, MacAddr};
use super::{fill_checksum, PacketBuilder};

// IGMP message types
pub const IGMP_MEMBERSHIP_QUERY: u8 = 0x11;
pub const IGMP_V1_MEMBERSHIP_REPORT: u8 = 0x12;
pub const IGMP_V2_MEMBERSHIP_REPORT: u8 = 0x16;
pub const IGMP_LEAVE_GROUP: u8 = 0x17;
pub const IGMP_V3_MEMBERSHIP_REPORT: u8 = 0x22;

/// Fixed IGMP v1/v2 message length
pub const IGMP_MESSAGE_LEN: usize = 8;

/// Max response time advertised in originated general queries (RFC 2236)
pub const DEFAULT_QUERY_RESPONSE_INTERVAL: Duration = Duration::from_secs(10);

/// All systems on this subnet (224.0.0.1)
pub const ALL_HOSTS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 1);

/// Builder for IGMP Membership Query packets
#[derive(Debug)]
pub struct IgmpQueryBuilder {
    /// Max response time (in 1/10 seconds)
    pub max_resp_time: u8,
    /// Group address (0.0.0.0 for general query)
    pub group: Ipv4Addr,
}

impl IgmpQueryBuilder {
    /// General query advertising the default 10 s response interval
    pub fn general_query() -> Self {
        Self {
            max_resp_time: (DEFAULT_QUERY_RESPONSE_INTERVAL.as_millis() / 100) as u8,
            group: Ipv4Addr::UNSPECIFIED,
        }
    }

    pub fn group_specific_query(group: Ipv4Addr, max_resp_time_tenths: u8) -> Self {
        Self {
            max_resp_time: max_resp_time_tenths,
            group,
        }
    }
}

impl PacketBuilder for IgmpQueryBuilder {
    fn build(&self) -> Vec<u8> {
        message(IGMP_MEMBERSHIP_QUERY, self.max_resp_time, self.group)
    }
}

/// Builder for IGMP membership reports (v2 unless `msg_type` says otherwise)
#[derive(Debug)]
pub struct IgmpReportBuilder {
    pub msg_type: u8,
    pub group: Ipv4Addr,
}

impl IgmpReportBuilder {
    pub fn new(group: Ipv4Addr) -> Self {
        Self {
            msg_type: IGMP_V2_MEMBERSHIP_REPORT,
            group,
        }
    }

    pub fn v1(group: Ipv4Addr) -> Self {
        Self {
            msg_type: IGMP_V1_MEMBERSHIP_REPORT,
            group,
        }
    }
}

impl PacketBuilder for IgmpReportBuilder {
    fn build(&self) -> Vec<u8> {
        message(self.msg_type, 0, self.group)
    }
}

/// Builder for IGMP Leave Group packets
#[derive(Debug)]
pub struct IgmpLeaveBuilder {
    pub group: Ipv4Addr,
}

impl IgmpLeaveBuilder {
    pub fn new(group: Ipv4Addr) -> Self {
        Self { group }
    }
}

impl PacketBuilder for IgmpLeaveBuilder {
    fn build(&self) -> Vec<u8> {
        message(IGMP_LEAVE_GROUP, 0, self.group)
    }
}

fn message(msg_type: u8, max_resp_time: u8, group: Ipv4Addr) -> Vec<u8> {
    let mut packet = Vec::with_capacity(IGMP_MESSAGE_LEN);
    packet.push(msg_type);
    packet.push(max_resp_time);
    packet.extend_from_slice(&[0, 0]); // Checksum placeholder
    packet.extend_from_slice(&group.octets());
    fill_checksum(&mut packet, 2);
    packet
}

/// Addressing for one originated IGMP frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IgmpTxParams {
    pub src_mac: MacAddr,
    pub vlan_id: u16,
    pub src_ip: Ipv4Addr,
}

/// Full frame for a general query to all hosts (224.0.0.1 / 01:00:5e:00:00:01)
pub fn general_query_frame(params: &IgmpTxParams) -> Vec<u8> {
    let igmp = IgmpQueryBuilder::general_query().build();
    Ipv4FrameBuilder::igmp(
        params.src_mac,
        multicast_mac(ALL_HOSTS_GROUP),
        params.vlan_id,
        params.src_ip,
        ALL_HOSTS_GROUP,
        &igmp,
    )
    .build()
}

/// Full frame for a v2 report addressed to the group and its mapped MAC
pub fn report_frame(params: &IgmpTxParams, group: Ipv4Addr) -> Vec<u8> {
    let igmp = IgmpReportBuilder::new(group).build();
    Ipv4FrameBuilder::igmp(
        params.src_mac,
        multicast_mac(group),
        params.vlan_id,
        params.src_ip,
        group,
        &igmp,
    )
    .build()
}

/// Parsed IGMP header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgmpHeader {
    pub msg_type: u8,
    /// Max response time (in 1/10 seconds) - only meaningful for queries
    pub max_resp_time: u8,
    pub checksum: u16,
    pub group: Ipv4Addr,
}

impl IgmpHeader {
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < IGMP_MESSAGE_LEN {
            return None;
        }

        Some(Self {
            msg_type: data[0],
            max_resp_time: data[1],
            checksum: u16::from_be_bytes([data[2], data[3]]),
            group: Ipv4Addr::new(data[4], data[5], data[6], data[7]),
        })
    }

    /// Query with group 0.0.0.0
    pub fn is_general_query(&self) -> bool {
        self.msg_type == IGMP_MEMBERSHIP_QUERY && self.group == Ipv4Addr::UNSPECIFIED
    }

    pub fn is_group_specific_query(&self) -> bool {
        self.msg_type == IGMP_MEMBERSHIP_QUERY && self.group != Ipv4Addr::UNSPECIFIED
    }

    /// v1 or v2 membership report
    pub fn is_report(&self) -> bool {
        matches!(
            self.msg_type,
            IGMP_V1_MEMBERSHIP_REPORT | IGMP_V2_MEMBERSHIP_REPORT
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::checksum_valid;

    #[test]
    fn test_igmp_header_parse() {
        // General query: type=0x11, max_resp=100 (10s), checksum=0, group=0.0.0.0
        let data = [0x11, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let header = IgmpHeader::parse(&data).unwrap();

        assert_eq!(header.msg_type, IGMP_MEMBERSHIP_QUERY);
        assert_eq!(header.max_resp_time, 100);
        assert!(header.is_general_query());
        assert!(!header.is_group_specific_query());
        assert!(!header.is_report());
    }

    #[test]
    fn test_igmp_header_parse_short() {
        assert!(IgmpHeader::parse(&[0x11, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00]).is_none());
    }

    #[test]
    fn test_igmp_header_parse_group_specific() {
        let data = [0x11, 0x64, 0x00, 0x00, 239, 1, 1, 1];
        let header = IgmpHeader::parse(&data).unwrap();

        assert!(header.is_group_specific_query());
        assert!(!header.is_general_query());
        assert_eq!(header.group, "239.1.1.1".parse::<Ipv4Addr>().unwrap());
    }

    #[test]
    fn test_query_builder_general() {
        let packet = IgmpQueryBuilder::general_query().build();

        assert_eq!(packet.len(), 8);
        assert_eq!(packet[0], IGMP_MEMBERSHIP_QUERY);
        assert_eq!(packet[1], 100);
        assert_eq!(&packet[4..8], &[0, 0, 0, 0]);
        assert!(checksum_valid(&packet));
    }

    #[test]
    fn test_report_builders() {
        let v2 = IgmpReportBuilder::new("239.3.3.3".parse().unwrap()).build();
        assert_eq!(v2[0], IGMP_V2_MEMBERSHIP_REPORT);
        assert_eq!(&v2[4..8], &[239, 3, 3, 3]);
        assert!(checksum_valid(&v2));

        let v1 = IgmpReportBuilder::v1("239.3.3.3".parse().unwrap()).build();
        assert_eq!(v1[0], IGMP_V1_MEMBERSHIP_REPORT);
        assert!(IgmpHeader::parse(&v1).unwrap().is_report());
    }

    #[test]
    fn test_leave_builder() {
        let packet = IgmpLeaveBuilder::new("239.4.4.4".parse().unwrap()).build();
        assert_eq!(packet[0], IGMP_LEAVE_GROUP);
        assert!(checksum_valid(&packet));
    }

    #[test]
    fn test_general_query_frame_addressing() {
        let params = IgmpTxParams {
            src_mac: [0x02, 0, 0, 0, 0, 0x0a],
            vlan_id: 20,
            src_ip: Ipv4Addr::new(10, 1, 1, 1),
        };
        let frame = general_query_frame(&params);

        assert_eq!(&frame[0..6], &[0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]);
        assert_eq!(&frame[18 + 16..18 + 20], &[224, 0, 0, 1]);
        let igmp = IgmpHeader::parse(&frame[42..]).unwrap();
        assert!(igmp.is_general_query());
    }

    #[test]
    fn test_report_frame_addressing() {
        let params = IgmpTxParams {
            src_mac: [0x02, 0, 0, 0, 0, 0x0b],
            vlan_id: 30,
            src_ip: Ipv4Addr::new(10, 1, 1, 2),
        };
        let group = Ipv4Addr::new(225, 1, 1, 1);
        let frame = report_frame(&params, group);

        assert_eq!(&frame[0..6], &multicast_mac(group));
        assert_eq!(&frame[18 + 16..18 + 20], &group.octets());
        let igmp = IgmpHeader::parse(&frame[42..]).unwrap();
        assert_eq!(igmp.msg_type, IGMP_V2_MEMBERSHIP_REPORT);
        assert_eq!(igmp.group, group);
    }
}
