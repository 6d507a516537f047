// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Frame parser for snooped control traffic
//!
//! Parses Ethernet + 802.1Q + IPv4 and locates the IP payload. Protocol
//! headers above IPv4 (IGMP, PIM) are parsed by `protocols`.
//!
//! The payload length comes from the IPv4 total length, so Ethernet padding
//! on short frames is never treated as payload.

use std::net::Ipv4Addr;
use thiserror::Error;

use crate::protocols::frame::{
    ETHERNET_HEADER_LEN, ETHERTYPE_IPV4, ETHERTYPE_VLAN, VLAN_TAG_LEN, VLAN_VID_MASK,
};

/// Errors that can occur during frame parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort { expected: usize, actual: usize },

    #[error("Frame is not 802.1Q tagged: EtherType {0:#06x}")]
    MissingVlanTag(u16),

    #[error("Invalid EtherType: expected 0x0800 (IPv4), got {0:#06x}")]
    InvalidEtherType(u16),

    #[error("Invalid IP version: expected 4, got {0}")]
    InvalidIpVersion(u8),

    #[error("IP header length too small: {0} words")]
    IpHeaderTooSmall(u8),

    #[error("IP total length {total_length} shorter than header length {header_len}")]
    TotalLengthTooSmall { total_length: u16, header_len: usize },
}

/// Parsed Ethernet header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthernetHeader {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    pub ether_type: u16,
}

/// Parsed 802.1Q tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VlanTag {
    pub pcp: u8,
    /// 12-bit VLAN id, already masked
    pub vid: u16,
    /// EtherType of the encapsulated packet
    pub inner_ether_type: u16,
}

/// Parsed IPv4 header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ipv4Header {
    pub version: u8,
    pub ihl: u8, // Internet Header Length (in 32-bit words)
    pub total_length: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
}

impl Ipv4Header {
    pub fn header_len(&self) -> usize {
        (self.ihl as usize) * 4
    }
}

/// Headers of one VLAN-tagged IPv4 frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFrame {
    pub ethernet: EthernetHeader,
    pub vlan: VlanTag,
    pub ipv4: Ipv4Header,
    pub payload_offset: usize,
    pub payload_len: usize,
}

impl ParsedFrame {
    /// The IP payload (the IGMP or PIM message)
    pub fn payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[self.payload_offset..self.payload_offset + self.payload_len]
    }
}

/// Parse an 802.1Q-tagged Ethernet frame carrying IPv4
pub fn parse_frame(data: &[u8]) -> Result<ParsedFrame, ParseError> {
    let ethernet = parse_ethernet(data)?;
    if ethernet.ether_type != ETHERTYPE_VLAN {
        return Err(ParseError::MissingVlanTag(ethernet.ether_type));
    }

    let vlan = parse_vlan_tag(&data[ETHERNET_HEADER_LEN..])?;
    if vlan.inner_ether_type != ETHERTYPE_IPV4 {
        return Err(ParseError::InvalidEtherType(vlan.inner_ether_type));
    }

    let ip_offset = ETHERNET_HEADER_LEN + VLAN_TAG_LEN;
    let ipv4 = parse_ipv4(&data[ip_offset..])?;

    let header_len = ipv4.header_len();
    if (ipv4.total_length as usize) < header_len {
        return Err(ParseError::TotalLengthTooSmall {
            total_length: ipv4.total_length,
            header_len,
        });
    }

    let payload_offset = ip_offset + header_len;
    let payload_len = ipv4.total_length as usize - header_len;

    // The buffer must hold everything the IP header claims
    let expected_total = payload_offset + payload_len;
    if data.len() < expected_total {
        return Err(ParseError::PacketTooShort {
            expected: expected_total,
            actual: data.len(),
        });
    }

    Ok(ParsedFrame {
        ethernet,
        vlan,
        ipv4,
        payload_offset,
        payload_len,
    })
}

fn parse_ethernet(data: &[u8]) -> Result<EthernetHeader, ParseError> {
    if data.len() < ETHERNET_HEADER_LEN {
        return Err(ParseError::PacketTooShort {
            expected: ETHERNET_HEADER_LEN,
            actual: data.len(),
        });
    }

    let mut dst_mac = [0u8; 6];
    let mut src_mac = [0u8; 6];
    dst_mac.copy_from_slice(&data[0..6]);
    src_mac.copy_from_slice(&data[6..12]);

    Ok(EthernetHeader {
        dst_mac,
        src_mac,
        ether_type: u16::from_be_bytes([data[12], data[13]]),
    })
}

fn parse_vlan_tag(data: &[u8]) -> Result<VlanTag, ParseError> {
    if data.len() < VLAN_TAG_LEN {
        return Err(ParseError::PacketTooShort {
            expected: ETHERNET_HEADER_LEN + VLAN_TAG_LEN,
            actual: ETHERNET_HEADER_LEN + data.len(),
        });
    }

    let tci = u16::from_be_bytes([data[0], data[1]]);
    Ok(VlanTag {
        pcp: (tci >> 13) as u8,
        vid: tci & VLAN_VID_MASK,
        inner_ether_type: u16::from_be_bytes([data[2], data[3]]),
    })
}

/// Parse IPv4 header (minimum 20 bytes)
fn parse_ipv4(data: &[u8]) -> Result<Ipv4Header, ParseError> {
    if data.len() < 20 {
        return Err(ParseError::PacketTooShort {
            expected: 20,
            actual: data.len(),
        });
    }

    let version = (data[0] >> 4) & 0x0F;
    if version != 4 {
        return Err(ParseError::InvalidIpVersion(version));
    }

    let ihl = data[0] & 0x0F;
    if ihl < 5 {
        return Err(ParseError::IpHeaderTooSmall(ihl));
    }

    let header_len = (ihl as usize) * 4;
    if data.len() < header_len {
        return Err(ParseError::PacketTooShort {
            expected: header_len,
            actual: data.len(),
        });
    }

    Ok(Ipv4Header {
        version,
        ihl,
        total_length: u16::from_be_bytes([data[2], data[3]]),
        ttl: data[8],
        protocol: data[9],
        checksum: u16::from_be_bytes([data[10], data[11]]),
        src_ip: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
        dst_ip: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal VLAN-tagged IPv4 frame with an 8-byte IGMP payload
    fn create_test_frame() -> Vec<u8> {
        let mut frame = Vec::new();

        // Ethernet header
        frame.extend_from_slice(&[0x01, 0x00, 0x5e, 0x00, 0x00, 0x01]); // Dst MAC
        frame.extend_from_slice(&[0x00, 0x11, 0x22, 0x33, 0x44, 0x55]); // Src MAC
        frame.extend_from_slice(&[0x81, 0x00]); // EtherType: 802.1Q

        // 802.1Q tag: PCP 6, VID 10
        frame.extend_from_slice(&[0xc0, 0x0a]);
        frame.extend_from_slice(&[0x08, 0x00]); // Inner EtherType: IPv4

        // IPv4 header (20 bytes, no options)
        frame.push(0x45);
        frame.push(0x00);
        frame.extend_from_slice(&[0x00, 0x1c]); // Total length: 28
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.extend_from_slice(&[0x00, 0x00]);
        frame.push(1); // TTL
        frame.push(2); // Protocol: IGMP
        frame.extend_from_slice(&[0x00, 0x00]); // Checksum (not checked here)
        frame.extend_from_slice(&[10, 0, 0, 1]);
        frame.extend_from_slice(&[224, 0, 0, 1]);

        // IGMP general query
        frame.extend_from_slice(&[0x11, 0x64, 0xee, 0x9b, 0, 0, 0, 0]);
        frame
    }

    #[test]
    fn test_parse_valid_frame() {
        let frame = create_test_frame();
        let parsed = parse_frame(&frame).unwrap();

        assert_eq!(parsed.vlan.vid, 10);
        assert_eq!(parsed.vlan.pcp, 6);
        assert_eq!(parsed.ipv4.protocol, 2);
        assert_eq!(parsed.ipv4.dst_ip, Ipv4Addr::new(224, 0, 0, 1));
        assert_eq!(parsed.payload_offset, 38);
        assert_eq!(parsed.payload_len, 8);
        assert_eq!(parsed.payload(&frame)[0], 0x11);
    }

    #[test]
    fn test_padding_not_counted_as_payload() {
        let mut frame = create_test_frame();
        frame.extend_from_slice(&[0u8; 18]); // pad to 64 bytes
        let parsed = parse_frame(&frame).unwrap();
        assert_eq!(parsed.payload_len, 8);
    }

    #[test]
    fn test_untagged_frame() {
        let mut frame = create_test_frame();
        frame[12] = 0x08;
        frame[13] = 0x00;
        assert_eq!(
            parse_frame(&frame),
            Err(ParseError::MissingVlanTag(0x0800))
        );
    }

    #[test]
    fn test_non_ipv4_inner_ethertype() {
        let mut frame = create_test_frame();
        frame[16] = 0x86;
        frame[17] = 0xdd;
        assert_eq!(
            parse_frame(&frame),
            Err(ParseError::InvalidEtherType(0x86dd))
        );
    }

    #[test]
    fn test_invalid_ip_version() {
        let mut frame = create_test_frame();
        frame[18] = 0x65;
        assert_eq!(parse_frame(&frame), Err(ParseError::InvalidIpVersion(6)));
    }

    #[test]
    fn test_ip_header_too_small() {
        let mut frame = create_test_frame();
        frame[18] = 0x44;
        assert_eq!(parse_frame(&frame), Err(ParseError::IpHeaderTooSmall(4)));
    }

    #[test]
    fn test_truncated_payload() {
        let frame = create_test_frame();
        let result = parse_frame(&frame[..frame.len() - 3]);
        assert!(matches!(
            result,
            Err(ParseError::PacketTooShort {
                expected: 46,
                actual: 43
            })
        ));
    }

    #[test]
    fn test_total_length_smaller_than_header() {
        let mut frame = create_test_frame();
        frame[20] = 0x00;
        frame[21] = 0x10;
        assert!(matches!(
            parse_frame(&frame),
            Err(ParseError::TotalLengthTooSmall { .. })
        ));
    }

    #[test]
    fn test_short_frames() {
        assert!(parse_frame(&[]).is_err());
        assert!(parse_frame(&create_test_frame()[..16]).is_err());
    }
}
