// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Ethernet + 802.1Q + IPv4 encapsulation for originated control packets.

use std::net::Ipv4Addr;

use super::{fill_checksum, PacketBuilder};

pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_IPV4: u16 = 0x0800;

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const VLAN_TAG_LEN: usize = 4;

/// Mask applied to every VLAN id before it is stored or put on the wire
pub const VLAN_VID_MASK: u16 = 0x0fff;

/// IPv4 Router Alert option (RFC 2113), required on IGMP messages
const ROUTER_ALERT_OPTION: [u8; 4] = [0x94, 0x04, 0x00, 0x00];

/// Type of service used for IGMP (internetwork control)
const TOS_INTERNETWORK_CONTROL: u8 = 0xc0;

pub type MacAddr = [u8; 6];

/// Ethernet multicast MAC for an IPv4 group: 01:00:5e + low 23 bits of the group
pub fn multicast_mac(group: Ipv4Addr) -> MacAddr {
    let o = group.octets();
    [0x01, 0x00, 0x5e, o[1] & 0x7f, o[2], o[3]]
}

/// Builder for a VLAN-tagged IPv4 frame carrying `payload`
#[derive(Debug, Clone)]
pub struct Ipv4FrameBuilder<'a> {
    pub dst_mac: MacAddr,
    pub src_mac: MacAddr,
    pub vlan_id: u16,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub protocol: u8,
    pub ttl: u8,
    pub router_alert: bool,
    pub payload: &'a [u8],
}

impl<'a> Ipv4FrameBuilder<'a> {
    /// IGMP encapsulation: TTL 1, Router Alert, internetwork-control TOS
    pub fn igmp(
        src_mac: MacAddr,
        dst_mac: MacAddr,
        vlan_id: u16,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        payload: &'a [u8],
    ) -> Self {
        Self {
            dst_mac,
            src_mac,
            vlan_id,
            src_ip,
            dst_ip,
            protocol: super::IPPROTO_IGMP,
            ttl: 1,
            router_alert: true,
            payload,
        }
    }

    /// PIM encapsulation: TTL 1, no options
    pub fn pim(
        src_mac: MacAddr,
        vlan_id: u16,
        src_ip: Ipv4Addr,
        dst_ip: Ipv4Addr,
        payload: &'a [u8],
    ) -> Self {
        Self {
            dst_mac: multicast_mac(dst_ip),
            src_mac,
            vlan_id,
            src_ip,
            dst_ip,
            protocol: super::IPPROTO_PIM,
            ttl: 1,
            router_alert: false,
            payload,
        }
    }

    fn ip_header(&self) -> Vec<u8> {
        let options: &[u8] = if self.router_alert {
            &ROUTER_ALERT_OPTION
        } else {
            &[]
        };
        let header_len = 20 + options.len();
        let total_len = (header_len + self.payload.len()) as u16;
        let tos = if self.protocol == super::IPPROTO_IGMP {
            TOS_INTERNETWORK_CONTROL
        } else {
            0
        };

        let mut header = Vec::with_capacity(header_len);
        header.push(0x40 | (header_len / 4) as u8); // Version 4, IHL
        header.push(tos);
        header.extend_from_slice(&total_len.to_be_bytes());
        header.extend_from_slice(&[0, 0]); // Identification
        header.extend_from_slice(&[0, 0]); // Flags, fragment offset
        header.push(self.ttl);
        header.push(self.protocol);
        header.extend_from_slice(&[0, 0]); // Checksum placeholder
        header.extend_from_slice(&self.src_ip.octets());
        header.extend_from_slice(&self.dst_ip.octets());
        header.extend_from_slice(options);

        fill_checksum(&mut header, 10);
        header
    }
}

impl PacketBuilder for Ipv4FrameBuilder<'_> {
    fn build(&self) -> Vec<u8> {
        let ip_header = self.ip_header();
        let mut frame = Vec::with_capacity(
            ETHERNET_HEADER_LEN + VLAN_TAG_LEN + ip_header.len() + self.payload.len(),
        );

        frame.extend_from_slice(&self.dst_mac);
        frame.extend_from_slice(&self.src_mac);
        frame.extend_from_slice(&ETHERTYPE_VLAN.to_be_bytes());
        // PCP 0, DEI 0
        frame.extend_from_slice(&(self.vlan_id & VLAN_VID_MASK).to_be_bytes());
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());
        frame.extend_from_slice(&ip_header);
        frame.extend_from_slice(self.payload);
        frame
    }
}
