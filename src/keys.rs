// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Entry keys shared by the expectation and transmission tables.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::TableResult;
use crate::tlv::TlvCursor;

/// (port-group name, VLAN)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VlanKey {
    pub name: String,
    /// Always within 0..=4095
    pub vlan_id: u16,
}

impl VlanKey {
    pub fn new(name: impl Into<String>, vlan_id: u16) -> Self {
        Self {
            name: name.into(),
            vlan_id: vlan_id & crate::protocols::frame::VLAN_VID_MASK,
        }
    }

    /// Read `[name, vlan_vid]` fields from the cursor
    pub(crate) fn read(cursor: &mut TlvCursor<'_>) -> TableResult<Self> {
        let name = cursor.name()?;
        let vlan_id = cursor.vlan_vid()?;
        Ok(Self { name, vlan_id })
    }
}

impl fmt::Display for VlanKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/vlan {}", self.name, self.vlan_id)
    }
}

/// (port-group name, VLAN, multicast group)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub name: String,
    pub vlan_id: u16,
    pub group: Ipv4Addr,
}

impl GroupKey {
    pub fn new(name: impl Into<String>, vlan_id: u16, group: Ipv4Addr) -> Self {
        Self {
            name: name.into(),
            vlan_id: vlan_id & crate::protocols::frame::VLAN_VID_MASK,
            group,
        }
    }

    /// Read `[name, vlan_vid, ipv4]` fields; the group must be multicast
    pub(crate) fn read(cursor: &mut TlvCursor<'_>) -> TableResult<Self> {
        let VlanKey { name, vlan_id } = VlanKey::read(cursor)?;
        let group = cursor.ipv4_group()?;
        Ok(Self {
            name,
            vlan_id,
            group,
        })
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/vlan {}/{}", self.name, self.vlan_id, self.group)
    }
}
