// SPDX-License-Identifier: Apache-2.0 OR MIT
//! General-query and membership-report transmission instances

use crate::error::TableResult;
use crate::keys::{GroupKey, VlanKey};
use crate::port_group::TxPortGroupTable;
use crate::protocols::igmp::{self, IgmpTxParams};
use crate::tlv::{Tlv, TlvCursor};
use crate::TableId;

use super::TransmissionKind;

/// Read the leading `tx_port_group` reference and snapshot its name
fn read_port_group(
    cursor: &mut TlvCursor<'_>,
    ports: Option<&TxPortGroupTable>,
) -> TableResult<String> {
    let referenced = cursor.reference(TxPortGroupTable::TABLE_NAME)?;
    match ports {
        Some(ports) => ports.resolve_reference(referenced),
        None => TxPortGroupTable::parse_key(referenced),
    }
}

/// General queries to 224.0.0.1
pub enum GeneralQueryTx {}

impl TransmissionKind for GeneralQueryTx {
    type Key = VlanKey;
    const TABLE: TableId = TableId::GeneralQueryTx;

    fn parse_key(key: &[Tlv], ports: Option<&TxPortGroupTable>) -> TableResult<VlanKey> {
        let mut cursor = TlvCursor::new(key);
        let name = read_port_group(&mut cursor, ports)?;
        let vlan_id = cursor.vlan_vid()?;
        cursor.finish()?;
        Ok(VlanKey::new(name, vlan_id))
    }

    fn port_group(key: &VlanKey) -> &str {
        &key.name
    }

    fn build_frame(_key: &VlanKey, params: &IgmpTxParams) -> Vec<u8> {
        igmp::general_query_frame(params)
    }
}

/// v2 membership reports for one group
pub enum ReportTx {}

impl TransmissionKind for ReportTx {
    type Key = GroupKey;
    const TABLE: TableId = TableId::ReportTx;

    fn parse_key(key: &[Tlv], ports: Option<&TxPortGroupTable>) -> TableResult<GroupKey> {
        let mut cursor = TlvCursor::new(key);
        let name = read_port_group(&mut cursor, ports)?;
        let vlan_id = cursor.vlan_vid()?;
        let group = cursor.ipv4_group()?;
        cursor.finish()?;
        Ok(GroupKey::new(name, vlan_id, group))
    }

    fn port_group(key: &GroupKey) -> &str {
        &key.name
    }

    fn build_frame(key: &GroupKey, params: &IgmpTxParams) -> Vec<u8> {
        igmp::report_frame(params, key.group)
    }
}
