// SPDX-License-Identifier: Apache-2.0 OR MIT
//! The three expectation instances

use crate::error::TableResult;
use crate::keys::{GroupKey, VlanKey};
use crate::tlv::{Tlv, TlvCursor};
use crate::{IdleNotification, TableId};

use super::ExpectationKind;

fn read_vlan_key(key: &[Tlv]) -> TableResult<VlanKey> {
    let mut cursor = TlvCursor::new(key);
    let key = VlanKey::read(&mut cursor)?;
    cursor.finish()?;
    Ok(key)
}

fn vlan_notification(table: TableId, key: &VlanKey) -> IdleNotification {
    IdleNotification {
        table,
        name: key.name.clone(),
        vlan_id: key.vlan_id,
        group: None,
    }
}

/// Upstream querier sending general queries
pub enum GeneralQuery {}

impl ExpectationKind for GeneralQuery {
    type Key = VlanKey;
    const TABLE: TableId = TableId::GeneralQueryExpectation;
    const STATS_INCLUDE_TX: bool = true;

    fn parse_key(key: &[Tlv]) -> TableResult<VlanKey> {
        read_vlan_key(key)
    }

    fn notification(key: &VlanKey) -> IdleNotification {
        vlan_notification(Self::TABLE, key)
    }
}

/// Host reporting membership of one group
pub enum Report {}

impl ExpectationKind for Report {
    type Key = GroupKey;
    const TABLE: TableId = TableId::ReportExpectation;
    const STATS_INCLUDE_TX: bool = false;

    fn parse_key(key: &[Tlv]) -> TableResult<GroupKey> {
        let mut cursor = TlvCursor::new(key);
        let key = GroupKey::read(&mut cursor)?;
        cursor.finish()?;
        Ok(key)
    }

    fn notification(key: &GroupKey) -> IdleNotification {
        IdleNotification {
            table: Self::TABLE,
            name: key.name.clone(),
            vlan_id: key.vlan_id,
            group: Some(key.group),
        }
    }
}

/// Neighbor PIM router sending hellos
pub enum PimHello {}

impl ExpectationKind for PimHello {
    type Key = VlanKey;
    const TABLE: TableId = TableId::PimExpectation;
    const STATS_INCLUDE_TX: bool = true;

    fn parse_key(key: &[Tlv]) -> TableResult<VlanKey> {
        read_vlan_key(key)
    }

    fn notification(key: &VlanKey) -> IdleNotification {
        vlan_notification(Self::TABLE, key)
    }
}
