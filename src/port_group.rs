// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Port-group directories
//!
//! `rx_port_group` maps an ingress port to the group name the classifier
//! uses for expectation lookups. `tx_port_group` maps a group name to the
//! egress port transmission entries send on.

use std::collections::HashMap;

use crate::error::{TableError, TableResult};
use crate::logging::{Facility, Logger, Severity};
use crate::log_kv;
use crate::tlv::{Tlv, TlvCursor};

/// The `rx_port_group` table: key [port_no], value [name]
pub struct RxPortGroupTable {
    entries: HashMap<u32, String>,
    max_ports: u32,
    logger: Logger,
}

impl RxPortGroupTable {
    pub fn new(max_ports: u32, logger: Logger) -> Self {
        Self {
            entries: HashMap::new(),
            max_ports,
            logger,
        }
    }

    fn parse_key(&self, key: &[Tlv]) -> TableResult<u32> {
        let mut cursor = TlvCursor::new(key);
        let port = cursor.port_no(self.max_ports)?;
        cursor.finish()?;
        Ok(port)
    }

    fn parse_value(value: &[Tlv]) -> TableResult<String> {
        let mut cursor = TlvCursor::new(value);
        let name = cursor.name()?;
        cursor.finish()?;
        Ok(name)
    }

    pub fn add(&mut self, key: &[Tlv], value: &[Tlv]) -> TableResult<()> {
        let port = self.parse_key(key)?;
        let name = Self::parse_value(value)?;
        if self.entries.contains_key(&port) {
            return Err(TableError::Exists);
        }
        self.log_change("rx port group added", port, &name);
        self.entries.insert(port, name);
        Ok(())
    }

    pub fn modify(&mut self, key: &[Tlv], value: &[Tlv]) -> TableResult<()> {
        let port = self.parse_key(key)?;
        let name = Self::parse_value(value)?;
        if !self.entries.contains_key(&port) {
            return Err(TableError::NotFound);
        }
        self.log_change("rx port group modified", port, &name);
        self.entries.insert(port, name);
        Ok(())
    }

    pub fn delete(&mut self, key: &[Tlv]) -> TableResult<()> {
        let port = self.parse_key(key)?;
        let name = self.entries.remove(&port).ok_or(TableError::NotFound)?;
        self.log_change("rx port group deleted", port, &name);
        Ok(())
    }

    /// Group name configured for an ingress port
    pub fn lookup(&self, port: u32) -> Option<&str> {
        self.entries.get(&port).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn log_change(&self, msg: &str, port: u32, name: &str) {
        let port = port.to_string();
        log_kv!(self.logger, Severity::Info, Facility::PortGroup, msg,
            "port" => port.as_str(), "name" => name);
    }
}

/// The `tx_port_group` table: key [name], value [port_no]
pub struct TxPortGroupTable {
    entries: HashMap<String, u32>,
    max_ports: u32,
    logger: Logger,
}

impl TxPortGroupTable {
    pub const TABLE_NAME: &'static str = "tx_port_group";

    pub fn new(max_ports: u32, logger: Logger) -> Self {
        Self {
            entries: HashMap::new(),
            max_ports,
            logger,
        }
    }

    /// Parse a `[name]` key; also used for references into this table
    pub fn parse_key(key: &[Tlv]) -> TableResult<String> {
        let mut cursor = TlvCursor::new(key);
        let name = cursor.name()?;
        cursor.finish()?;
        Ok(name)
    }

    fn parse_value(&self, value: &[Tlv]) -> TableResult<u32> {
        let mut cursor = TlvCursor::new(value);
        let port = cursor.port_no(self.max_ports)?;
        cursor.finish()?;
        Ok(port)
    }

    pub fn add(&mut self, key: &[Tlv], value: &[Tlv]) -> TableResult<()> {
        let name = Self::parse_key(key)?;
        let port = self.parse_value(value)?;
        if self.entries.contains_key(&name) {
            return Err(TableError::Exists);
        }
        self.log_change("tx port group added", &name, port);
        self.entries.insert(name, port);
        Ok(())
    }

    pub fn modify(&mut self, key: &[Tlv], value: &[Tlv]) -> TableResult<()> {
        let name = Self::parse_key(key)?;
        let port = self.parse_value(value)?;
        match self.entries.get_mut(&name) {
            Some(entry) => *entry = port,
            None => return Err(TableError::NotFound),
        }
        self.log_change("tx port group modified", &name, port);
        Ok(())
    }

    pub fn delete(&mut self, key: &[Tlv]) -> TableResult<()> {
        let name = Self::parse_key(key)?;
        let port = self.entries.remove(&name).ok_or(TableError::NotFound)?;
        self.log_change("tx port group deleted", &name, port);
        Ok(())
    }

    /// Current egress port of a group
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.entries.get(name).copied()
    }

    /// Resolve a reference `{table: "tx_port_group", key: [name]}` to the
    /// referenced row's name. The row must exist.
    pub fn resolve_reference(&self, key: &[Tlv]) -> TableResult<String> {
        let name = Self::parse_key(key)?;
        if !self.entries.contains_key(&name) {
            return Err(TableError::UnresolvedReference(name));
        }
        Ok(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn log_change(&self, msg: &str, name: &str, port: u32) {
        let port = port.to_string();
        log_kv!(self.logger, Severity::Info, Facility::PortGroup, msg,
            "name" => name, "port" => port.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_PORTS: u32 = 64;

    #[test]
    fn test_rx_port_group_crud() {
        let mut table = RxPortGroupTable::new(MAX_PORTS, Logger::disabled());
        table
            .add(&[Tlv::PortNo(3)], &[Tlv::Name("g1".into())])
            .unwrap();
        assert_eq!(table.lookup(3), Some("g1"));
        assert_eq!(table.lookup(4), None);

        assert_eq!(
            table.add(&[Tlv::PortNo(3)], &[Tlv::Name("g9".into())]),
            Err(TableError::Exists)
        );

        table
            .modify(&[Tlv::PortNo(3)], &[Tlv::Name("g2".into())])
            .unwrap();
        assert_eq!(table.lookup(3), Some("g2"));

        table.delete(&[Tlv::PortNo(3)]).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.delete(&[Tlv::PortNo(3)]), Err(TableError::NotFound));
    }

    #[test]
    fn test_rx_port_out_of_range() {
        let mut table = RxPortGroupTable::new(MAX_PORTS, Logger::disabled());
        assert!(table
            .add(&[Tlv::PortNo(MAX_PORTS)], &[Tlv::Name("g1".into())])
            .is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_tx_port_group_crud() {
        let mut table = TxPortGroupTable::new(MAX_PORTS, Logger::disabled());
        table
            .add(&[Tlv::Name("g2".into())], &[Tlv::PortNo(8)])
            .unwrap();
        assert_eq!(table.lookup("g2"), Some(8));

        table
            .modify(&[Tlv::Name("g2".into())], &[Tlv::PortNo(9)])
            .unwrap();
        assert_eq!(table.lookup("g2"), Some(9));
        assert_eq!(
            table.modify(&[Tlv::Name("g3".into())], &[Tlv::PortNo(9)]),
            Err(TableError::NotFound)
        );

        table.delete(&[Tlv::Name("g2".into())]).unwrap();
        assert_eq!(table.lookup("g2"), None);
    }

    #[test]
    fn test_tx_value_must_be_port() {
        let mut table = TxPortGroupTable::new(MAX_PORTS, Logger::disabled());
        let err = table
            .add(&[Tlv::Name("g2".into())], &[Tlv::Name("eth0".into())])
            .unwrap_err();
        assert_eq!(
            err,
            TableError::WrongTlv {
                expected: "port_no",
                found: "name"
            }
        );
    }

    #[test]
    fn test_resolve_reference() {
        let mut table = TxPortGroupTable::new(MAX_PORTS, Logger::disabled());
        table
            .add(&[Tlv::Name("g2".into())], &[Tlv::PortNo(8)])
            .unwrap();

        assert_eq!(
            table.resolve_reference(&[Tlv::Name("g2".into())]).unwrap(),
            "g2"
        );
        assert_eq!(
            table.resolve_reference(&[Tlv::Name("g3".into())]),
            Err(TableError::UnresolvedReference("g3".into()))
        );
    }
}
