// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Property tests for the packet-in path and key normalization.
//!
//! Packet-ins come straight off the switch, so the parser and classifier
//! must survive any byte sequence. Keys must land on the same row no matter
//! which upper VLAN bits the controller leaves set.

use std::time::Instant;

use mcsnoop::channel::{ChannelError, ControlChannel, PacketOut, TransmitError};
use mcsnoop::classifier::Disposition;
use mcsnoop::keys::VlanKey;
use mcsnoop::logging::LogRegistry;
use mcsnoop::packet_parser::parse_frame;
use mcsnoop::protocols::igmp::{self, IgmpTxParams};
use mcsnoop::{Agent, ControllerMessage, TableId, TableOp, TableRequest, TableResponse, Tlv};
use proptest::prelude::*;

struct NullChannel;

impl ControlChannel for NullChannel {
    fn negotiated_version(&self) -> Option<u8> {
        Some(4)
    }

    fn send(&mut self, _msg: ControllerMessage) -> Result<(), ChannelError> {
        Ok(())
    }
}

struct NullOut;

impl PacketOut for NullOut {
    fn transmit(&mut self, _egress_port: u32, _frame: &[u8]) -> Result<(), TransmitError> {
        Ok(())
    }
}

fn agent_with_expectation(vlan: u16) -> Agent<NullChannel, NullOut> {
    let mut agent = Agent::new(64, &LogRegistry::new(), NullChannel, NullOut);
    let now = Instant::now();
    for request in [
        TableRequest {
            table: TableId::RxPortGroup,
            op: TableOp::Add {
                key: vec![Tlv::PortNo(1)],
                value: vec![Tlv::Name("g1".into())],
            },
        },
        TableRequest {
            table: TableId::GeneralQueryExpectation,
            op: TableOp::Add {
                key: vec![Tlv::Name("g1".into()), Tlv::VlanVid(vlan)],
                value: vec![],
            },
        },
    ] {
        assert_eq!(agent.handle_request(&request, now), TableResponse::Ok);
    }
    agent
}

proptest! {
    /// Arbitrary bytes either parse or fail cleanly
    #[test]
    fn parse_frame_does_not_panic(input in any::<Vec<u8>>()) {
        let _ = parse_frame(&input);
    }

    /// Arbitrary bytes on a grouped port never panic the classifier, and
    /// each packet-in is counted exactly once
    #[test]
    fn classifier_does_not_panic(input in proptest::collection::vec(any::<u8>(), 0..128)) {
        let mut agent = agent_with_expectation(10);
        let _ = agent.classify(&input, 1, Instant::now());
        prop_assert_eq!(agent.classifier_counters().total(), 1);
    }

    /// Flipping any single byte of a valid query never panics, and a hit on
    /// the entry always means the frame was absorbed
    #[test]
    fn corrupted_query_is_handled(index in 0usize..46, flip in 1u8..=255) {
        let mut agent = agent_with_expectation(10);
        let mut frame = igmp::general_query_frame(&IgmpTxParams {
            src_mac: [0x02, 0, 0, 0, 0, 1],
            vlan_id: 10,
            src_ip: std::net::Ipv4Addr::new(10, 0, 0, 1),
        });
        let index = index % frame.len();
        frame[index] ^= flip;

        let disposition = agent.classify(&frame, 1, Instant::now());
        let hits = agent
            .general_query()
            .lookup(&VlanKey::new("g1", 10))
            .map(|entry| entry.rx_packets)
            .unwrap_or(0);
        prop_assert!(hits <= 1);
        if hits == 1 {
            prop_assert_eq!(disposition, Disposition::Drop);
        }
    }

    /// Only the low twelve bits of a configured VLAN are stored
    #[test]
    fn vlan_is_masked(vlan in any::<u16>()) {
        let agent = agent_with_expectation(vlan);
        let entry = agent.general_query().lookup(&VlanKey::new("g1", vlan & 0x0fff));
        prop_assert!(entry.is_some());
        prop_assert!(entry.map(|e| e.key.vlan_id).unwrap_or(u16::MAX) <= 4095);
    }
}
