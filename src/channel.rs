// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Outbound interfaces: the controller channel and the packet-out path.
//!
//! The engines only see the two traits. `ControllerLink` and `FrameSender`
//! are the queue-backed implementations the runtime wires up.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ControllerMessage;

/// Oldest wire version that carries asynchronous messages
pub const ASYNC_MIN_VERSION: u8 = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("no controller connected")]
    NotConnected,

    #[error("controller negotiated version {0}, asynchronous messages need {min}", min = ASYNC_MIN_VERSION)]
    VersionTooOld(u8),

    #[error("control channel closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransmitError {
    #[error("egress port {0} is not available")]
    PortUnavailable(u32),

    #[error("packet-out channel closed")]
    Closed,
}

/// Southbound connection to the controller
pub trait ControlChannel {
    /// Wire version negotiated with the connected controller, if any
    fn negotiated_version(&self) -> Option<u8>;

    /// Whether a connected controller can receive asynchronous messages
    fn async_capable(&self) -> bool {
        self.negotiated_version()
            .is_some_and(|version| version >= ASYNC_MIN_VERSION)
    }

    fn send(&mut self, msg: ControllerMessage) -> Result<(), ChannelError>;
}

/// Transmit path for originated frames
pub trait PacketOut {
    fn transmit(&mut self, egress_port: u32, frame: &[u8]) -> Result<(), TransmitError>;
}

/// Controller connection state plus the queue feeding its writer
#[derive(Debug)]
pub struct ControllerLink {
    version: Option<u8>,
    tx: mpsc::UnboundedSender<ControllerMessage>,
}

impl ControllerLink {
    pub fn new(tx: mpsc::UnboundedSender<ControllerMessage>) -> Self {
        Self { version: None, tx }
    }

    pub fn connect(&mut self, version: u8) {
        self.version = Some(version);
    }

    pub fn disconnect(&mut self) {
        self.version = None;
    }
}

impl ControlChannel for ControllerLink {
    fn negotiated_version(&self) -> Option<u8> {
        self.version
    }

    fn send(&mut self, msg: ControllerMessage) -> Result<(), ChannelError> {
        match self.version {
            None => Err(ChannelError::NotConnected),
            Some(v) if v < ASYNC_MIN_VERSION => Err(ChannelError::VersionTooOld(v)),
            Some(_) => self.tx.send(msg).map_err(|_| ChannelError::Closed),
        }
    }
}

/// A frame handed to the packet-out path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub egress_port: u32,
    pub frame: Vec<u8>,
}

/// Queue-backed packet-out
#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl FrameSender {
    pub fn new(tx: mpsc::UnboundedSender<OutboundFrame>) -> Self {
        Self { tx }
    }
}

impl PacketOut for FrameSender {
    fn transmit(&mut self, egress_port: u32, frame: &[u8]) -> Result<(), TransmitError> {
        self.tx
            .send(OutboundFrame {
                egress_port,
                frame: frame.to_vec(),
            })
            .map_err(|_| TransmitError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IdleNotification, TableId};

    fn notification() -> ControllerMessage {
        ControllerMessage::IdleNotification(IdleNotification {
            table: TableId::PimExpectation,
            name: "g1".into(),
            vlan_id: 1,
            group: None,
        })
    }

    #[test]
    fn test_link_requires_async_version() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = ControllerLink::new(tx);

        assert!(!link.async_capable());
        assert_eq!(link.send(notification()), Err(ChannelError::NotConnected));

        link.connect(3);
        assert!(!link.async_capable());
        assert_eq!(link.send(notification()), Err(ChannelError::VersionTooOld(3)));

        link.connect(4);
        assert!(link.async_capable());
        link.send(notification()).unwrap();
        assert_eq!(rx.try_recv().unwrap(), notification());

        link.disconnect();
        assert_eq!(link.negotiated_version(), None);
    }

    #[test]
    fn test_link_closed_receiver() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut link = ControllerLink::new(tx);
        link.connect(5);
        drop(rx);
        assert_eq!(link.send(notification()), Err(ChannelError::Closed));
    }

    #[test]
    fn test_frame_sender() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut sender = FrameSender::new(tx);
        sender.transmit(8, &[1, 2, 3]).unwrap();

        let sent = rx.try_recv().unwrap();
        assert_eq!(sent.egress_port, 8);
        assert_eq!(sent.frame, vec![1, 2, 3]);

        drop(rx);
        assert_eq!(sender.transmit(8, &[1]), Err(TransmitError::Closed));
    }
}
