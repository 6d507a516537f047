// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Single-threaded event loop owning the `Agent`
//!
//! Control requests, packet-ins, controller connection changes and the five
//! engine timers are all serialized onto one task. Each engine tick returns
//! the delay until its next tick. Everything the agent emits (controller
//! messages, passed packet-ins, originated frames) is fanned out on a
//! broadcast channel for subscribers.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::{broadcast, mpsc, oneshot};

use crate::agent::{Agent, EngineId};
use crate::channel::{ControlChannel, ControllerLink, FrameSender, OutboundFrame};
use crate::classifier::Disposition;
use crate::logging::{Facility, LogRegistry, Logger, Severity};
use crate::scheduler::IDLE_POLL_INTERVAL;
use crate::{log_info, log_kv, log_warning, ControllerMessage, TableRequest, TableResponse};

pub const EVENT_QUEUE_DEPTH: usize = 1024;
pub const OUTBOUND_BUFFER: usize = 1024;

pub type SnoopAgent = Agent<ControllerLink, FrameSender>;

/// Input to the event loop
#[derive(Debug)]
pub enum AgentEvent {
    Request {
        request: TableRequest,
        reply: oneshot::Sender<TableResponse>,
    },
    PacketIn {
        in_port: u32,
        frame: Vec<u8>,
        reply: Option<oneshot::Sender<Disposition>>,
    },
    ControllerConnected {
        version: u8,
    },
    ControllerDisconnected,
    Shutdown,
}

/// Output of the event loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outbound {
    Controller(ControllerMessage),
    /// A packet-in the classifier passed to the controller
    PacketIn { in_port: u32, frame: Vec<u8> },
    PacketOut(OutboundFrame),
}

/// Cloneable handle for talking to a running `Runtime`
#[derive(Clone)]
pub struct RuntimeHandle {
    events: mpsc::Sender<AgentEvent>,
    outbound: broadcast::Sender<Outbound>,
}

impl RuntimeHandle {
    pub async fn request(&self, request: TableRequest) -> Result<TableResponse> {
        let (reply, rx) = oneshot::channel();
        self.send(AgentEvent::Request { request, reply }).await?;
        rx.await.map_err(|_| anyhow!("agent dropped the request"))
    }

    pub async fn packet_in(&self, in_port: u32, frame: Vec<u8>) -> Result<Disposition> {
        let (reply, rx) = oneshot::channel();
        self.send(AgentEvent::PacketIn {
            in_port,
            frame,
            reply: Some(reply),
        })
        .await?;
        rx.await.map_err(|_| anyhow!("agent dropped the packet-in"))
    }

    pub async fn controller_connected(&self, version: u8) -> Result<()> {
        self.send(AgentEvent::ControllerConnected { version }).await
    }

    pub async fn controller_disconnected(&self) -> Result<()> {
        self.send(AgentEvent::ControllerDisconnected).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Outbound> {
        self.outbound.subscribe()
    }

    pub async fn shutdown(&self) -> Result<()> {
        self.send(AgentEvent::Shutdown).await
    }

    async fn send(&self, event: AgentEvent) -> Result<()> {
        self.events
            .send(event)
            .await
            .map_err(|_| anyhow!("agent runtime has stopped"))
    }
}

pub struct Runtime {
    agent: SnoopAgent,
    events: mpsc::Receiver<AgentEvent>,
    messages: mpsc::UnboundedReceiver<ControllerMessage>,
    frames: mpsc::UnboundedReceiver<OutboundFrame>,
    outbound: broadcast::Sender<Outbound>,
    /// Next tick of each engine, indexed like `EngineId::ALL`
    next_tick: [Instant; EngineId::ALL.len()],
    logger: Logger,
}

/// Loop time; follows tokio's clock so paused-time tests drive the engines
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl Runtime {
    pub fn new(max_ports: u32, logs: &LogRegistry) -> (Self, RuntimeHandle) {
        let (event_tx, events) = mpsc::channel(EVENT_QUEUE_DEPTH);
        let (message_tx, messages) = mpsc::unbounded_channel();
        let (frame_tx, frames) = mpsc::unbounded_channel();
        let (outbound, _) = broadcast::channel(OUTBOUND_BUFFER);

        let agent = Agent::new(
            max_ports,
            logs,
            ControllerLink::new(message_tx),
            FrameSender::new(frame_tx),
        );
        let first_tick = now() + IDLE_POLL_INTERVAL;

        let runtime = Self {
            agent,
            events,
            messages,
            frames,
            outbound: outbound.clone(),
            next_tick: [first_tick; EngineId::ALL.len()],
            logger: logs.logger(Facility::Runtime),
        };
        let handle = RuntimeHandle {
            events: event_tx,
            outbound,
        };
        (runtime, handle)
    }

    /// Access to the agent before the loop starts
    pub fn agent_mut(&mut self) -> &mut SnoopAgent {
        &mut self.agent
    }

    pub async fn run(mut self) {
        log_info!(self.logger, Facility::Runtime, "event loop started");

        loop {
            let (index, deadline) = self.earliest_tick();
            tokio::select! {
                event = self.events.recv() => match event {
                    None | Some(AgentEvent::Shutdown) => break,
                    Some(event) => self.handle_event(event, now()),
                },
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    let now = now();
                    let delay = self.agent.tick(EngineId::ALL[index], now);
                    self.next_tick[index] = now + delay;
                }
            }
            self.forward_outbound();
        }

        self.agent.log_summary();
        log_info!(self.logger, Facility::Runtime, "event loop stopped");
    }

    fn earliest_tick(&self) -> (usize, Instant) {
        let mut earliest = (0, self.next_tick[0]);
        for (index, deadline) in self.next_tick.iter().enumerate().skip(1) {
            if *deadline < earliest.1 {
                earliest = (index, *deadline);
            }
        }
        earliest
    }

    fn handle_event(&mut self, event: AgentEvent, now: Instant) {
        match event {
            AgentEvent::Request { request, reply } => {
                let response = self.agent.handle_request(&request, now);
                let _ = reply.send(response);
            }
            AgentEvent::PacketIn {
                in_port,
                frame,
                reply,
            } => {
                let disposition = self.agent.classify(&frame, in_port, now);
                if disposition == Disposition::Pass {
                    self.outbound
                        .send(Outbound::PacketIn { in_port, frame })
                        .unwrap_or_default();
                }
                if let Some(reply) = reply {
                    let _ = reply.send(disposition);
                }
            }
            AgentEvent::ControllerConnected { version } => {
                self.agent.channel_mut().connect(version);
                let version = version.to_string();
                log_kv!(self.logger, Severity::Notice, Facility::ControlChannel, "controller connected",
                    "version" => version.as_str());
                if !self.agent.channel().async_capable() {
                    log_warning!(
                        self.logger,
                        Facility::ControlChannel,
                        "controller version carries no asynchronous messages; idle notifications suppressed"
                    );
                }
            }
            AgentEvent::ControllerDisconnected => {
                self.agent.channel_mut().disconnect();
                log_info!(self.logger, Facility::ControlChannel, "controller disconnected");
            }
            AgentEvent::Shutdown => {}
        }
    }

    fn forward_outbound(&mut self) {
        while let Ok(message) = self.messages.try_recv() {
            self.outbound
                .send(Outbound::Controller(message))
                .unwrap_or_default();
        }
        while let Ok(frame) = self.frames.try_recv() {
            self.outbound
                .send(Outbound::PacketOut(frame))
                .unwrap_or_default();
        }
    }
}
