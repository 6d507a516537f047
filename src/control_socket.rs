// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Unix control socket
//!
//! Newline-delimited JSON. Each line is one `ControlCommand` and gets one
//! `ControlReply` line back. `subscribe` turns the connection into a stream
//! of `event` lines carrying everything the agent emits.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;

use crate::classifier::Disposition;
use crate::logging::{Facility, Logger};
use crate::runtime::{Outbound, RuntimeHandle};
use crate::{log_debug, log_info, log_warning, TableRequest, TableResponse};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Controller table operation
    Table { request: TableRequest },
    /// Frame snooped on `in_port`
    PacketIn { in_port: u32, frame: Vec<u8> },
    /// Controller session up with the negotiated wire version
    ControllerConnected { version: u8 },
    ControllerDisconnected,
    Subscribe,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlReply {
    Table(TableResponse),
    Disposition(Disposition),
    Ok,
    Pong,
    Subscribed,
    Event(Outbound),
    Error(String),
}

/// Bind the control socket, replacing a stale socket file
pub fn bind(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        std::fs::remove_file(path)?;
    }
    Ok(UnixListener::bind(path)?)
}

/// Accept clients until the listener fails
pub async fn serve(listener: UnixListener, handle: RuntimeHandle, logger: Logger) -> Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let handle = handle.clone();
        let logger = logger.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, handle, logger.clone()).await {
                log_warning!(
                    logger,
                    Facility::ControlChannel,
                    &format!("control client error: {}", e)
                );
            }
        });
    }
}

async fn handle_client(stream: UnixStream, handle: RuntimeHandle, logger: Logger) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    log_debug!(logger, Facility::ControlChannel, "control client connected");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match serde_json::from_str::<ControlCommand>(&line) {
            Ok(command) => command,
            Err(e) => {
                let reply = ControlReply::Error(format!("invalid command: {}", e));
                write_reply(&mut writer, &reply).await?;
                continue;
            }
        };

        if command == ControlCommand::Subscribe {
            return stream_events(&mut writer, &handle, &logger).await;
        }

        let reply = execute(&handle, command).await;
        write_reply(&mut writer, &reply).await?;
    }
    Ok(())
}

async fn execute(handle: &RuntimeHandle, command: ControlCommand) -> ControlReply {
    let result = match command {
        ControlCommand::Table { request } => handle.request(request).await.map(ControlReply::Table),
        ControlCommand::PacketIn { in_port, frame } => handle
            .packet_in(in_port, frame)
            .await
            .map(ControlReply::Disposition),
        ControlCommand::ControllerConnected { version } => handle
            .controller_connected(version)
            .await
            .map(|_| ControlReply::Ok),
        ControlCommand::ControllerDisconnected => handle
            .controller_disconnected()
            .await
            .map(|_| ControlReply::Ok),
        ControlCommand::Ping => Ok(ControlReply::Pong),
        ControlCommand::Subscribe => Ok(ControlReply::Subscribed),
    };
    result.unwrap_or_else(|e| ControlReply::Error(e.to_string()))
}

async fn stream_events<W: AsyncWrite + Unpin>(
    writer: &mut W,
    handle: &RuntimeHandle,
    logger: &Logger,
) -> Result<()> {
    let mut events = handle.subscribe();
    write_reply(writer, &ControlReply::Subscribed).await?;
    log_info!(logger, Facility::ControlChannel, "subscriber attached");

    loop {
        match events.recv().await {
            Ok(event) => {
                if write_reply(writer, &ControlReply::Event(event)).await.is_err() {
                    // Subscriber went away
                    break;
                }
            }
            Err(RecvError::Closed) => break,
            Err(RecvError::Lagged(n)) => {
                log_warning!(
                    logger,
                    Facility::ControlChannel,
                    &format!("subscriber lagged by {} events", n)
                );
            }
        }
    }
    Ok(())
}

async fn write_reply<W: AsyncWrite + Unpin>(writer: &mut W, reply: &ControlReply) -> Result<()> {
    let mut bytes = serde_json::to_vec(reply)?;
    bytes.push(b'\n');
    writer.write_all(&bytes).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogRegistry;
    use crate::runtime::Runtime;
    use crate::tlv::Tlv;
    use crate::{TableId, TableOp};
    use tokio::io::{AsyncBufReadExt, BufReader, Lines};
    use tokio::net::unix::OwnedReadHalf;
    use tokio::net::unix::OwnedWriteHalf;

    struct Client {
        lines: Lines<BufReader<OwnedReadHalf>>,
        writer: OwnedWriteHalf,
    }

    impl Client {
        async fn connect(path: &Path) -> Self {
            let (reader, writer) = UnixStream::connect(path).await.unwrap().into_split();
            Self {
                lines: BufReader::new(reader).lines(),
                writer,
            }
        }

        async fn send_line(&mut self, line: &str) -> ControlReply {
            self.writer.write_all(line.as_bytes()).await.unwrap();
            self.writer.write_all(b"\n").await.unwrap();
            self.read_reply().await
        }

        async fn send(&mut self, command: &ControlCommand) -> ControlReply {
            self.send_line(&serde_json::to_string(command).unwrap()).await
        }

        async fn read_reply(&mut self) -> ControlReply {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    async fn start(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("control.sock");
        let logs = LogRegistry::new();
        let (runtime, handle) = Runtime::new(64, &logs);
        tokio::spawn(runtime.run());
        let listener = bind(&path).unwrap();
        tokio::spawn(serve(listener, handle, Logger::disabled()));
        path
    }

    #[tokio::test]
    async fn test_requests_over_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = start(dir.path()).await;
        let mut client = Client::connect(&path).await;

        assert_eq!(client.send(&ControlCommand::Ping).await, ControlReply::Pong);

        let add = ControlCommand::Table {
            request: TableRequest {
                table: TableId::RxPortGroup,
                op: TableOp::Add {
                    key: vec![Tlv::PortNo(2)],
                    value: vec![Tlv::Name("g1".into())],
                },
            },
        };
        assert_eq!(
            client.send(&add).await,
            ControlReply::Table(TableResponse::Ok)
        );
        assert!(matches!(
            client.send(&add).await,
            ControlReply::Table(TableResponse::Error { .. })
        ));

        assert!(matches!(
            client.send_line("{\"command\": \"bogus\"}").await,
            ControlReply::Error(_)
        ));
    }

    #[tokio::test]
    async fn test_subscriber_sees_passed_packets() {
        let dir = tempfile::tempdir().unwrap();
        let path = start(dir.path()).await;

        let mut subscriber = Client::connect(&path).await;
        assert_eq!(
            subscriber.send(&ControlCommand::Subscribe).await,
            ControlReply::Subscribed
        );

        let mut client = Client::connect(&path).await;
        let reply = client
            .send(&ControlCommand::PacketIn {
                in_port: 1,
                frame: vec![0xff; 16],
            })
            .await;
        assert_eq!(reply, ControlReply::Disposition(Disposition::Pass));

        assert_eq!(
            subscriber.read_reply().await,
            ControlReply::Event(Outbound::PacketIn {
                in_port: 1,
                frame: vec![0xff; 16]
            })
        );
    }
}
