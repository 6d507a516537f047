// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Smoke tests for the `mcsnoopd` command line.

use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::process::Command as TokioCommand;
use tokio::time::sleep;

async fn connect_with_retry(path: &Path) -> Result<UnixStream> {
    for _ in 0..50 {
        if let Ok(stream) = UnixStream::connect(path).await {
            return Ok(stream);
        }
        sleep(Duration::from_millis(100)).await;
    }
    anyhow::bail!("control socket {} never came up", path.display())
}

/// The daemon answers on its control socket
#[tokio::test]
async fn test_run_serves_control_socket() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let socket = dir.path().join("mcsnoop.sock");

    let mut child = TokioCommand::new(env!("CARGO_BIN_EXE_mcsnoopd"))
        .arg("run")
        .arg("--socket-path")
        .arg(&socket)
        .kill_on_drop(true)
        .spawn()?;

    let stream = connect_with_retry(&socket).await?;
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    writer.write_all(b"{\"command\": \"ping\"}\n").await?;
    assert_eq!(lines.next_line().await?.as_deref(), Some("\"pong\""));

    let add = r#"{"command": "table", "request": {"table": "rx_port_group", "op": "add", "key": [{"port_no": 1}], "value": [{"name": "g1"}]}}"#;
    writer.write_all(add.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    assert_eq!(
        lines.next_line().await?.as_deref(),
        Some("{\"table\":\"ok\"}")
    );

    child.kill().await?;
    Ok(())
}

/// `check-config` accepts a valid file and rejects a bad one
#[tokio::test]
async fn test_check_config() -> Result<()> {
    let dir = tempfile::tempdir()?;

    let good = dir.path().join("good.json5");
    std::fs::write(&good, r#"{ max_ports: 48, timeouts: { "query_timeout": 60000 } }"#)?;
    let output = TokioCommand::new(env!("CARGO_BIN_EXE_mcsnoopd"))
        .arg("check-config")
        .arg(&good)
        .output()
        .await?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("\"max_ports\": 48"));

    let bad = dir.path().join("bad.json5");
    std::fs::write(&bad, "{ max_ports: 0 }")?;
    let output = TokioCommand::new(env!("CARGO_BIN_EXE_mcsnoopd"))
        .arg("check-config")
        .arg(&bad)
        .output()
        .await?;
    assert!(!output.status.success());
    Ok(())
}
