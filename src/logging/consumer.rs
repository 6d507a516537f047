// SPDX-License-Identifier: Apache-2.0 OR MIT
// Log consumer task - drains log buffers and outputs log entries

use super::buffer::LogBuffer;
use super::entry::LogEntry;
use super::Facility;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Output sink for log entries
pub trait LogSink: Send {
    fn write_entry(&mut self, entry: &LogEntry);

    fn flush(&mut self);
}

/// `[SEVERITY] [Facility] message key1=value1 key2=value2`
fn format_plain(entry: &LogEntry) -> String {
    let kvs = entry.get_kvs();
    if kvs.is_empty() {
        format!(
            "[{}] [{}] {}",
            entry.severity,
            entry.facility.as_str(),
            entry.get_message()
        )
    } else {
        let kv_str: Vec<String> = kvs.iter().map(|kv| format!("{:?}", kv)).collect();
        format!(
            "[{}] [{}] {} {}",
            entry.severity,
            entry.facility.as_str(),
            entry.get_message(),
            kv_str.join(" ")
        )
    }
}

pub struct StdoutSink {
    stdout: std::io::Stdout,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self {
            stdout: std::io::stdout(),
        }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StdoutSink {
    fn write_entry(&mut self, entry: &LogEntry) {
        let _ = writeln!(self.stdout, "{}", format_plain(entry));
    }

    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

pub struct StderrSink {
    stderr: std::io::Stderr,
}

impl StderrSink {
    pub fn new() -> Self {
        Self {
            stderr: std::io::stderr(),
        }
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for StderrSink {
    fn write_entry(&mut self, entry: &LogEntry) {
        let _ = writeln!(self.stderr, "{}", format_plain(entry));
    }

    fn flush(&mut self) {
        let _ = self.stderr.flush();
    }
}

/// One JSON object per line, for log shippers
pub struct JsonSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl JsonSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

pub(crate) fn entry_to_json(entry: &LogEntry) -> serde_json::Value {
    let secs = (entry.timestamp_ns / 1_000_000_000) as i64;
    let nanos = (entry.timestamp_ns % 1_000_000_000) as u32;
    let timestamp = chrono::DateTime::from_timestamp(secs, nanos)
        .unwrap_or_else(chrono::Utc::now)
        .to_rfc3339();

    let kvs: serde_json::Map<String, serde_json::Value> = entry
        .get_kvs()
        .iter()
        .map(|kv| (kv.key.clone(), serde_json::Value::String(kv.value.clone())))
        .collect();

    serde_json::json!({
        "timestamp": timestamp,
        "seq": entry.sequence,
        "level": entry.severity.as_str(),
        "facility": entry.facility.as_str(),
        "message": entry.get_message(),
        "fields": kvs,
    })
}

impl<W: Write + Send> LogSink for JsonSink<W> {
    fn write_entry(&mut self, entry: &LogEntry) {
        let _ = writeln!(self.out, "{}", entry_to_json(entry));
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

/// Consumer task draining every facility buffer into one sink
pub struct AsyncConsumer {
    buffers: Vec<(Facility, Arc<LogBuffer>)>,
    sink: Box<dyn LogSink>,
    running: Arc<AtomicBool>,
}

impl AsyncConsumer {
    pub fn new(buffers: Vec<(Facility, Arc<LogBuffer>)>, sink: Box<dyn LogSink>) -> Self {
        Self {
            buffers,
            sink,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn stdout(buffers: Vec<(Facility, Arc<LogBuffer>)>) -> Self {
        Self::new(buffers, Box::new(StdoutSink::new()))
    }

    pub fn stderr(buffers: Vec<(Facility, Arc<LogBuffer>)>) -> Self {
        Self::new(buffers, Box::new(StderrSink::new()))
    }

    /// Store `false` to stop the consumer after its current pass
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Drain everything currently buffered; returns the number of entries written
    pub fn drain_once(&mut self) -> usize {
        let mut written = 0;
        for (_facility, buffer) in &self.buffers {
            while let Some(entry) = buffer.read() {
                self.sink.write_entry(&entry);
                written += 1;
            }
        }
        if written > 0 {
            self.sink.flush();
        }
        written
    }

    pub async fn run(mut self) {
        while self.running.load(Ordering::Relaxed) {
            if self.drain_once() == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        // Final pass so nothing logged during shutdown is lost
        self.drain_once();
        self.sink.flush();
    }
}
