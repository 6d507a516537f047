// SPDX-License-Identifier: Apache-2.0 OR MIT
// Facility-tagged, severity-filtered logging for the snooping agent
//
// Components log through a `Logger` handle into a bounded per-facility
// `LogBuffer`; an `AsyncConsumer` task drains the buffers into a sink.

mod buffer;
mod consumer;
mod entry;
mod facility;
pub mod integration;
mod logger;
#[macro_use]
mod macros;
mod severity;

pub use buffer::LogBuffer;
pub use consumer::{AsyncConsumer, JsonSink, LogSink, StderrSink, StdoutSink};
pub use entry::{KeyValue, LogEntry};
pub use facility::Facility;
pub use integration::AgentLogging;
pub use logger::{LogRegistry, LogTarget, Logger, StderrJsonLogger};
pub use severity::Severity;
