// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Wires the log registry to a consumer task for the agent process.

use crate::config::{AgentConfig, LogFormat};
use crate::logging::{
    AsyncConsumer, Facility, JsonSink, LogRegistry, LogSink, Logger, StderrSink, StdoutSink,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Logging system for the agent process
///
/// Must be created from inside a tokio runtime; the consumer runs as a task on it.
pub struct AgentLogging {
    registry: LogRegistry,
    consumer_handle: Option<tokio::task::JoinHandle<()>>,
    consumer_stop: Arc<AtomicBool>,
}

impl AgentLogging {
    pub fn new(sink: Box<dyn LogSink>) -> Self {
        let registry = LogRegistry::new();
        let consumer = AsyncConsumer::new(registry.buffers(), sink);
        let consumer_stop = consumer.stop_handle();
        let consumer_handle = Some(tokio::spawn(consumer.run()));

        Self {
            registry,
            consumer_handle,
            consumer_stop,
        }
    }

    /// Build from the `logging` section of the agent config
    pub fn from_config(config: &AgentConfig) -> Self {
        let sink: Box<dyn LogSink> = match config.logging.format {
            LogFormat::Plain => Box::new(StdoutSink::new()),
            LogFormat::PlainStderr => Box::new(StderrSink::new()),
            LogFormat::Json => Box::new(JsonSink::stdout()),
        };
        let logging = Self::new(sink);
        logging.registry.set_global_level(config.logging.level);
        for (facility, level) in &config.logging.facilities {
            logging.registry.set_facility_level(*facility, *level);
        }
        logging
    }

    pub fn logger(&self, facility: Facility) -> Logger {
        self.registry.logger(facility)
    }

    pub fn registry(&self) -> &LogRegistry {
        &self.registry
    }

    /// Stop the consumer after it has written out everything buffered
    pub async fn shutdown(mut self) {
        self.consumer_stop.store(false, Ordering::Relaxed);
        if let Some(handle) = self.consumer_handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for AgentLogging {
    fn drop(&mut self) {
        self.consumer_stop.store(false, Ordering::Relaxed);
    }
}
