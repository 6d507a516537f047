// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros for convenient logging

/// Log a message with emergency severity
///
/// # Examples
/// ```ignore
/// log_emergency!(logger, Facility::Expectation, "timer fired for freed entry");
/// ```
#[macro_export]
macro_rules! log_emergency {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.emergency($facility, $msg)
    };
}

/// Log a message with alert severity
#[macro_export]
macro_rules! log_alert {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.alert($facility, $msg)
    };
}

/// Log a message with critical severity
#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.critical($facility, $msg)
    };
}

/// Log a message with error severity
///
/// # Examples
/// ```ignore
/// log_error!(logger, Facility::Runtime, "control socket accept failed");
/// ```
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.error($facility, $msg)
    };
}

/// Log a message with warning severity
///
/// # Examples
/// ```ignore
/// log_warning!(logger, Facility::Transmission, "port group not configured");
/// ```
#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.warning($facility, $msg)
    };
}

/// Log a message with notice severity
#[macro_export]
macro_rules! log_notice {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.notice($facility, $msg)
    };
}

/// Log a message with info severity
///
/// # Examples
/// ```ignore
/// log_info!(logger, Facility::PortGroup, "tx port group added");
/// ```
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.info($facility, $msg)
    };
}

/// Log a message with debug severity
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $facility:expr, $msg:expr) => {
        $logger.debug($facility, $msg)
    };
}

/// Log a message with key-value pairs
///
/// # Examples
/// ```ignore
/// log_kv!(logger, Severity::Info, Facility::Expectation, "entry added",
///         "name" => "g1", "vlan" => "10");
/// ```
#[macro_export]
macro_rules! log_kv {
    ($logger:expr, $severity:expr, $facility:expr, $msg:expr, $($key:expr => $value:expr),+ $(,)?) => {{
        let kvs: &[(&str, &str)] = &[$(($key, $value)),+];
        $logger.log_kv($severity, $facility, $msg, kvs)
    }};
}

#[cfg(test)]
mod tests {
    use crate::logging::{Facility, LogRegistry, Severity};

    #[test]
    fn test_log_macros() {
        let registry = LogRegistry::new();
        registry.set_global_level(Severity::Debug);
        let logger = registry.logger(Facility::Test);

        log_emergency!(logger, Facility::Test, "Emergency message");
        log_alert!(logger, Facility::Test, "Alert message");
        log_critical!(logger, Facility::Test, "Critical message");
        log_error!(logger, Facility::Test, "Error message");
        log_warning!(logger, Facility::Test, "Warning message");
        log_notice!(logger, Facility::Test, "Notice message");
        log_info!(logger, Facility::Test, "Info message");
        log_debug!(logger, Facility::Test, "Debug message");

        let buffers = registry.buffers();
        let (_, buffer) = buffers.iter().find(|(f, _)| *f == Facility::Test).unwrap();
        assert_eq!(buffer.len(), 8);
    }

    #[test]
    fn test_log_kv_macro() {
        let registry = LogRegistry::new();
        let logger = registry.logger(Facility::Test);
        let vlan = 10.to_string();

        log_kv!(
            logger,
            Severity::Info,
            Facility::Test,
            "expectation added",
            "name" => "g1",
            "vlan" => vlan.as_str(),
        );

        let buffers = registry.buffers();
        let (_, buffer) = buffers.iter().find(|(f, _)| *f == Facility::Test).unwrap();
        let entry = buffer.read().unwrap();
        assert_eq!(entry.get_kvs()[1].value, "10");
    }
}
