// SPDX-License-Identifier: Apache-2.0 OR MIT
//! Shared validation utilities for table keys/values and the startup config.

/// Longest port-group name accepted, in bytes
pub const MAX_GROUP_NAME_LEN: usize = 63;

/// Result type for validation functions
pub type ValidationResult = Result<(), String>;

/// Validate a port-group name.
///
/// # Rules
/// - At most 63 bytes
/// - No NUL bytes (names are exchanged with C controllers)
pub fn validate_group_name(name: &str) -> ValidationResult {
    if name.len() > MAX_GROUP_NAME_LEN {
        return Err(format!(
            "name '{}' is {} bytes, maximum is {}",
            name,
            name.len(),
            MAX_GROUP_NAME_LEN
        ));
    }
    if name.contains('\0') {
        return Err("name contains a NUL byte".to_string());
    }
    Ok(())
}

/// Validate a switch port number against the platform's port count.
pub fn validate_port_no(port: u32, max_ports: u32) -> ValidationResult {
    if port >= max_ports {
        return Err(format!(
            "port {} out of range; valid ports are 0-{}",
            port,
            max_ports.saturating_sub(1)
        ));
    }
    Ok(())
}

/// Validate a timer interval in milliseconds.
pub fn validate_interval_ms(interval_ms: u32, context: &str) -> ValidationResult {
    if interval_ms == 0 {
        return Err(format!("{} must be greater than 0 ms", context));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_group_name() {
        assert!(validate_group_name("g1").is_ok());
        assert!(validate_group_name("").is_ok());
        assert!(validate_group_name(&"x".repeat(63)).is_ok());

        let err = validate_group_name(&"x".repeat(64)).unwrap_err();
        assert!(err.contains("maximum is 63"));
        assert!(validate_group_name("a\0b").is_err());
    }

    #[test]
    fn test_validate_port_no() {
        assert!(validate_port_no(0, 64).is_ok());
        assert!(validate_port_no(63, 64).is_ok());
        let err = validate_port_no(64, 64).unwrap_err();
        assert!(err.contains("0-63"));
    }

    #[test]
    fn test_validate_interval_ms() {
        assert!(validate_interval_ms(1, "query_timeout").is_ok());
        assert!(validate_interval_ms(0, "query_timeout").is_err());
    }
}
