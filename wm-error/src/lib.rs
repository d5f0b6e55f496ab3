//! Unified error handling for w83mon
//!
//! This crate provides a single error type used across all w83mon components.
//! It uses thiserror for ergonomic error definitions with proper Display and Error trait impls.

use std::io;
use std::path::PathBuf;

/// Result type alias using WmError
pub type Result<T> = std::result::Result<T, WmError>;

/// Unified error type for all w83mon operations
#[derive(thiserror::Error, Debug)]
pub enum WmError {
    // ============================================================================
    // I/O and Device Errors
    // ============================================================================
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open device {path}: {source}")]
    DeviceOpen {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: io::Error,
    },

    // ============================================================================
    // Bus Errors
    // ============================================================================
    /// A byte operation on the bus failed. The in-progress register sequence
    /// was aborted and the chip's bank select may be left non-zero.
    #[error("Transport fault on {target}: {reason}")]
    Transport {
        target: String,
        reason: String,
    },

    // ============================================================================
    // Chip Errors
    // ============================================================================
    #[error("No supported chip found at {0}")]
    ChipNotFound(String),

    #[error("{chip} has no {group} channel {channel}")]
    UnsupportedChannel {
        chip: String,
        group: String,
        channel: usize,
    },

    #[error("Invalid value for {field}: {reason}")]
    InvalidConfiguration {
        field: String,
        reason: String,
    },

    #[error("Parameter {0} is read-only")]
    ReadOnly(String),

    #[error("Chip {chip} is {state}; operation requires {required}")]
    InvalidState {
        chip: String,
        state: String,
        required: String,
    },

    #[error("Unknown chip handle: {0}")]
    UnknownHandle(u64),

    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Generic(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl WmError {
    /// Create a generic error from a string
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a transport fault for the named bus endpoint
    pub fn transport(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported channel error
    pub fn unsupported_channel(
        chip: impl Into<String>,
        group: impl Into<String>,
        channel: usize,
    ) -> Self {
        Self::UnsupportedChannel {
            chip: chip.into(),
            group: group.into(),
            channel,
        }
    }

    /// True for faults raised by the bus layer
    pub fn is_transport_fault(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

// Allow converting from String to WmError
impl From<String> for WmError {
    fn from(s: String) -> Self {
        Self::Generic(s)
    }
}

// Allow converting from &str to WmError
impl From<&str> for WmError {
    fn from(s: &str) -> Self {
        Self::Generic(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display() {
        let err = WmError::transport("isa@0x290", "port write failed");
        assert_eq!(err.to_string(), "Transport fault on isa@0x290: port write failed");
        assert!(err.is_transport_fault());
    }

    #[test]
    fn test_unsupported_channel_display() {
        let err = WmError::unsupported_channel("w83783s", "voltage", 1);
        assert_eq!(err.to_string(), "w83783s has no voltage channel 1");
        assert!(!err.is_transport_fault());
    }

    #[test]
    fn test_from_str() {
        let err: WmError = "boom".into();
        assert!(matches!(err, WmError::Generic(ref s) if s == "boom"));
    }
}
