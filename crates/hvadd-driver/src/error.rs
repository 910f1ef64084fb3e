// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for vector adder operations

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for vector adder operations
pub type Result<T> = std::result::Result<T, HvaddError>;

/// Errors that can occur while driving the peripheral
///
/// Data mismatches are not errors: the harness counts them. These variants
/// cover conditions that stop an operation from completing at all.
#[derive(Debug, Error)]
pub enum HvaddError {
    /// Mapping device node not found
    #[error("Device not found: {path}")]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// I/O error while opening or mapping a device node
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Physical window could not be mapped
    #[error("Failed to map {what}: {reason}")]
    MapFailed {
        /// Window description
        what: String,
        /// Reason for failure
        reason: String,
    },

    /// Address range outside the addressable window
    #[error("Range {addr:#x}+{len:#x} outside {capacity:#x}-byte window")]
    OutOfRange {
        /// Start byte address
        addr: u64,
        /// Length in bytes
        len: u64,
        /// Window capacity in bytes
        capacity: u64,
    },

    /// Register or word access not 4-byte aligned
    #[error("Misaligned 32-bit access at offset {offset:#x}")]
    Misaligned {
        /// Offending offset
        offset: usize,
    },

    /// Add length not a whole number of elements
    #[error("Length {len} is not a multiple of 4 bytes")]
    InvalidLength {
        /// Requested length in bytes
        len: u32,
    },

    /// Status register never reported done
    #[error("Timed out waiting for {command} after {polls} polls ({elapsed_us} µs)")]
    Timeout {
        /// Command in flight
        command: String,
        /// Status polls performed
        polls: u32,
        /// Wall-clock time spent polling
        elapsed_us: u64,
    },

    /// Driver or device is in a state that forbids the request
    #[error("Device in invalid state: {state}")]
    InvalidState {
        /// Current state description
        state: String,
    },

    /// Configuration value rejected
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for rejection
        reason: String,
    },

    /// Configuration file could not be parsed
    #[error("Configuration parse error: {source}")]
    Config {
        /// Underlying TOML error
        #[from]
        source: toml::de::Error,
    },
}

impl HvaddError {
    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create a map failed error
    pub fn map_failed(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::MapFailed {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an out of range error
    pub fn out_of_range(addr: impl Into<u64>, len: impl Into<u64>, capacity: impl Into<u64>) -> Self {
        Self::OutOfRange {
            addr: addr.into(),
            len: len.into(),
            capacity: capacity.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(state: impl Into<String>) -> Self {
        Self::InvalidState {
            state: state.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this is a liveness failure (peripheral never completed)
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
