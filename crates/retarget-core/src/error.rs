// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for the retargeting core

use crate::wire::WireError;
use retarget_config::ConfigError;
use retarget_transports::TransportError;
use thiserror::Error;

/// Result type for retargeting operations
pub type RetargetingResult<T> = Result<T, RetargetingError>;

/// Errors surfaced by `initialize` and `reset`
///
/// Steady-state ticks never return these: a missing or malformed sample is
/// logged and the channel keeps its previous target.
#[derive(Error, Debug)]
pub enum RetargetingError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Malformed sample: {0}")]
    Wire(#[from] WireError),

    #[error("Invalid time constant for {channel}: {value}s (must cover at least 3 control periods)")]
    InvalidTimeConstant { channel: String, value: f64 },

    #[error("Invalid channel {channel}: {reason}")]
    InvalidChannel { channel: String, reason: String },

    #[error("Joint '{name}' is not in the controlled joint list")]
    UnresolvedJoint { name: String },

    #[error("Vector size mismatch for {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("No sample received on {transport} after {attempts} attempts")]
    BootstrapTimeout { transport: String, attempts: u32 },
}

impl RetargetingError {
    /// Check if retrying the failed call may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetargetingError::BootstrapTimeout { .. })
    }

    /// Check if the error comes from configuration (caller must not proceed)
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            RetargetingError::Config(_)
                | RetargetingError::InvalidTimeConstant { .. }
                | RetargetingError::InvalidChannel { .. }
                | RetargetingError::UnresolvedJoint { .. }
        )
    }
}
