// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Retargeting Configuration System
//!
//! Type-safe configuration loader for the teleoperation retargeting client with
//! support for:
//! - TOML file parsing
//! - Environment variable overrides
//! - CLI argument overrides
//! - Whole-file validation with every problem reported at once
//!
//! ## Usage
//!
//! ```rust,no_run
//! use retarget_config::{load_config, validate_config};
//!
//! // Load configuration with automatic file discovery and overrides
//! let config = load_config(None, None).expect("Failed to load config");
//! validate_config(&config).expect("Invalid configuration");
//!
//! println!("Module name: {}", config.control.module_name);
//! println!("Hand retargeting: {}", config.retargeting.use_hand_retargeting);
//! ```
//!
//! ## File layout
//!
//! ```toml
//! [control]
//! module_name = "walking-coordinator"
//! period = 0.01
//!
//! [retargeting]
//! use_joint_retargeting = true
//! approaching_phase_duration = 4.0
//!
//! [retargeting.JOINT_RETARGETING]
//! retargeting_joint_list = ["neck_pitch", "neck_roll", "neck_yaw"]
//! joint_retargeting_port_name = "/jointPosition:i"
//! smoothing_time_approaching = 2.0
//! smoothing_time_walking = 0.5
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{
    transport_name, validate_config, validate_retargeting, ConfigValidationError,
    MIN_SMOOTHING_PERIODS,
};

/// Re-export for convenience
pub use serde;

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Mutually exclusive features both enabled: {0} and {1}")]
    MutuallyExclusive(String, String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
