// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `retarget_configuration.toml`. Feature groups keep the upper-case table
//! names used by the walking-controller configuration files
//! (`HAND_RETARGETING`, `JOINT_RETARGETING`, `VIRTUALIZER`, `COM_RETARGETING`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RetargetConfig {
    pub control: ControlConfig,
    pub retargeting: RetargetingConfig,
    pub transport: TransportConfig,
    pub logging: LoggingConfig,
}

/// Control-loop level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Prefix of every transport name (`"/" + module_name + suffix`)
    pub module_name: String,
    /// Control period in seconds
    pub period: f64,
    /// Ordered list of every joint the walking controller drives
    pub controlled_joints: Vec<String>,
    /// Number of reads attempted while waiting for the first CoM height sample
    pub bootstrap_attempts: u32,
    /// Delay between two bootstrap reads (milliseconds)
    pub bootstrap_delay_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            module_name: "walking-coordinator".to_string(),
            period: 0.01,
            controlled_joints: Vec::new(),
            bootstrap_attempts: 100,
            bootstrap_delay_ms: 1,
        }
    }
}

/// Retargeting feature switches and per-feature groups
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RetargetingConfig {
    pub use_hand_retargeting: bool,
    pub use_joint_retargeting: bool,
    pub use_virtualizer: bool,
    pub use_com_retargeting: bool,
    /// Duration of the approaching phase (seconds); required when any feature is enabled
    pub approaching_phase_duration: Option<f64>,
    #[serde(rename = "HAND_RETARGETING", skip_serializing_if = "Option::is_none")]
    pub hand: Option<HandRetargetingConfig>,
    #[serde(rename = "JOINT_RETARGETING", skip_serializing_if = "Option::is_none")]
    pub joint: Option<JointRetargetingConfig>,
    #[serde(rename = "VIRTUALIZER", skip_serializing_if = "Option::is_none")]
    pub virtualizer: Option<VirtualizerConfig>,
    #[serde(rename = "COM_RETARGETING", skip_serializing_if = "Option::is_none")]
    pub com: Option<ComRetargetingConfig>,
}

impl RetargetingConfig {
    /// True if at least one feature (including the virtualizer) is enabled
    pub fn any_enabled(&self) -> bool {
        self.use_hand_retargeting
            || self.use_joint_retargeting
            || self.use_virtualizer
            || self.use_com_retargeting
    }

    /// True if at least one smoothed motion stream is enabled
    pub fn retargets_motion(&self) -> bool {
        self.use_hand_retargeting || self.use_joint_retargeting || self.use_com_retargeting
    }
}

/// Smoothing time constants shared by every retargeting group
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct SmoothingTimes {
    /// Smoother time constant during the approaching phase (seconds)
    pub smoothing_time_approaching: f64,
    /// Smoother time constant once the approaching phase is over (seconds)
    pub smoothing_time_walking: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HandRetargetingConfig {
    pub left_hand_transform_port_name: String,
    pub right_hand_transform_port_name: String,
    #[serde(flatten)]
    pub smoothing: SmoothingTimes,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JointRetargetingConfig {
    /// Joints carried by the wire message, in wire order
    pub retargeting_joint_list: Vec<String>,
    pub joint_retargeting_port_name: String,
    #[serde(flatten)]
    pub smoothing: SmoothingTimes,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VirtualizerConfig {
    pub robot_orientation_port_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ComRetargetingConfig {
    pub com_height_retargeting_port_name: String,
    #[serde(flatten)]
    pub smoothing: SmoothingTimes,
    /// Maps a human CoM displacement to a robot CoM displacement
    pub com_height_scaling_factor: f64,
}

/// Transport backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportBackend {
    /// In-process named mailboxes
    #[default]
    Loopback,
    Udp,
    Zmq,
}

/// Encoding of a numeric vector on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WireEncoding {
    /// Packed little-endian f64
    #[default]
    Binary,
    /// JSON array of numbers
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    pub backend: TransportBackend,
    pub encoding: WireEncoding,
    pub max_message_size: usize,
    /// Port name (`/module/suffix`) to address (`127.0.0.1:7000`, `tcp://...`)
    pub endpoints: BTreeMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backend: TransportBackend::default(),
            encoding: WireEncoding::default(),
            max_message_size: 65_507, // largest UDP payload
            endpoints: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Directory for rolling log files; console only when unset
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
[control]
module_name = "walking"
period = 0.01
controlled_joints = ["torso_pitch", "neck_pitch", "neck_yaw"]

[retargeting]
use_joint_retargeting = true
use_com_retargeting = true
use_virtualizer = true
approaching_phase_duration = 4.0

[retargeting.JOINT_RETARGETING]
retargeting_joint_list = ["neck_yaw", "neck_pitch"]
joint_retargeting_port_name = "/jointPosition:i"
smoothing_time_approaching = 2.0
smoothing_time_walking = 0.5

[retargeting.VIRTUALIZER]
robot_orientation_port_name = "/robotOrientation:o"

[retargeting.COM_RETARGETING]
com_height_retargeting_port_name = "/CoM:i"
smoothing_time_approaching = 3.0
smoothing_time_walking = 1.0
com_height_scaling_factor = 0.5

[transport]
backend = "udp"
encoding = "json"

[transport.endpoints]
"/walking/jointPosition:i" = "127.0.0.1:7001"
"#;

    #[test]
    fn test_full_file_parses() {
        let config: RetargetConfig = toml::from_str(FULL).unwrap();

        assert_eq!(config.control.module_name, "walking");
        assert_eq!(config.control.controlled_joints.len(), 3);
        assert!(config.retargeting.use_joint_retargeting);
        assert!(!config.retargeting.use_hand_retargeting);
        assert_eq!(config.retargeting.approaching_phase_duration, Some(4.0));

        let joint = config.retargeting.joint.as_ref().unwrap();
        assert_eq!(joint.retargeting_joint_list, vec!["neck_yaw", "neck_pitch"]);
        assert_eq!(joint.smoothing.smoothing_time_walking, 0.5);

        let com = config.retargeting.com.as_ref().unwrap();
        assert_eq!(com.com_height_scaling_factor, 0.5);
        assert_eq!(com.smoothing.smoothing_time_approaching, 3.0);

        assert_eq!(config.transport.backend, TransportBackend::Udp);
        assert_eq!(config.transport.encoding, WireEncoding::Json);
        assert_eq!(
            config.transport.endpoints.get("/walking/jointPosition:i").map(String::as_str),
            Some("127.0.0.1:7001")
        );
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: RetargetConfig = toml::from_str("[control]\nperiod = 0.002\n").unwrap();

        assert_eq!(config.control.period, 0.002);
        assert_eq!(config.control.module_name, "walking-coordinator");
        assert_eq!(config.control.bootstrap_attempts, 100);
        assert_eq!(config.transport.backend, TransportBackend::Loopback);
        assert!(config.retargeting.hand.is_none());
    }

    #[test]
    fn test_group_missing_key_is_rejected() {
        let text = r#"
[retargeting.HAND_RETARGETING]
left_hand_transform_port_name = "/leftHand:i"
smoothing_time_approaching = 2.0
smoothing_time_walking = 0.5
"#;
        let err = toml::from_str::<RetargetConfig>(text).unwrap_err();
        assert!(err.to_string().contains("right_hand_transform_port_name"));
    }

    #[test]
    fn test_feature_predicates() {
        let mut retargeting = RetargetingConfig::default();
        assert!(!retargeting.any_enabled());

        retargeting.use_virtualizer = true;
        assert!(retargeting.any_enabled());
        assert!(!retargeting.retargets_motion());

        retargeting.use_com_retargeting = true;
        assert!(retargeting.retargets_motion());
    }
}
