//! Configuration validation
//!
//! This module provides validation logic to ensure configuration values are
//! consistent, within valid ranges, and don't conflict with each other.

use crate::{
    ConfigError, ConfigResult, ControlConfig, RetargetConfig, RetargetingConfig, SmoothingTimes,
    TransportBackend,
};
use std::collections::HashSet;

/// Shortest smoothing time constant, in control periods
///
/// Below this the discretised min-jerk filter rings and overshoots its target.
pub const MIN_SMOOTHING_PERIODS: f64 = 3.0;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    DuplicateJoint { field: String, joint: String },
    MissingEndpoint { transport: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::DuplicateJoint { field, joint } => {
                write!(f, "Joint '{}' listed more than once in {}", joint, field)
            }
            Self::MissingEndpoint { transport } => {
                write!(f, "No endpoint configured for transport {}", transport)
            }
        }
    }
}

/// Build the full transport name of a feature (`"/" + module_name + suffix`)
pub fn transport_name(module_name: &str, suffix: &str) -> String {
    format!("/{}{}", module_name, suffix)
}

/// Validate the complete configuration
///
/// Checks for:
/// - Control loop values (period, bootstrap retry budget)
/// - Everything [`validate_retargeting`] checks
/// - An endpoint for every enabled transport when a network backend is selected
///
/// # Errors
///
/// Returns `ConfigError::MutuallyExclusive` when hand and joint retargeting are
/// both requested, and `ConfigError::ValidationError` listing every other problem.
pub fn validate_config(config: &RetargetConfig) -> ConfigResult<()> {
    check_mutual_exclusion(&config.retargeting)?;

    let mut errors = Vec::new();
    validate_control(&config.control, &mut errors);
    validate_features(&config.retargeting, config.control.period, &mut errors);
    validate_endpoints(config, &mut errors);

    into_result(errors)
}

/// Validate the retargeting section on its own
///
/// Used by the retargeting client at initialization, where only this section
/// and the control period are available.
pub fn validate_retargeting(retargeting: &RetargetingConfig, period: f64) -> ConfigResult<()> {
    check_mutual_exclusion(retargeting)?;

    let mut errors = Vec::new();
    check_positive("control.period", period, &mut errors);
    validate_features(retargeting, period, &mut errors);
    into_result(errors)
}

fn check_mutual_exclusion(retargeting: &RetargetingConfig) -> ConfigResult<()> {
    if retargeting.use_hand_retargeting && retargeting.use_joint_retargeting {
        return Err(ConfigError::MutuallyExclusive(
            "use_hand_retargeting".to_string(),
            "use_joint_retargeting".to_string(),
        ));
    }
    Ok(())
}

fn into_result(errors: Vec<ConfigValidationError>) -> ConfigResult<()> {
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

fn validate_control(control: &ControlConfig, errors: &mut Vec<ConfigValidationError>) {
    check_positive("control.period", control.period, errors);
    check_non_empty("control.module_name", &control.module_name, errors);

    if control.bootstrap_attempts == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "control.bootstrap_attempts".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    check_unique("control.controlled_joints", &control.controlled_joints, errors);
}

fn validate_features(
    retargeting: &RetargetingConfig,
    period: f64,
    errors: &mut Vec<ConfigValidationError>,
) {
    if !retargeting.any_enabled() {
        return;
    }

    match retargeting.approaching_phase_duration {
        Some(duration) => check_positive("retargeting.approaching_phase_duration", duration, errors),
        None => errors.push(missing("retargeting.approaching_phase_duration")),
    }

    if retargeting.use_hand_retargeting {
        match &retargeting.hand {
            Some(hand) => {
                check_non_empty(
                    "HAND_RETARGETING.left_hand_transform_port_name",
                    &hand.left_hand_transform_port_name,
                    errors,
                );
                check_non_empty(
                    "HAND_RETARGETING.right_hand_transform_port_name",
                    &hand.right_hand_transform_port_name,
                    errors,
                );
                check_smoothing("HAND_RETARGETING", &hand.smoothing, period, errors);
            }
            None => errors.push(missing("retargeting.HAND_RETARGETING")),
        }
    }

    if retargeting.use_joint_retargeting {
        match &retargeting.joint {
            Some(joint) => {
                check_non_empty(
                    "JOINT_RETARGETING.joint_retargeting_port_name",
                    &joint.joint_retargeting_port_name,
                    errors,
                );
                if joint.retargeting_joint_list.is_empty() {
                    errors.push(ConfigValidationError::InvalidValue {
                        field: "JOINT_RETARGETING.retargeting_joint_list".to_string(),
                        reason: "must list at least one joint".to_string(),
                    });
                }
                check_unique(
                    "JOINT_RETARGETING.retargeting_joint_list",
                    &joint.retargeting_joint_list,
                    errors,
                );
                check_smoothing("JOINT_RETARGETING", &joint.smoothing, period, errors);
            }
            None => errors.push(missing("retargeting.JOINT_RETARGETING")),
        }
    }

    if retargeting.use_virtualizer {
        match &retargeting.virtualizer {
            Some(virtualizer) => check_non_empty(
                "VIRTUALIZER.robot_orientation_port_name",
                &virtualizer.robot_orientation_port_name,
                errors,
            ),
            None => errors.push(missing("retargeting.VIRTUALIZER")),
        }
    }

    if retargeting.use_com_retargeting {
        match &retargeting.com {
            Some(com) => {
                check_non_empty(
                    "COM_RETARGETING.com_height_retargeting_port_name",
                    &com.com_height_retargeting_port_name,
                    errors,
                );
                check_smoothing("COM_RETARGETING", &com.smoothing, period, errors);
                if !com.com_height_scaling_factor.is_finite() {
                    errors.push(ConfigValidationError::InvalidValue {
                        field: "COM_RETARGETING.com_height_scaling_factor".to_string(),
                        reason: "must be a finite number".to_string(),
                    });
                }
            }
            None => errors.push(missing("retargeting.COM_RETARGETING")),
        }
    }
}

/// Network backends need an address for every transport the client will open
fn validate_endpoints(config: &RetargetConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.transport.backend == TransportBackend::Loopback {
        return;
    }

    let module_name = &config.control.module_name;
    let retargeting = &config.retargeting;
    let mut suffixes: Vec<&str> = Vec::new();

    if retargeting.use_hand_retargeting {
        if let Some(hand) = &retargeting.hand {
            suffixes.push(&hand.left_hand_transform_port_name);
            suffixes.push(&hand.right_hand_transform_port_name);
        }
    }
    if retargeting.use_joint_retargeting {
        if let Some(joint) = &retargeting.joint {
            suffixes.push(&joint.joint_retargeting_port_name);
        }
    }
    if retargeting.use_virtualizer {
        if let Some(virtualizer) = &retargeting.virtualizer {
            suffixes.push(&virtualizer.robot_orientation_port_name);
        }
    }
    if retargeting.use_com_retargeting {
        if let Some(com) = &retargeting.com {
            suffixes.push(&com.com_height_retargeting_port_name);
        }
    }

    for suffix in suffixes {
        let transport = transport_name(module_name, suffix);
        if !config.transport.endpoints.contains_key(&transport) {
            errors.push(ConfigValidationError::MissingEndpoint { transport });
        }
    }
}

fn check_smoothing(
    group: &str,
    smoothing: &SmoothingTimes,
    period: f64,
    errors: &mut Vec<ConfigValidationError>,
) {
    let times = [
        ("smoothing_time_approaching", smoothing.smoothing_time_approaching),
        ("smoothing_time_walking", smoothing.smoothing_time_walking),
    ];
    for (name, value) in times {
        let field = format!("{}.{}", group, name);
        if !(value > 0.0) || !value.is_finite() {
            check_positive(&field, value, errors);
            continue;
        }
        // A bad period is reported on its own
        if period > 0.0 && period.is_finite() && value < MIN_SMOOTHING_PERIODS * period {
            errors.push(ConfigValidationError::InvalidValue {
                field,
                reason: format!(
                    "{}s is shorter than {} control periods ({}s)",
                    value,
                    MIN_SMOOTHING_PERIODS,
                    MIN_SMOOTHING_PERIODS * period
                ),
            });
        }
    }
}

fn check_positive(field: &str, value: f64, errors: &mut Vec<ConfigValidationError>) {
    // NaN fails this comparison too
    if !(value > 0.0) || !value.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("{} must be a positive number of seconds", value),
        });
    }
}

fn check_non_empty(field: &str, value: &str, errors: &mut Vec<ConfigValidationError>) {
    if value.trim().is_empty() {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: "cannot be empty".to_string(),
        });
    }
}

fn check_unique(field: &str, names: &[String], errors: &mut Vec<ConfigValidationError>) {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.as_str()) {
            errors.push(ConfigValidationError::DuplicateJoint {
                field: field.to_string(),
                joint: name.clone(),
            });
        }
    }
}

fn missing(field: &str) -> ConfigValidationError {
    ConfigValidationError::MissingRequired {
        field: field.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComRetargetingConfig, HandRetargetingConfig, JointRetargetingConfig};

    const PERIOD: f64 = 0.01;

    fn smoothing(approaching: f64, walking: f64) -> SmoothingTimes {
        SmoothingTimes {
            smoothing_time_approaching: approaching,
            smoothing_time_walking: walking,
        }
    }

    fn hand_config() -> HandRetargetingConfig {
        HandRetargetingConfig {
            left_hand_transform_port_name: "/leftHandDesiredPose:i".to_string(),
            right_hand_transform_port_name: "/rightHandDesiredPose:i".to_string(),
            smoothing: smoothing(2.0, 0.5),
        }
    }

    fn joint_config() -> JointRetargetingConfig {
        JointRetargetingConfig {
            retargeting_joint_list: vec!["neck_pitch".to_string(), "neck_yaw".to_string()],
            joint_retargeting_port_name: "/jointPosition:i".to_string(),
            smoothing: smoothing(2.0, 0.5),
        }
    }

    #[test]
    fn test_disabled_config_is_valid() {
        assert!(validate_retargeting(&RetargetingConfig::default(), PERIOD).is_ok());
    }

    #[test]
    fn test_hand_and_joint_are_mutually_exclusive() {
        let retargeting = RetargetingConfig {
            use_hand_retargeting: true,
            use_joint_retargeting: true,
            approaching_phase_duration: Some(1.0),
            hand: Some(hand_config()),
            joint: Some(joint_config()),
            ..Default::default()
        };

        let result = validate_retargeting(&retargeting, PERIOD);
        assert!(matches!(result, Err(ConfigError::MutuallyExclusive(_, _))));
    }

    #[test]
    fn test_enabled_feature_requires_duration_and_group() {
        let retargeting = RetargetingConfig {
            use_com_retargeting: true,
            ..Default::default()
        };

        let err = validate_retargeting(&retargeting, PERIOD).unwrap_err().to_string();
        assert!(err.contains("approaching_phase_duration"));
        assert!(err.contains("COM_RETARGETING"));
    }

    #[test]
    fn test_non_positive_time_constants_are_reported() {
        let retargeting = RetargetingConfig {
            use_com_retargeting: true,
            approaching_phase_duration: Some(2.0),
            com: Some(ComRetargetingConfig {
                com_height_retargeting_port_name: "/CoM:i".to_string(),
                smoothing: smoothing(0.0, -1.0),
                com_height_scaling_factor: 1.0,
            }),
            ..Default::default()
        };

        let err = validate_retargeting(&retargeting, PERIOD).unwrap_err().to_string();
        assert!(err.contains("COM_RETARGETING.smoothing_time_approaching"));
        assert!(err.contains("COM_RETARGETING.smoothing_time_walking"));
    }

    #[test]
    fn test_time_constant_below_three_periods_is_reported() {
        let com = |approaching: f64| ComRetargetingConfig {
            com_height_retargeting_port_name: "/CoM:i".to_string(),
            smoothing: smoothing(approaching, 0.5),
            com_height_scaling_factor: 1.0,
        };
        let mut retargeting = RetargetingConfig {
            use_com_retargeting: true,
            approaching_phase_duration: Some(2.0),
            com: Some(com(MIN_SMOOTHING_PERIODS * PERIOD)),
            ..Default::default()
        };
        assert!(validate_retargeting(&retargeting, PERIOD).is_ok());

        retargeting.com = Some(com(0.029));
        let err = validate_retargeting(&retargeting, PERIOD)
            .unwrap_err()
            .to_string();
        assert!(err.contains("COM_RETARGETING.smoothing_time_approaching"));
        assert!(!err.contains("smoothing_time_walking"));

        // Same time constant is fine at a faster control rate
        assert!(validate_retargeting(&retargeting, 0.005).is_ok());
    }

    #[test]
    fn test_invalid_period_is_reported_once() {
        let err = validate_retargeting(&RetargetingConfig::default(), 0.0)
            .unwrap_err()
            .to_string();
        assert_eq!(err.matches("control.period").count(), 1);
    }

    #[test]
    fn test_duplicate_retargeted_joint_is_reported() {
        let mut joint = joint_config();
        joint.retargeting_joint_list.push("neck_pitch".to_string());
        let retargeting = RetargetingConfig {
            use_joint_retargeting: true,
            approaching_phase_duration: Some(2.0),
            joint: Some(joint),
            ..Default::default()
        };

        let err = validate_retargeting(&retargeting, PERIOD).unwrap_err().to_string();
        assert!(err.contains("'neck_pitch' listed more than once"));
    }

    #[test]
    fn test_network_backend_requires_endpoints() {
        let mut config = RetargetConfig::default();
        config.control.module_name = "walking".to_string();
        config.retargeting = RetargetingConfig {
            use_hand_retargeting: true,
            approaching_phase_duration: Some(2.0),
            hand: Some(hand_config()),
            ..Default::default()
        };
        config.transport.backend = TransportBackend::Udp;
        config.transport.endpoints.insert(
            "/walking/leftHandDesiredPose:i".to_string(),
            "127.0.0.1:7000".to_string(),
        );

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("/walking/rightHandDesiredPose:i"));
        assert!(!err.contains("/walking/leftHandDesiredPose:i"));
    }

    #[test]
    fn test_control_values_are_checked() {
        let mut config = RetargetConfig::default();
        config.control.period = 0.0;
        config.control.bootstrap_attempts = 0;

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("control.period"));
        assert!(err.contains("control.bootstrap_attempts"));
    }

    #[test]
    fn test_transport_name() {
        assert_eq!(transport_name("walking", "/CoM:i"), "/walking/CoM:i");
    }
}
