// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Retargeting client
//!
//! Owns every channel, the orientation publisher and the phase machine, and
//! exposes them to the walking controller as one object driven once per
//! control period:
//!
//! ```text
//! initialize -> reset -> (tick -> accessors)* -> close
//! ```
//!
//! Outputs of disabled features are seeded at reset and then held.

use crate::channel::{Channel, ComHeight, ComHeightState, HandPose, JointVector, TimeConstants};
use crate::clock::Clock;
use crate::com_height::ComHeightPolicy;
use crate::error::{RetargetingError, RetargetingResult};
use crate::kinematics::KinematicState;
use crate::phase::{Phase, PhaseAction, PhaseStateMachine};
use crate::retry::RetryStrategy;
use crate::wire::JointIndexMap;
use nalgebra::{DVector, Isometry3, UnitQuaternion};
use retarget_config::{
    transport_name, validate_retargeting, ConfigError, RetargetingConfig, SmoothingTimes,
};
use retarget_transports::{TransportFactory, VectorWriter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default number of reads while waiting for the first CoM height sample
pub const DEFAULT_BOOTSTRAP_ATTEMPTS: u32 = 100;

/// Default delay between two bootstrap reads
pub const DEFAULT_BOOTSTRAP_DELAY: Duration = Duration::from_millis(1);

/// Which retargeting features a client runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetargetingFeatures {
    pub hand: bool,
    pub joint: bool,
    pub virtualizer: bool,
    pub com: bool,
}

impl RetargetingFeatures {
    fn from_config(config: &RetargetingConfig) -> Self {
        Self {
            hand: config.use_hand_retargeting,
            joint: config.use_joint_retargeting,
            virtualizer: config.use_virtualizer,
            com: config.use_com_retargeting,
        }
    }

    pub fn any(&self) -> bool {
        self.hand || self.joint || self.virtualizer || self.com
    }
}

struct HandChannels {
    left: Channel<HandPose>,
    right: Channel<HandPose>,
}

impl From<SmoothingTimes> for TimeConstants {
    fn from(smoothing: SmoothingTimes) -> Self {
        Self {
            approaching: smoothing.smoothing_time_approaching,
            walking: smoothing.smoothing_time_walking,
        }
    }
}

fn missing(group: &str) -> RetargetingError {
    RetargetingError::Config(ConfigError::MissingRequired(group.to_string()))
}

pub struct RetargetingClient {
    module_name: String,
    features: RetargetingFeatures,
    hands: Option<HandChannels>,
    joints: Option<Channel<JointVector>>,
    com: Option<ComHeightPolicy>,
    orientation: Option<Box<dyn VectorWriter>>,
    phase: PhaseStateMachine,
    clock: Arc<dyn Clock>,
    bootstrap: RetryStrategy,

    // Held outputs of disabled features
    left_hand: Isometry3<f64>,
    right_hand: Isometry3<f64>,
    joint_values: DVector<f64>,
    com_state: ComHeightState,

    closed: bool,
}

impl RetargetingClient {
    /// Build every enabled channel and open its transport
    ///
    /// Transport names are `"/" + module_name + suffix`. With no feature
    /// enabled the client is a pass-through that never opens a transport.
    ///
    /// # Errors
    ///
    /// Configuration problems (including hand and joint retargeting both
    /// requested and retargeted joints missing from `controlled_joints`)
    /// fail before any transport is opened.
    pub fn initialize(
        config: &RetargetingConfig,
        module_name: &str,
        period: f64,
        controlled_joints: &[String],
        transports: &dyn TransportFactory,
        clock: Arc<dyn Clock>,
    ) -> RetargetingResult<Self> {
        if let Err(e) = validate_retargeting(config, period) {
            error!("[RETARGET-CLIENT] Invalid retargeting configuration: {}", e);
            return Err(e.into());
        }

        let features = RetargetingFeatures::from_config(config);
        let mut client = Self {
            module_name: module_name.to_string(),
            features,
            hands: None,
            joints: None,
            com: None,
            orientation: None,
            phase: PhaseStateMachine::disabled(),
            clock,
            bootstrap: RetryStrategy::new(DEFAULT_BOOTSTRAP_DELAY, DEFAULT_BOOTSTRAP_ATTEMPTS),
            left_hand: Isometry3::identity(),
            right_hand: Isometry3::identity(),
            joint_values: DVector::zeros(controlled_joints.len()),
            com_state: ComHeightState::default(),
            closed: false,
        };

        if !features.any() {
            info!("[RETARGET-CLIENT] No retargeting feature enabled, running as pass-through");
            return Ok(client);
        }

        // Resolve joints first so a bad list fails before any transport opens
        let joint_map = if features.joint {
            let joint = config.joint.as_ref().ok_or_else(|| missing("JOINT_RETARGETING"))?;
            Some(JointIndexMap::resolve(
                &joint.retargeting_joint_list,
                controlled_joints,
            )?)
        } else {
            None
        };

        if features.hand {
            let hand = config.hand.as_ref().ok_or_else(|| missing("HAND_RETARGETING"))?;
            let constants = TimeConstants::from(hand.smoothing);
            let left_name = transport_name(module_name, &hand.left_hand_transform_port_name);
            let right_name = transport_name(module_name, &hand.right_hand_transform_port_name);

            let left = Channel::configure(
                "left hand",
                HandPose,
                constants,
                period,
                Some(transports.open_reader(&left_name)?),
            )?;
            let right = Channel::configure(
                "right hand",
                HandPose,
                constants,
                period,
                Some(transports.open_reader(&right_name)?),
            )?;
            client.hands = Some(HandChannels { left, right });
            info!(
                "[RETARGET-CLIENT] Hand retargeting on {} and {}",
                left_name, right_name
            );
        }

        if let (Some(map), Some(joint)) = (joint_map, config.joint.as_ref()) {
            let name = transport_name(module_name, &joint.joint_retargeting_port_name);
            let retargeted = map.len();
            let channel = Channel::configure(
                "joints",
                JointVector::new(map),
                TimeConstants::from(joint.smoothing),
                period,
                Some(transports.open_reader(&name)?),
            )?;
            client.joints = Some(channel);
            info!(
                "[RETARGET-CLIENT] Joint retargeting on {} ({} of {} joints)",
                name,
                retargeted,
                controlled_joints.len()
            );
        }

        if features.virtualizer {
            let virtualizer = config
                .virtualizer
                .as_ref()
                .ok_or_else(|| missing("VIRTUALIZER"))?;
            let name = transport_name(module_name, &virtualizer.robot_orientation_port_name);
            client.orientation = Some(transports.open_writer(&name)?);
            info!("[RETARGET-CLIENT] Publishing robot orientation on {}", name);
        }

        if features.com {
            let com = config.com.as_ref().ok_or_else(|| missing("COM_RETARGETING"))?;
            let name = transport_name(module_name, &com.com_height_retargeting_port_name);
            let channel = Channel::configure(
                "CoM height",
                ComHeight::new(com.com_height_scaling_factor),
                TimeConstants::from(com.smoothing),
                period,
                Some(transports.open_reader(&name)?),
            )?;
            client.com = Some(ComHeightPolicy::new(channel));
            info!(
                "[RETARGET-CLIENT] CoM height retargeting on {} (scaling {})",
                name, com.com_height_scaling_factor
            );
        }

        if config.retargets_motion() {
            let duration = config
                .approaching_phase_duration
                .ok_or_else(|| missing("approaching_phase_duration"))?;
            client.phase = PhaseStateMachine::new(duration);
        }

        debug!(
            "[RETARGET-CLIENT] Initialized for module {} with {:?}, phase {}",
            client.module_name,
            features,
            client.phase.phase()
        );
        Ok(client)
    }

    /// Override the CoM bootstrap budget (default 100 reads, 1 ms apart)
    pub fn with_bootstrap_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.bootstrap = RetryStrategy::new(delay, attempts);
        self
    }

    /// Seed every output from the robot state and bootstrap the CoM offset
    ///
    /// Hand transforms are expressed in the head frame. Only enabled
    /// channels have their smoothers seeded.
    pub fn reset(&mut self, kinematics: &dyn KinematicState) -> RetargetingResult<()> {
        let head_inverse = kinematics.head_to_world().inverse();
        self.left_hand = head_inverse * kinematics.left_hand_to_world();
        self.right_hand = head_inverse * kinematics.right_hand_to_world();
        if let Some(hands) = self.hands.as_mut() {
            hands.left.reset_to(self.left_hand)?;
            hands.right.reset_to(self.right_hand)?;
        }

        let joint_positions = kinematics.joint_positions();
        if let Some(joints) = self.joints.as_mut() {
            let expected = joints.kind().index_map().dense_len();
            if joint_positions.len() != expected {
                return Err(RetargetingError::DimensionMismatch {
                    context: "controlled joint positions".to_string(),
                    expected,
                    actual: joint_positions.len(),
                });
            }
            joints.reset_to(joint_positions.clone())?;
        }
        self.joint_values = joint_positions;

        let height = kinematics.com_position().z;
        self.com_state = ComHeightState {
            position: height,
            velocity: 0.0,
        };
        if let Some(com) = self.com.as_mut() {
            com.reset(height, &mut self.bootstrap, self.clock.as_ref())?;
        }

        debug!("[RETARGET-CLIENT] Reset complete, phase {}", self.phase.phase());
        Ok(())
    }

    /// Advance every enabled channel by one control period
    ///
    /// Never fails: missing or malformed samples keep the previous target.
    pub fn tick(&mut self) {
        if let Some(hands) = self.hands.as_mut() {
            hands.left.tick();
            hands.right.tick();
        }

        if let Some(joints) = self.joints.as_mut() {
            joints.tick();
        }

        if let Some(com) = self.com.as_mut() {
            com.tick(self.phase.phase());
        }

        if let Some(action) = self.phase.step(self.clock.now()) {
            info!("[RETARGET-CLIENT] Approaching phase expired");
            self.apply(action);
        }
    }

    fn apply(&mut self, action: PhaseAction) {
        if let Some(hands) = self.hands.as_mut() {
            hands.left.retune(action);
            hands.right.retune(action);
        }
        if let Some(joints) = self.joints.as_mut() {
            joints.retune(action);
        }
        if let Some(com) = self.com.as_mut() {
            com.retune(action);
        }
    }

    /// Start (or restart) the approach timer
    ///
    /// No-op unless hand, joint or CoM retargeting is enabled.
    pub fn start_approaching_phase(&mut self) {
        if let Some(action) = self.phase.start_approaching(self.clock.now()) {
            info!(
                "[RETARGET-CLIENT] Approaching phase started ({}s)",
                self.phase.approach_duration()
            );
            self.apply(action);
        }
    }

    pub fn set_phase(&mut self, phase: Phase) {
        let previous = self.phase.phase();
        let action = self.phase.request(phase, self.clock.now());
        if let Some(action) = action {
            self.apply(action);
        }
        if previous != self.phase.phase() {
            debug!("[RETARGET-CLIENT] Phase {} -> {}", previous, self.phase.phase());
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase.phase()
    }

    pub fn is_approaching_phase(&self) -> bool {
        self.phase.is_approaching()
    }

    /// Publish the robot base yaw for the virtualizer
    ///
    /// No-op when the virtualizer is disabled. Write failures are logged.
    pub fn set_robot_base_orientation(&mut self, orientation: &UnitQuaternion<f64>) {
        let Some(writer) = self.orientation.as_mut() else {
            return;
        };
        let (_, _, yaw) = orientation.euler_angles();
        if let Err(e) = writer.write(&[yaw]) {
            warn!(
                "[RETARGET-CLIENT] Failed to publish robot orientation on {}: {}",
                writer.name(),
                e
            );
        }
    }

    /// Smoothed left hand pose in the head frame
    pub fn left_hand_transform(&self) -> Isometry3<f64> {
        match &self.hands {
            Some(hands) => *hands.left.output(),
            None => self.left_hand,
        }
    }

    /// Smoothed right hand pose in the head frame
    pub fn right_hand_transform(&self) -> Isometry3<f64> {
        match &self.hands {
            Some(hands) => *hands.right.output(),
            None => self.right_hand,
        }
    }

    /// Smoothed positions of every controlled joint
    pub fn joint_values(&self) -> &DVector<f64> {
        match &self.joints {
            Some(joints) => joints.output(),
            None => &self.joint_values,
        }
    }

    pub fn com_height(&self) -> f64 {
        self.com_state_now().position
    }

    pub fn com_height_velocity(&self) -> f64 {
        self.com_state_now().velocity
    }

    fn com_state_now(&self) -> ComHeightState {
        match &self.com {
            Some(com) => com.state(),
            None => self.com_state,
        }
    }

    pub fn features(&self) -> RetargetingFeatures {
        self.features
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }

    /// Time constant currently used by each enabled channel
    pub fn active_time_constants(&self) -> Vec<(&str, f64)> {
        let mut constants = Vec::new();
        if let Some(hands) = &self.hands {
            constants.push((hands.left.label(), hands.left.active_time_constant()));
            constants.push((hands.right.label(), hands.right.active_time_constant()));
        }
        if let Some(joints) = &self.joints {
            constants.push((joints.label(), joints.active_time_constant()));
        }
        if let Some(com) = &self.com {
            let channel = com.channel();
            constants.push((channel.label(), channel.active_time_constant()));
        }
        constants
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release every transport; safe to call more than once
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        if let Some(hands) = self.hands.as_mut() {
            hands.left.close();
            hands.right.close();
        }
        if let Some(joints) = self.joints.as_mut() {
            joints.close();
        }
        if let Some(com) = self.com.as_mut() {
            com.close();
        }
        if let Some(mut writer) = self.orientation.take() {
            if let Err(e) = writer.close() {
                warn!("[RETARGET-CLIENT] Failed to close {}: {}", writer.name(), e);
            }
        }
        self.closed = true;
        debug!("[RETARGET-CLIENT] Closed");
    }
}

impl Drop for RetargetingClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::kinematics::StaticKinematics;
    use retarget_config::{ComRetargetingConfig, VirtualizerConfig};
    use retarget_transports::LoopbackHub;

    fn joints(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn com_config() -> RetargetingConfig {
        RetargetingConfig {
            use_com_retargeting: true,
            approaching_phase_duration: Some(2.0),
            com: Some(ComRetargetingConfig {
                com_height_retargeting_port_name: "/CoM:i".to_string(),
                smoothing: SmoothingTimes {
                    smoothing_time_approaching: 1.0,
                    smoothing_time_walking: 0.2,
                },
                com_height_scaling_factor: 2.0,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_client_is_pass_through() {
        let hub = LoopbackHub::new();
        let clock = Arc::new(ManualClock::new(0.0));
        let mut client = RetargetingClient::initialize(
            &RetargetingConfig::default(),
            "walking",
            0.01,
            &joints(&["a", "b"]),
            &hub,
            clock,
        )
        .unwrap();

        assert!(!client.features().any());
        assert_eq!(client.phase(), Phase::Stance);
        assert_eq!(client.joint_values().len(), 2);

        let state = StaticKinematics::new(2)
            .with_joint_positions(DVector::from_vec(vec![0.3, 0.4]))
            .with_com_height(0.55);
        client.reset(&state).unwrap();
        client.tick();

        assert_eq!(client.joint_values().as_slice(), &[0.3, 0.4]);
        assert_eq!(client.com_height(), 0.55);
        assert!(client.active_time_constants().is_empty());
    }

    #[test]
    fn test_missing_group_is_config_error() {
        let hub = LoopbackHub::new();
        let mut config = com_config();
        config.com = None;
        let result = RetargetingClient::initialize(
            &config,
            "walking",
            0.01,
            &[],
            &hub,
            Arc::new(ManualClock::new(0.0)),
        );
        assert!(matches!(result, Err(e) if e.is_config_error()));
    }

    #[test]
    fn test_bootstrap_budget_is_configurable() {
        let hub = LoopbackHub::new();
        let clock = ManualClock::new(0.0);
        let mut client = RetargetingClient::initialize(
            &com_config(),
            "walking",
            0.01,
            &[],
            &hub,
            Arc::new(clock.clone()),
        )
        .unwrap()
        .with_bootstrap_retry(5, Duration::from_millis(2));

        let result = client.reset(&StaticKinematics::new(0).with_com_height(0.5));

        match &result {
            Err(RetargetingError::BootstrapTimeout {
                transport,
                attempts,
            }) => {
                assert_eq!(transport, "/walking/CoM:i");
                assert_eq!(*attempts, 5);
            }
            _ => panic!("expected BootstrapTimeout"),
        }
        assert_eq!(clock.sleep_count(), 5);
        assert!(result.unwrap_err().is_retryable());
    }

    #[test]
    fn test_virtualizer_only_client_publishes_yaw() {
        let hub = LoopbackHub::new();
        let config = RetargetingConfig {
            use_virtualizer: true,
            approaching_phase_duration: Some(1.0),
            virtualizer: Some(VirtualizerConfig {
                robot_orientation_port_name: "/robotOrientation:o".to_string(),
            }),
            ..Default::default()
        };
        let mut client = RetargetingClient::initialize(
            &config,
            "walking",
            0.01,
            &[],
            &hub,
            Arc::new(ManualClock::new(0.0)),
        )
        .unwrap();

        // Virtualizer alone never enters the approaching phase
        client.start_approaching_phase();
        assert_eq!(client.phase(), Phase::Stance);

        client.set_robot_base_orientation(&UnitQuaternion::from_euler_angles(0.1, 0.2, 0.7));
        let published = hub.take("/walking/robotOrientation:o").unwrap();
        assert_eq!(published.len(), 1);
        assert!((published[0] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_close_is_idempotent() {
        let hub = LoopbackHub::new();
        let mut client = RetargetingClient::initialize(
            &com_config(),
            "walking",
            0.01,
            &[],
            &hub,
            Arc::new(ManualClock::new(0.0)),
        )
        .unwrap();

        client.close();
        client.close();
        assert!(client.is_closed());

        // Closed channels read nothing; ticking keeps the held value
        client.tick();
        assert_eq!(client.com_height(), 0.0);
    }
}
