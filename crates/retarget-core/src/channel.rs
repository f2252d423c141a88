// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Smoothed retargeting channels
//!
//! A [`Channel`] binds one transport reader, a raw wire-format buffer, a
//! smoother and a decoded output. The payload-specific parts (wire layout,
//! how a sample lands in the buffer, how the smoother state is decoded) live
//! in a [`ChannelKind`], so hand poses, the joint vector and the CoM height
//! share the same tick loop.
//!
//! Every tick runs read, then advance, then decode. When no sample arrived
//! the buffer keeps the last target (sample-and-hold).

use crate::error::{RetargetingError, RetargetingResult};
use crate::phase::PhaseAction;
use crate::smoother::{MinJerkSmoother, Smoother};
use crate::wire::{
    com_height_from_sample, pose_from_components, pose_vector_to_transform,
    scatter_joint_update, transform_to_pose_vector, JointIndexMap, WireError, POSE_VECTOR_SIZE,
};
use nalgebra::{DVector, Isometry3};
use retarget_config::MIN_SMOOTHING_PERIODS;
use retarget_transports::{Transport, VectorReader};
use tracing::{debug, info, trace, warn};

/// Payload-specific behaviour of a channel
pub trait ChannelKind {
    type Output: Clone;

    /// Number of values in the raw buffer and smoother
    fn raw_size(&self) -> usize;

    /// Output before the first reset
    fn initial_output(&self) -> Self::Output;

    /// Raw-buffer encoding of an output value
    fn encode(&self, value: &Self::Output) -> DVector<f64>;

    /// Fold one wire sample into the raw buffer
    ///
    /// On error the buffer must be left unchanged.
    fn absorb(&self, sample: &[f64], raw: &mut DVector<f64>) -> Result<(), WireError>;

    /// Output for the current smoother state
    fn decode(&self, position: &DVector<f64>, velocity: &DVector<f64>) -> Self::Output;
}

/// Hand pose, exchanged as `[x, y, z, roll, pitch, yaw]`
#[derive(Debug, Clone, Copy, Default)]
pub struct HandPose;

impl ChannelKind for HandPose {
    type Output = Isometry3<f64>;

    fn raw_size(&self) -> usize {
        POSE_VECTOR_SIZE
    }

    fn initial_output(&self) -> Self::Output {
        Isometry3::identity()
    }

    fn encode(&self, value: &Self::Output) -> DVector<f64> {
        DVector::from_row_slice(&transform_to_pose_vector(value))
    }

    fn absorb(&self, sample: &[f64], raw: &mut DVector<f64>) -> Result<(), WireError> {
        pose_vector_to_transform(sample)?;
        raw.copy_from_slice(sample);
        Ok(())
    }

    fn decode(&self, position: &DVector<f64>, _velocity: &DVector<f64>) -> Self::Output {
        pose_from_components(position.as_slice())
    }
}

/// Dense controlled-joint vector fed by sparse updates
#[derive(Debug, Clone)]
pub struct JointVector {
    map: JointIndexMap,
}

impl JointVector {
    pub fn new(map: JointIndexMap) -> Self {
        Self { map }
    }

    pub fn index_map(&self) -> &JointIndexMap {
        &self.map
    }
}

impl ChannelKind for JointVector {
    type Output = DVector<f64>;

    fn raw_size(&self) -> usize {
        self.map.dense_len()
    }

    fn initial_output(&self) -> Self::Output {
        DVector::zeros(self.map.dense_len())
    }

    fn encode(&self, value: &Self::Output) -> DVector<f64> {
        value.clone()
    }

    fn absorb(&self, sample: &[f64], raw: &mut DVector<f64>) -> Result<(), WireError> {
        scatter_joint_update(sample, &self.map, raw.as_mut_slice())
    }

    fn decode(&self, position: &DVector<f64>, _velocity: &DVector<f64>) -> Self::Output {
        position.clone()
    }
}

/// Smoothed CoM height and its rate of change
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComHeightState {
    pub position: f64,
    pub velocity: f64,
}

/// CoM height driven by the operator's height displacement
///
/// A sample `z` maps to `(z - input_offset) * scaling_factor + constant_height`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComHeight {
    pub input_offset: f64,
    pub scaling_factor: f64,
    pub constant_height: f64,
}

impl ComHeight {
    pub fn new(scaling_factor: f64) -> Self {
        Self {
            input_offset: 0.0,
            scaling_factor,
            constant_height: 0.0,
        }
    }

    /// Robot height target for an operator height `z`
    pub fn target_height(&self, z: f64) -> f64 {
        (z - self.input_offset) * self.scaling_factor + self.constant_height
    }
}

impl ChannelKind for ComHeight {
    type Output = ComHeightState;

    fn raw_size(&self) -> usize {
        1
    }

    fn initial_output(&self) -> Self::Output {
        ComHeightState::default()
    }

    fn encode(&self, value: &Self::Output) -> DVector<f64> {
        DVector::from_element(1, value.position)
    }

    fn absorb(&self, sample: &[f64], raw: &mut DVector<f64>) -> Result<(), WireError> {
        raw[0] = self.target_height(com_height_from_sample(sample)?);
        Ok(())
    }

    fn decode(&self, position: &DVector<f64>, velocity: &DVector<f64>) -> Self::Output {
        ComHeightState {
            position: position[0],
            velocity: velocity[0],
        }
    }
}

/// Smoother time constants of a channel (seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeConstants {
    pub approaching: f64,
    pub walking: f64,
}

impl TimeConstants {
    pub fn for_action(&self, action: PhaseAction) -> f64 {
        match action {
            PhaseAction::RetuneApproaching => self.approaching,
            PhaseAction::RetuneWalking => self.walking,
        }
    }
}

/// One smoothed retargeting stream
pub struct Channel<K: ChannelKind> {
    label: String,
    kind: K,
    raw: DVector<f64>,
    smoother: Box<dyn Smoother>,
    time_constants: TimeConstants,
    output: K::Output,
    transport: Option<Box<dyn VectorReader>>,
    read_failing: bool,
}

impl<K: ChannelKind> Channel<K> {
    /// Build a channel whose smoother starts at the approaching time constant
    ///
    /// Fails if either time constant covers fewer than
    /// [`MIN_SMOOTHING_PERIODS`] control periods or the kind has no values.
    pub fn configure(
        label: impl Into<String>,
        kind: K,
        time_constants: TimeConstants,
        period: f64,
        transport: Option<Box<dyn VectorReader>>,
    ) -> RetargetingResult<Self> {
        let label = label.into();
        let raw_size = kind.raw_size();
        if raw_size == 0 {
            return Err(RetargetingError::InvalidChannel {
                channel: label,
                reason: "raw buffer size must be at least 1".to_string(),
            });
        }
        check_time_constants(&label, time_constants, period)?;

        let smoother = MinJerkSmoother::new(raw_size, period, time_constants.approaching)?;
        Ok(Self::assemble(
            label,
            kind,
            time_constants,
            Box::new(smoother),
            transport,
        ))
    }

    /// Build a channel around an existing smoother
    ///
    /// The smoother must have one dimension per raw value of `kind`, and both
    /// time constants must be usable at the smoother's period.
    pub fn with_smoother(
        label: impl Into<String>,
        kind: K,
        time_constants: TimeConstants,
        smoother: Box<dyn Smoother>,
        transport: Option<Box<dyn VectorReader>>,
    ) -> RetargetingResult<Self> {
        let label = label.into();
        if smoother.dimension() != kind.raw_size() {
            return Err(RetargetingError::InvalidChannel {
                channel: label,
                reason: format!(
                    "smoother has {} dimensions, channel needs {}",
                    smoother.dimension(),
                    kind.raw_size()
                ),
            });
        }
        check_time_constants(&label, time_constants, smoother.period())?;

        Ok(Self::assemble(
            label,
            kind,
            time_constants,
            smoother,
            transport,
        ))
    }

    fn assemble(
        label: String,
        kind: K,
        time_constants: TimeConstants,
        smoother: Box<dyn Smoother>,
        transport: Option<Box<dyn VectorReader>>,
    ) -> Self {
        let output = kind.initial_output();
        Self {
            label,
            raw: DVector::zeros(smoother.dimension()),
            kind,
            smoother,
            time_constants,
            output,
            transport,
            read_failing: false,
        }
    }

    /// Seed buffer, smoother and output with `value`
    pub fn reset_to(&mut self, value: K::Output) -> RetargetingResult<()> {
        let raw = self.kind.encode(&value);
        self.smoother.init(&raw)?;
        self.raw = raw;
        self.output = value;
        Ok(())
    }

    /// Non-blocking read of the newest sample
    ///
    /// Transport failures are logged once per failing streak and read as "no
    /// sample".
    pub fn read_sample(&mut self) -> Option<Vec<f64>> {
        let transport = self.transport.as_mut()?;
        match transport.read_latest() {
            Ok(sample) => {
                if self.read_failing {
                    info!("[RETARGET-CHANNEL] {} transport recovered", self.label);
                    self.read_failing = false;
                }
                sample
            }
            Err(e) => {
                if !self.read_failing {
                    warn!("[RETARGET-CHANNEL] {} read failed: {}", self.label, e);
                    self.read_failing = true;
                } else {
                    trace!("[RETARGET-CHANNEL] {} read still failing: {}", self.label, e);
                }
                None
            }
        }
    }

    /// Fold the newest sample, if any, into the raw buffer
    ///
    /// Returns true when the target changed.
    pub fn poll(&mut self) -> bool {
        let Some(sample) = self.read_sample() else {
            return false;
        };
        match self.kind.absorb(&sample, &mut self.raw) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "[RETARGET-CHANNEL] {} discarded malformed sample: {}",
                    self.label, e
                );
                false
            }
        }
    }

    /// Step the smoother toward the raw buffer and refresh the output
    pub fn advance(&mut self) {
        if let Err(e) = self.smoother.advance(&self.raw) {
            warn!("[RETARGET-CHANNEL] {} smoother step failed: {}", self.label, e);
            return;
        }
        self.output = self
            .kind
            .decode(self.smoother.position(), self.smoother.velocity());
    }

    /// One control period: poll, advance, decode
    pub fn tick(&mut self) {
        self.poll();
        self.advance();
    }

    /// Switch the smoother to the time constant matching `action`
    pub fn retune(&mut self, action: PhaseAction) {
        let time_constant = self.time_constants.for_action(action);
        match self.smoother.set_time_constant(time_constant) {
            Ok(()) => debug!(
                "[RETARGET-CHANNEL] {} time constant -> {}s",
                self.label, time_constant
            ),
            Err(e) => warn!("[RETARGET-CHANNEL] {} retune failed: {}", self.label, e),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn output(&self) -> &K::Output {
        &self.output
    }

    pub fn kind(&self) -> &K {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut K {
        &mut self.kind
    }

    /// Current smoother target in wire format
    pub fn raw(&self) -> &DVector<f64> {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut DVector<f64> {
        &mut self.raw
    }

    pub fn time_constants(&self) -> TimeConstants {
        self.time_constants
    }

    /// Time constant the smoother is currently using
    pub fn active_time_constant(&self) -> f64 {
        self.smoother.time_constant()
    }

    /// Name of the transport the channel reads, if any
    pub fn transport_name(&self) -> Option<&str> {
        self.transport.as_deref().map(|t| t.name())
    }

    /// Release the transport; later polls read nothing
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close() {
                warn!("[RETARGET-CHANNEL] {} close failed: {}", self.label, e);
            }
        }
    }
}

fn check_time_constants(
    label: &str,
    time_constants: TimeConstants,
    period: f64,
) -> RetargetingResult<()> {
    let shortest = MIN_SMOOTHING_PERIODS * period;
    for value in [time_constants.approaching, time_constants.walking] {
        if !(value.is_finite() && value >= shortest) {
            return Err(RetargetingError::InvalidTimeConstant {
                channel: label.to_string(),
                value,
            });
        }
    }
    Ok(())
}
