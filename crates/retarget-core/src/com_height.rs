// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CoM height retargeting
//!
//! Outside of walking the robot CoM height follows the operator's height
//! displacement relative to the first sample seen at reset, scaled and added
//! to the robot's own height at reset. While walking the height is pinned to
//! the reset height and the transport is not read.

use crate::channel::{Channel, ComHeight, ComHeightState};
use crate::clock::Clock;
use crate::error::{RetargetingError, RetargetingResult};
use crate::phase::{Phase, PhaseAction};
use crate::retry::{retry_until, RetryStrategy};
use crate::wire::com_height_from_sample;
use tracing::{error, info};

pub struct ComHeightPolicy {
    channel: Channel<ComHeight>,
}

impl ComHeightPolicy {
    pub fn new(channel: Channel<ComHeight>) -> Self {
        Self { channel }
    }

    /// Capture the robot height and bootstrap the operator offset
    ///
    /// Blocks for at most the retry budget while waiting for the first
    /// operator sample.
    pub fn reset(
        &mut self,
        robot_height: f64,
        retry: &mut RetryStrategy,
        clock: &dyn Clock,
    ) -> RetargetingResult<()> {
        self.channel.kind_mut().constant_height = robot_height;
        self.channel.reset_to(ComHeightState {
            position: robot_height,
            velocity: 0.0,
        })?;

        let transport = self
            .channel
            .transport_name()
            .unwrap_or_else(|| self.channel.label())
            .to_string();

        retry.reset();
        let channel = &mut self.channel;
        let offset = retry_until(
            || {
                channel
                    .read_sample()
                    .and_then(|sample| com_height_from_sample(&sample).ok())
            },
            retry,
            clock,
            &transport,
        )
        .map_err(|exhausted| {
            error!(
                "[RETARGET-COM] The CoM height is not coming from {}",
                transport
            );
            RetargetingError::BootstrapTimeout {
                transport: transport.clone(),
                attempts: exhausted.attempts,
            }
        })?;

        self.channel.kind_mut().input_offset = offset;
        info!(
            "[RETARGET-COM] Operator height offset {:.4} m, robot height {:.4} m",
            offset, robot_height
        );
        Ok(())
    }

    /// Advance one control period for the given phase
    pub fn tick(&mut self, phase: Phase) {
        if phase == Phase::Walking {
            let constant = self.channel.kind().constant_height;
            self.channel.raw_mut()[0] = constant;
        } else {
            self.channel.poll();
        }
        self.channel.advance();
    }

    pub fn retune(&mut self, action: PhaseAction) {
        self.channel.retune(action);
    }

    pub fn state(&self) -> ComHeightState {
        *self.channel.output()
    }

    /// Current smoother target
    pub fn target(&self) -> f64 {
        self.channel.raw()[0]
    }

    pub fn params(&self) -> &ComHeight {
        self.channel.kind()
    }

    pub fn channel(&self) -> &Channel<ComHeight> {
        &self.channel
    }

    pub fn close(&mut self) {
        self.channel.close();
    }
}
