// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # retarget-core
//!
//! Smoothing and phase gating of operator motion streams for a humanoid
//! walking controller. Each enabled feature (hand poses, a joint subset, the
//! CoM height) is a [`Channel`] fed by a non-blocking transport and filtered
//! by a minimum-jerk smoother; a [`PhaseStateMachine`] switches every channel
//! between slow approach smoothing and walking smoothing.
//!
//! ## Example
//!
//! ```
//! use retarget_core::prelude::*;
//! use retarget_config::{ComRetargetingConfig, RetargetingConfig, SmoothingTimes};
//! use retarget_transports::LoopbackHub;
//! use std::sync::Arc;
//!
//! let config = RetargetingConfig {
//!     use_com_retargeting: true,
//!     approaching_phase_duration: Some(2.0),
//!     com: Some(ComRetargetingConfig {
//!         com_height_retargeting_port_name: "/CoM:i".to_string(),
//!         smoothing: SmoothingTimes {
//!             smoothing_time_approaching: 1.0,
//!             smoothing_time_walking: 0.5,
//!         },
//!         com_height_scaling_factor: 1.0,
//!     }),
//!     ..Default::default()
//! };
//!
//! let hub = LoopbackHub::new();
//! let clock = Arc::new(ManualClock::new(0.0));
//! let mut client =
//!     RetargetingClient::initialize(&config, "walking", 0.01, &[], &hub, clock.clone())?;
//!
//! hub.publish("/walking/CoM:i", &[0.0, 0.0, 1.0]);
//! client.reset(&StaticKinematics::new(0).with_com_height(0.6))?;
//! client.start_approaching_phase();
//!
//! for _ in 0..10 {
//!     client.tick();
//!     clock.advance(0.01);
//! }
//! assert!(client.is_approaching_phase());
//! # Ok::<(), RetargetingError>(())
//! ```

pub mod channel;
pub mod client;
pub mod clock;
pub mod com_height;
pub mod error;
pub mod kinematics;
pub mod phase;
pub mod retry;
pub mod smoother;
pub mod wire;

pub use channel::{
    Channel, ChannelKind, ComHeight, ComHeightState, HandPose, JointVector, TimeConstants,
};
pub use client::{
    RetargetingClient, RetargetingFeatures, DEFAULT_BOOTSTRAP_ATTEMPTS, DEFAULT_BOOTSTRAP_DELAY,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use com_height::ComHeightPolicy;
pub use error::{RetargetingError, RetargetingResult};
pub use kinematics::{KinematicState, StaticKinematics};
pub use phase::{Phase, PhaseAction, PhaseStateMachine};
pub use retry::{retry_until, RetryExhausted, RetryStrategy};
pub use smoother::{MinJerkSmoother, Smoother};
pub use wire::{
    com_height_from_sample, pose_vector_to_transform, scatter_joint_update,
    transform_to_pose_vector, JointIndexMap, WireError,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use crate::client::{RetargetingClient, RetargetingFeatures};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::error::{RetargetingError, RetargetingResult};
    pub use crate::kinematics::{KinematicState, StaticKinematics};
    pub use crate::phase::Phase;
}
