//! # retarget - teleoperation retargeting for humanoid walking controllers
//!
//! Turns operator motion streams (hand poses, a subset of joint angles, the
//! CoM height) into smoothed, phase-gated targets that a walking controller
//! reads once per control period.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! retarget = "0.1"  # Default: UDP transport
//! ```
//!
//! ## Feature Flags
//!
//! - **`transport-udp`** (default): UDP backend in [`open_transports`]
//! - **`transport-zmq`**: ZMQ backend (requires libzmq)
//! - **`file-logging`**: JSON log files through `tracing-appender`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use retarget::prelude::*;
//! use std::sync::Arc;
//!
//! let config = retarget::config::load_config(None, None)?;
//! retarget::config::validate_config(&config)?;
//!
//! let transports = retarget::open_transports(&config.transport)?;
//! let clock = Arc::new(SystemClock::new());
//! let mut client = retarget::client_from_config(&config, transports.as_ref(), clock)?;
//!
//! let state = StaticKinematics::new(config.control.controlled_joints.len());
//! client.reset(&state)?;
//! client.start_approaching_phase();
//! loop {
//!     client.tick();
//!     let _height = client.com_height();
//!     # break;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export foundation
pub use retarget_config as config;

// Re-export infrastructure
pub use retarget_observability as observability;

// Re-export I/O layer
pub use retarget_transports as transports;

// Re-export algorithms
pub use retarget_core as retargeting;

use retarget_core::{Clock, RetargetingClient, RetargetingResult};
use retarget_transports::{
    EndpointTable, LoopbackHub, TransportConfig, TransportFactory, TransportResult, WireCodec,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Open the transport backend selected in the `[transport]` section
pub fn open_transports(
    section: &config::TransportConfig,
) -> TransportResult<Box<dyn TransportFactory>> {
    let codec = match section.encoding {
        config::WireEncoding::Binary => WireCodec::Binary,
        config::WireEncoding::Json => WireCodec::Json,
    };
    let transport_config = TransportConfig::default()
        .with_codec(codec)
        .with_max_message_size(section.max_message_size);
    transport_config.validate()?;
    let endpoints: EndpointTable = section
        .endpoints
        .iter()
        .map(|(name, address)| (name.clone(), address.clone()))
        .collect();

    info!(
        "[RETARGET] Opening {:?} transports ({} endpoints, {:?} encoding)",
        section.backend,
        endpoints.len(),
        section.encoding
    );

    match section.backend {
        config::TransportBackend::Loopback => Ok(Box::new(LoopbackHub::new())),

        #[cfg(feature = "transport-udp")]
        config::TransportBackend::Udp => Ok(Box::new(transports::UdpTransportFactory::new(
            endpoints,
            transport_config,
        )?)),
        #[cfg(not(feature = "transport-udp"))]
        config::TransportBackend::Udp => Err(transports::TransportError::InvalidConfig(
            "UDP backend requires the `transport-udp` feature".to_string(),
        )),

        #[cfg(feature = "transport-zmq")]
        config::TransportBackend::Zmq => Ok(Box::new(transports::ZmqTransportFactory::new(
            endpoints,
            transport_config,
        )?)),
        #[cfg(not(feature = "transport-zmq"))]
        config::TransportBackend::Zmq => Err(transports::TransportError::InvalidConfig(
            "ZMQ backend requires the `transport-zmq` feature".to_string(),
        )),
    }
}

/// Initialize a client from a loaded configuration
///
/// Uses `[control]` for the module name, period, controlled joints and the
/// CoM bootstrap budget.
pub fn client_from_config(
    config: &config::RetargetConfig,
    transports: &dyn TransportFactory,
    clock: Arc<dyn Clock>,
) -> RetargetingResult<RetargetingClient> {
    let control = &config.control;
    let client = RetargetingClient::initialize(
        &config.retargeting,
        &control.module_name,
        control.period,
        &control.controlled_joints,
        transports,
        clock,
    )?;
    Ok(client.with_bootstrap_retry(
        control.bootstrap_attempts,
        Duration::from_millis(control.bootstrap_delay_ms),
    ))
}

/// Map the `[logging]` section onto the logging initializer's settings
pub fn logging_config(section: &config::LoggingConfig) -> observability::LoggingConfig {
    observability::LoggingConfig {
        level: section.level.clone(),
        format: match section.format {
            config::LogFormat::Text => observability::LogFormat::Text,
            config::LogFormat::Json => observability::LogFormat::Json,
        },
        file_dir: section.file_dir.clone(),
        ..Default::default()
    }
}

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::config::{RetargetConfig, RetargetingConfig};
    pub use crate::retargeting::prelude::*;
    pub use crate::transports::{LoopbackHub, TransportFactory};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transports::VectorReader;

    #[test]
    fn test_logging_config_maps_every_field() {
        let section = config::LoggingConfig {
            level: "debug".to_string(),
            format: config::LogFormat::Json,
            file_dir: Some("/tmp/retarget-logs".into()),
        };

        let mapped = logging_config(&section);

        assert_eq!(mapped.level, "debug");
        assert_eq!(mapped.format, observability::LogFormat::Json);
        assert_eq!(mapped.file_dir, section.file_dir);
        assert_eq!(mapped.retention_days, None);
    }

    #[test]
    fn test_loopback_backend_needs_no_endpoints() {
        let transports = open_transports(&config::TransportConfig::default()).unwrap();
        let mut reader = transports.open_reader("/walking/CoM:i").unwrap();
        assert_eq!(reader.read_latest().unwrap(), None);
    }

    #[test]
    fn test_too_small_message_limit_is_rejected() {
        let section = config::TransportConfig {
            max_message_size: 4,
            ..Default::default()
        };
        assert!(open_transports(&section).is_err());
    }
}
