//! Common types shared by all transport implementations

pub mod codec;
pub mod config;
pub mod error;

pub use codec::WireCodec;
pub use config::{EndpointTable, TransportConfig};
pub use error::{TransportError, TransportResult};
