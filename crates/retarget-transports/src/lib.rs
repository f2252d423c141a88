//! # retarget-transports
//!
//! Transport abstraction for the retargeting client. Every stream is a named
//! endpoint (e.g. `/walking-coordinator/CoM:i`) carrying one numeric vector per
//! message.
//!
//! ## Backends
//!
//! - **Loopback**: in-process single-slot mailboxes, always available
//! - **UDP**: one datagram per vector, non-blocking sockets
//! - **ZMQ** (feature `zmq`): SUB readers with conflation, PUB writers
//!
//! All readers are non-blocking and return only the newest pending sample.
//!
//! ## Example
//!
//! ```
//! use retarget_transports::prelude::*;
//!
//! let hub = LoopbackHub::new();
//! let mut reader = hub.open_reader("/walking-coordinator/CoM:i")?;
//!
//! hub.publish("/walking-coordinator/CoM:i", &[0.0, 0.0, 0.8]);
//! assert_eq!(reader.read_latest()?, Some(vec![0.0, 0.0, 0.8]));
//! assert_eq!(reader.read_latest()?, None);
//! # Ok::<(), TransportError>(())
//! ```
//!
//! ## Wire format
//!
//! With [`WireCodec::Binary`] a message is the values packed as little-endian
//! `f64` with no header. [`WireCodec::Json`] sends a JSON array instead.

pub mod common;
pub mod loopback;
pub mod traits;
pub mod udp;

#[cfg(feature = "zmq")]
pub mod zmq;

// Re-export commonly used types
pub use common::{
    EndpointTable, TransportConfig, TransportError, TransportResult, WireCodec,
};
pub use loopback::{LoopbackHub, LoopbackReader, LoopbackWriter};
pub use traits::{Transport, TransportFactory, VectorReader, VectorWriter};
pub use udp::{UdpTransportFactory, UdpVectorReader, UdpVectorWriter};

#[cfg(feature = "zmq")]
pub use crate::zmq::ZmqTransportFactory;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::common::*;
    pub use crate::loopback::*;
    pub use crate::traits::*;
    pub use crate::udp::*;

    #[cfg(feature = "zmq")]
    pub use crate::zmq::*;
}
