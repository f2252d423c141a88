//! Common error types for all transports

use std::fmt;

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Failure of a named vector endpoint
///
/// "No sample available" is not an error: non-blocking reads return `Ok(None)`.
#[derive(Debug)]
pub enum TransportError {
    /// Receiving or publishing socket could not take its address
    Bind {
        endpoint: String,
        address: String,
        reason: String,
    },

    /// Socket could not reach the peer address
    Connect {
        endpoint: String,
        address: String,
        reason: String,
    },

    Send { endpoint: String, reason: String },

    Receive { endpoint: String, reason: String },

    /// Endpoint used after `close`
    NotRunning,

    /// Missing endpoint or out-of-range setting
    InvalidConfig(String),

    MessageTooLarge { size: usize, max_size: usize },

    /// Payload that does not decode to a vector
    InvalidMessage(String),

    #[cfg(feature = "zmq")]
    Zmq(zmq::Error),

    Io(std::io::Error),

    Serialization(String),
}

impl TransportError {
    /// True when a sample was received but could not be decoded
    pub fn is_malformed_sample(&self) -> bool {
        matches!(
            self,
            Self::InvalidMessage(_) | Self::MessageTooLarge { .. } | Self::Serialization(_)
        )
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind {
                endpoint,
                address,
                reason,
            } => write!(f, "{} could not bind {}: {}", endpoint, address, reason),
            Self::Connect {
                endpoint,
                address,
                reason,
            } => write!(f, "{} could not connect to {}: {}", endpoint, address, reason),
            Self::Send { endpoint, reason } => write!(f, "{} send failed: {}", endpoint, reason),
            Self::Receive { endpoint, reason } => {
                write!(f, "{} receive failed: {}", endpoint, reason)
            }
            Self::NotRunning => write!(f, "Transport is closed"),
            Self::InvalidConfig(msg) => write!(f, "Invalid transport configuration: {}", msg),
            Self::MessageTooLarge { size, max_size } => {
                write!(f, "Message of {} bytes exceeds the {} byte limit", size, max_size)
            }
            Self::InvalidMessage(msg) => write!(f, "Malformed vector message: {}", msg),
            #[cfg(feature = "zmq")]
            Self::Zmq(e) => write!(f, "ZMQ error: {}", e),
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Serialization(msg) => write!(f, "JSON vector error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            #[cfg(feature = "zmq")]
            Self::Zmq(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(feature = "zmq")]
impl From<zmq::Error> for TransportError {
    fn from(err: zmq::Error) -> Self {
        Self::Zmq(err)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
