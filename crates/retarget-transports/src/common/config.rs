//! Common configuration types for transports

use crate::common::codec::WireCodec;
use crate::common::error::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Options shared by every endpoint a factory opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// How vectors are laid out on the wire
    pub codec: WireCodec,

    /// Maximum message size in bytes
    pub max_message_size: usize,

    /// High water mark for queued outgoing messages (ZMQ only)
    pub send_hwm: usize,

    /// High water mark for queued incoming messages (ZMQ only)
    pub recv_hwm: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            codec: WireCodec::default(),
            max_message_size: 65_507, // largest UDP payload
            send_hwm: 16,
            recv_hwm: 16,
        }
    }
}

impl TransportConfig {
    /// Set the wire codec
    pub fn with_codec(mut self, codec: WireCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set maximum message size
    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> TransportResult<()> {
        if self.max_message_size < 8 {
            return Err(TransportError::InvalidConfig(format!(
                "Maximum message size must hold at least one value, got {} bytes",
                self.max_message_size
            )));
        }
        Ok(())
    }
}

/// Port name to address table used by the network backends
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointTable {
    endpoints: HashMap<String, String>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the address of a named transport
    pub fn with_endpoint(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.endpoints.insert(name.into(), address.into());
        self
    }

    /// Resolve a transport name to its address
    pub fn resolve(&self, name: &str) -> TransportResult<&str> {
        self.endpoints
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| {
                TransportError::InvalidConfig(format!("No endpoint configured for {}", name))
            })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for EndpointTable
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            endpoints: iter
                .into_iter()
                .map(|(name, address)| (name.into(), address.into()))
                .collect(),
        }
    }
}
