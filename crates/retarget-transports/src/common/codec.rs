//! Vector wire codec
//!
//! Every transport carries a flat sequence of `f64`. The binary layout packs
//! the values little-endian, eight bytes each, with no header; the JSON layout
//! is a plain array of numbers.

use crate::common::error::{TransportError, TransportResult};
use serde::{Deserialize, Serialize};

const VALUE_SIZE: usize = std::mem::size_of::<f64>();

/// Wire layout of a numeric vector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireCodec {
    #[default]
    Binary,
    Json,
}

impl WireCodec {
    /// Encode `values`, failing if the result exceeds `max_size` bytes
    pub fn encode(&self, values: &[f64], max_size: usize) -> TransportResult<Vec<u8>> {
        let bytes = match self {
            Self::Binary => {
                let mut bytes = Vec::with_capacity(values.len() * VALUE_SIZE);
                for value in values {
                    bytes.extend_from_slice(&value.to_le_bytes());
                }
                bytes
            }
            Self::Json => serde_json::to_vec(values)?,
        };

        if bytes.len() > max_size {
            return Err(TransportError::MessageTooLarge {
                size: bytes.len(),
                max_size,
            });
        }
        Ok(bytes)
    }

    /// Decode one message into a vector
    pub fn decode(&self, bytes: &[u8], max_size: usize) -> TransportResult<Vec<f64>> {
        if bytes.len() > max_size {
            return Err(TransportError::MessageTooLarge {
                size: bytes.len(),
                max_size,
            });
        }

        match self {
            Self::Binary => {
                if bytes.len() % VALUE_SIZE != 0 {
                    return Err(TransportError::InvalidMessage(format!(
                        "{} bytes is not a whole number of f64 values",
                        bytes.len()
                    )));
                }
                Ok(bytes
                    .chunks_exact(VALUE_SIZE)
                    .map(|chunk| {
                        let mut raw = [0u8; VALUE_SIZE];
                        raw.copy_from_slice(chunk);
                        f64::from_le_bytes(raw)
                    })
                    .collect())
            }
            Self::Json => Ok(serde_json::from_slice(bytes)?),
        }
    }
}
