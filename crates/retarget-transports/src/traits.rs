// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transport trait definitions
//!
//! Every retargeting stream is a named endpoint carrying one fixed-size
//! numeric vector per message. Readers are polled once per control tick and
//! must never block; writers fire and forget.

use crate::common::TransportResult;

/// Base transport trait - implemented by all endpoints
pub trait Transport: Send {
    /// Port name the endpoint was opened under (e.g. `/walking-coordinator/CoM:i`)
    fn name(&self) -> &str;

    /// Check if the endpoint is still open
    fn is_open(&self) -> bool;

    /// Release the endpoint. Calling it again is a no-op.
    fn close(&mut self) -> TransportResult<()>;

    /// Get transport name/type
    fn transport_type(&self) -> &str;
}

/// Receiving side of a vector stream
pub trait VectorReader: Transport {
    /// Non-blocking read of the newest pending sample
    ///
    /// Older pending samples are discarded. Returns `Ok(None)` when nothing
    /// arrived since the previous read.
    fn read_latest(&mut self) -> TransportResult<Option<Vec<f64>>>;
}

/// Sending side of a vector stream
pub trait VectorWriter: Transport {
    /// Publish one sample without waiting for a receiver
    fn write(&mut self, values: &[f64]) -> TransportResult<()>;
}

/// Opens named endpoints on one backend
pub trait TransportFactory {
    fn open_reader(&self, name: &str) -> TransportResult<Box<dyn VectorReader>>;

    fn open_writer(&self, name: &str) -> TransportResult<Box<dyn VectorWriter>>;
}
