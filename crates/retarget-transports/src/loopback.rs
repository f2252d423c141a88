// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-process loopback transport
//!
//! A [`LoopbackHub`] holds one single-slot mailbox per port name. Writing
//! replaces whatever sample was pending; reading takes it. This gives the same
//! latest-wins behaviour as the network backends without any sockets, which
//! makes it the backend of choice for tests, tools and co-located processes.

use crate::common::{TransportError, TransportResult};
use crate::traits::{Transport, TransportFactory, VectorReader, VectorWriter};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared table of named mailboxes
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    slots: Arc<Mutex<HashMap<String, Option<Vec<f64>>>>>,
}

impl LoopbackHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pending sample on `name`
    pub fn publish(&self, name: &str, values: &[f64]) {
        self.slots
            .lock()
            .insert(name.to_string(), Some(values.to_vec()));
    }

    /// Take the pending sample on `name`, leaving the slot empty
    pub fn take(&self, name: &str) -> Option<Vec<f64>> {
        self.slots.lock().get_mut(name).and_then(Option::take)
    }

    /// True if a sample is waiting on `name`
    pub fn has_pending(&self, name: &str) -> bool {
        self.slots
            .lock()
            .get(name)
            .map(Option::is_some)
            .unwrap_or(false)
    }

    /// Writer handle for the producing side of `name`
    pub fn publisher(&self, name: &str) -> LoopbackWriter {
        LoopbackWriter {
            hub: self.clone(),
            name: name.to_string(),
            open: true,
        }
    }
}

impl TransportFactory for LoopbackHub {
    fn open_reader(&self, name: &str) -> TransportResult<Box<dyn VectorReader>> {
        debug!("[LOOPBACK] Opened reader {}", name);
        Ok(Box::new(LoopbackReader {
            hub: self.clone(),
            name: name.to_string(),
            open: true,
        }))
    }

    fn open_writer(&self, name: &str) -> TransportResult<Box<dyn VectorWriter>> {
        debug!("[LOOPBACK] Opened writer {}", name);
        Ok(Box::new(self.publisher(name)))
    }
}

/// Consuming end of a loopback mailbox
#[derive(Debug)]
pub struct LoopbackReader {
    hub: LoopbackHub,
    name: String,
    open: bool,
}

impl Transport for LoopbackReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> TransportResult<()> {
        self.open = false;
        Ok(())
    }

    fn transport_type(&self) -> &str {
        "loopback-reader"
    }
}

impl VectorReader for LoopbackReader {
    fn read_latest(&mut self) -> TransportResult<Option<Vec<f64>>> {
        if !self.open {
            return Err(TransportError::NotRunning);
        }
        Ok(self.hub.take(&self.name))
    }
}

/// Producing end of a loopback mailbox
#[derive(Debug)]
pub struct LoopbackWriter {
    hub: LoopbackHub,
    name: String,
    open: bool,
}

impl Transport for LoopbackWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> TransportResult<()> {
        self.open = false;
        Ok(())
    }

    fn transport_type(&self) -> &str {
        "loopback-writer"
    }
}

impl VectorWriter for LoopbackWriter {
    fn write(&mut self, values: &[f64]) -> TransportResult<()> {
        if !self.open {
            return Err(TransportError::NotRunning);
        }
        self.hub.publish(&self.name, values);
        Ok(())
    }
}
