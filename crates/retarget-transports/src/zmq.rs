// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! ZMQ transport (PUB/SUB)
//!
//! Readers are SUB sockets connected to the configured URL with conflation
//! enabled, so the socket itself keeps only the newest message. Writers are PUB
//! sockets bound to the configured URL.

use crate::common::{EndpointTable, TransportConfig, TransportError, TransportResult};
use crate::traits::{Transport, TransportFactory, VectorReader, VectorWriter};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Opens ZMQ endpoints sharing one context
#[derive(Clone)]
pub struct ZmqTransportFactory {
    context: Arc<zmq::Context>,
    endpoints: EndpointTable,
    config: TransportConfig,
}

impl ZmqTransportFactory {
    pub fn new(endpoints: EndpointTable, config: TransportConfig) -> TransportResult<Self> {
        config.validate()?;
        Ok(Self {
            context: Arc::new(zmq::Context::new()),
            endpoints,
            config,
        })
    }
}

impl TransportFactory for ZmqTransportFactory {
    fn open_reader(&self, name: &str) -> TransportResult<Box<dyn VectorReader>> {
        let address = self.endpoints.resolve(name)?;

        let socket = self.context.socket(zmq::SUB)?;
        socket.set_linger(0)?;
        socket.set_rcvhwm(self.config.recv_hwm as i32)?;
        socket.set_conflate(true)?; // Keep only the newest message
        socket.set_subscribe(b"")?;
        socket
            .connect(address)
            .map_err(|e| TransportError::Connect {
                endpoint: name.to_string(),
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        info!("🦀 [RETARGET-ZMQ] {} subscribed to {}", name, address);

        Ok(Box::new(ZmqVectorReader {
            name: name.to_string(),
            config: self.config.clone(),
            socket: Some(socket),
        }))
    }

    fn open_writer(&self, name: &str) -> TransportResult<Box<dyn VectorWriter>> {
        let address = self.endpoints.resolve(name)?;

        let socket = self.context.socket(zmq::PUB)?;
        socket.set_linger(0)?;
        socket.set_sndhwm(self.config.send_hwm as i32)?;
        socket
            .bind(address)
            .map_err(|e| TransportError::Bind {
                endpoint: name.to_string(),
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        info!("🦀 [RETARGET-ZMQ] {} publishing on {}", name, address);

        Ok(Box::new(ZmqVectorWriter {
            name: name.to_string(),
            config: self.config.clone(),
            socket: Some(socket),
        }))
    }
}

/// SUB socket wrapper
pub struct ZmqVectorReader {
    name: String,
    config: TransportConfig,
    socket: Option<zmq::Socket>,
}

impl Transport for ZmqVectorReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn close(&mut self) -> TransportResult<()> {
        if self.socket.take().is_some() {
            debug!("[RETARGET-ZMQ] Closed reader {}", self.name);
        }
        Ok(())
    }

    fn transport_type(&self) -> &str {
        "zmq-sub"
    }
}

impl VectorReader for ZmqVectorReader {
    fn read_latest(&mut self) -> TransportResult<Option<Vec<f64>>> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotRunning)?;

        let mut latest = None;
        loop {
            match socket.recv_bytes(zmq::DONTWAIT) {
                Ok(bytes) => latest = Some(bytes),
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => {
                    return Err(TransportError::Receive {
                        endpoint: self.name.clone(),
                        reason: e.to_string(),
                    })
                }
            }
        }

        latest
            .map(|bytes| self.config.codec.decode(&bytes, self.config.max_message_size))
            .transpose()
    }
}

/// PUB socket wrapper
pub struct ZmqVectorWriter {
    name: String,
    config: TransportConfig,
    socket: Option<zmq::Socket>,
}

impl Transport for ZmqVectorWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn close(&mut self) -> TransportResult<()> {
        if self.socket.take().is_some() {
            debug!("[RETARGET-ZMQ] Closed writer {}", self.name);
        }
        Ok(())
    }

    fn transport_type(&self) -> &str {
        "zmq-pub"
    }
}

impl VectorWriter for ZmqVectorWriter {
    fn write(&mut self, values: &[f64]) -> TransportResult<()> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotRunning)?;
        let bytes = self
            .config
            .codec
            .encode(values, self.config.max_message_size)?;

        match socket.send(bytes, zmq::DONTWAIT) {
            Ok(()) => Ok(()),
            Err(zmq::Error::EAGAIN) => {
                trace!("[RETARGET-ZMQ] {} dropped a sample: high water mark", self.name);
                Ok(())
            }
            Err(e) => Err(TransportError::Send {
                endpoint: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}
