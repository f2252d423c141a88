//! UDP transport
//!
//! One datagram carries one vector. Readers bind the address configured for
//! their port name and drain the socket on every poll, keeping only the newest
//! datagram. Writers connect to the configured address and send without
//! waiting; a datagram that cannot be sent right away is dropped.

use crate::common::{EndpointTable, TransportConfig, TransportError, TransportResult};
use crate::traits::{Transport, TransportFactory, VectorReader, VectorWriter};
use std::io::ErrorKind;
use std::net::{SocketAddr, UdpSocket};
use tracing::{debug, info, trace};

/// Opens UDP endpoints by looking port names up in an [`EndpointTable`]
#[derive(Debug, Clone)]
pub struct UdpTransportFactory {
    endpoints: EndpointTable,
    config: TransportConfig,
}

impl UdpTransportFactory {
    pub fn new(endpoints: EndpointTable, config: TransportConfig) -> TransportResult<Self> {
        config.validate()?;
        Ok(Self { endpoints, config })
    }
}

impl TransportFactory for UdpTransportFactory {
    fn open_reader(&self, name: &str) -> TransportResult<Box<dyn VectorReader>> {
        let address = self.endpoints.resolve(name)?;
        Ok(Box::new(UdpVectorReader::bind(
            name,
            address,
            self.config.clone(),
        )?))
    }

    fn open_writer(&self, name: &str) -> TransportResult<Box<dyn VectorWriter>> {
        let address = self.endpoints.resolve(name)?;
        Ok(Box::new(UdpVectorWriter::connect(
            name,
            address,
            self.config.clone(),
        )?))
    }
}

/// Non-blocking UDP receiver
#[derive(Debug)]
pub struct UdpVectorReader {
    name: String,
    config: TransportConfig,
    socket: Option<UdpSocket>,
    buffer: Vec<u8>,
}

impl UdpVectorReader {
    /// Bind `address` and switch the socket to non-blocking mode
    pub fn bind(name: &str, address: &str, config: TransportConfig) -> TransportResult<Self> {
        let socket = UdpSocket::bind(address)
            .map_err(|e| TransportError::Bind {
                endpoint: name.to_string(),
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        socket.set_nonblocking(true)?;

        info!("🦀 [RETARGET-UDP] {} listening on {}", name, address);

        // One spare byte so an oversized datagram is detected instead of truncated silently
        let buffer = vec![0u8; config.max_message_size + 1];
        Ok(Self {
            name: name.to_string(),
            config,
            socket: Some(socket),
            buffer,
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotRunning)?;
        Ok(socket.local_addr()?)
    }
}

impl Transport for UdpVectorReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn close(&mut self) -> TransportResult<()> {
        if self.socket.take().is_some() {
            debug!("[RETARGET-UDP] Closed reader {}", self.name);
        }
        Ok(())
    }

    fn transport_type(&self) -> &str {
        "udp-reader"
    }
}

impl VectorReader for UdpVectorReader {
    /// Drain the socket and return the newest datagram that decodes
    ///
    /// Malformed datagrams are skipped when a valid one arrived in the same
    /// drain. The decode error is returned only when nothing usable arrived.
    fn read_latest(&mut self) -> TransportResult<Option<Vec<f64>>> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotRunning)?;

        let mut latest: Option<Vec<f64>> = None;
        let mut malformed: Option<TransportError> = None;
        let mut stale = 0usize;
        let mut discarded = 0usize;
        loop {
            let len = match socket.recv(&mut self.buffer) {
                Ok(len) => len,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(TransportError::Receive {
                        endpoint: self.name.clone(),
                        reason: e.to_string(),
                    })
                }
            };
            match self
                .config
                .codec
                .decode(&self.buffer[..len], self.config.max_message_size)
            {
                Ok(values) => {
                    if latest.replace(values).is_some() {
                        stale += 1;
                    }
                }
                Err(e) => {
                    discarded += 1;
                    malformed = Some(e);
                }
            }
        }

        if stale > 0 {
            trace!(
                "[RETARGET-UDP] {} skipped {} stale datagram(s)",
                self.name,
                stale
            );
        }
        if discarded > 0 {
            debug!(
                "[RETARGET-UDP] {} discarded {} malformed datagram(s)",
                self.name,
                discarded
            );
        }

        match (latest, malformed) {
            (Some(values), _) => Ok(Some(values)),
            (None, Some(e)) => Err(e),
            (None, None) => Ok(None),
        }
    }
}

/// Fire-and-forget UDP sender
#[derive(Debug)]
pub struct UdpVectorWriter {
    name: String,
    config: TransportConfig,
    socket: Option<UdpSocket>,
}

impl UdpVectorWriter {
    /// Bind an ephemeral local port and connect it to `address`
    pub fn connect(name: &str, address: &str, config: TransportConfig) -> TransportResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| TransportError::Bind {
                endpoint: name.to_string(),
                address: "0.0.0.0:0".to_string(),
                reason: e.to_string(),
            })?;
        socket
            .connect(address)
            .map_err(|e| TransportError::Connect {
                endpoint: name.to_string(),
                address: address.to_string(),
                reason: e.to_string(),
            })?;
        socket.set_nonblocking(true)?;

        info!("🦀 [RETARGET-UDP] {} sending to {}", name, address);

        Ok(Self {
            name: name.to_string(),
            config,
            socket: Some(socket),
        })
    }
}

impl Transport for UdpVectorWriter {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    fn close(&mut self) -> TransportResult<()> {
        if self.socket.take().is_some() {
            debug!("[RETARGET-UDP] Closed writer {}", self.name);
        }
        Ok(())
    }

    fn transport_type(&self) -> &str {
        "udp-writer"
    }
}

impl VectorWriter for UdpVectorWriter {
    fn write(&mut self, values: &[f64]) -> TransportResult<()> {
        let socket = self.socket.as_ref().ok_or(TransportError::NotRunning)?;
        let bytes = self
            .config
            .codec
            .encode(values, self.config.max_message_size)?;

        match socket.send(&bytes) {
            Ok(_) => Ok(()),
            // Nobody listening yet, or the send buffer is full: the sample is dropped
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::ConnectionRefused) => {
                trace!("[RETARGET-UDP] {} dropped a sample: {}", self.name, e);
                Ok(())
            }
            Err(e) => Err(TransportError::Send {
                endpoint: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_port_name_is_invalid_config() {
        let factory =
            UdpTransportFactory::new(EndpointTable::new(), TransportConfig::default()).unwrap();

        assert!(matches!(
            factory.open_reader("/m/CoM:i"),
            Err(TransportError::InvalidConfig(_))
        ));
        assert!(matches!(
            factory.open_writer("/m/robotOrientation:o"),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_socket_reads_none() {
        let mut reader =
            UdpVectorReader::bind("/m/CoM:i", "127.0.0.1:0", TransportConfig::default()).unwrap();
        assert_eq!(reader.read_latest().unwrap(), None);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut reader =
            UdpVectorReader::bind("/m/CoM:i", "127.0.0.1:0", TransportConfig::default()).unwrap();

        reader.close().unwrap();
        reader.close().unwrap();

        assert!(!reader.is_open());
        assert!(matches!(reader.read_latest(), Err(TransportError::NotRunning)));
    }
}
