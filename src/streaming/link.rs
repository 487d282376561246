//! TCP transport for telemetry records.
//!
//! The sensor node owns a [`TelemetrySender`] on a connected stream; the
//! controller wraps the accepted stream in a [`TelemetryReceiver`]. Both are
//! generic over `Write`/`Read` so tests can drive them with in-memory buffers.

use super::framing::{MAX_RECORD_BUFFER, RecordAssembler, RecordResult};
use super::wire::format_record;
use crate::core::types::TelemetrySample;
use crate::error::{Error, Result};
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Writes one record per sample
pub struct TelemetrySender<W: Write> {
    writer: W,
    sent: u64,
}

impl TelemetrySender<TcpStream> {
    /// Connect to the controller. Any failure here is fatal for the sensor node.
    pub fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let socket_addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Other(format!("Invalid address: {}", addr)))?;

        let stream = TcpStream::connect_timeout(&socket_addr, timeout)
            .map_err(|e| Error::Other(format!("Connection to {} failed: {}", socket_addr, e)))?;
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("Failed to set TCP_NODELAY: {}", e);
        }

        log::info!("Connected to controller at {}", socket_addr);
        Ok(Self::new(stream))
    }
}

impl<W: Write> TelemetrySender<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, sent: 0 }
    }

    pub fn send(&mut self, sample: &TelemetrySample) -> Result<()> {
        let record = format_record(sample);
        self.writer.write_all(record.as_bytes())?;
        self.writer.flush()?;
        self.sent += 1;
        log::debug!("Sent: {}", record.trim_end());
        Ok(())
    }

    /// Records written so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Reads bytes and reassembles records
pub struct TelemetryReceiver<R: Read> {
    reader: R,
    buffer: [u8; MAX_RECORD_BUFFER],
    assembler: RecordAssembler,
}

impl<R: Read> TelemetryReceiver<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: [0u8; MAX_RECORD_BUFFER],
            assembler: RecordAssembler::new(),
        }
    }

    /// Perform one read and return the records it completed.
    ///
    /// A read timeout yields an empty batch. End of stream or a reset
    /// connection is [`Error::Disconnected`].
    pub fn poll(&mut self) -> Result<Vec<RecordResult>> {
        match self.reader.read(&mut self.buffer) {
            Ok(0) => Err(Error::Disconnected),
            Ok(n) => {
                log::trace!("Read {} bytes", n);
                Ok(self.assembler.push(&self.buffer[..n]))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                Ok(Vec::new())
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::UnexpectedEof
                ) =>
            {
                log::debug!("Connection closed: {}", e);
                Err(Error::Disconnected)
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
