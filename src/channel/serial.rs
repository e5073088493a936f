//! Serial byte channel (§6.3): opens a UART by device path at a
//! configured bit rate.
//!
//! `serialport` is synchronous, so each operation is dispatched to a
//! blocking-friendly task via `tokio::task::spawn_blocking`, the usual
//! way to bridge a blocking I/O crate into an async runtime.

use super::{ByteChannel, ByteChannelReader, ByteChannelWriter};
use crate::config::SerialConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::{Read, Write};

/// Serial port byte channel.
pub struct SerialChannel {
    config: SerialConfig,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialChannel {
    /// Creates a channel for the given serial configuration. Fails to
    /// construct only by lacking a port path, which `SerialConfig`
    /// already requires at the type level, so construction here never
    /// fails — connection failures surface from `connect`.
    pub fn new(config: SerialConfig) -> Self {
        Self { config, port: None }
    }
}

#[async_trait]
impl ByteChannel for SerialChannel {
    async fn connect(&mut self) -> Result<()> {
        if self.config.port.is_empty() {
            return Err(Error::MissingConfig("serial port path"));
        }
        let builder = serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.read_timeout);
        let path = self.config.port.clone();
        let port = tokio::task::spawn_blocking(move || builder.open())
            .await
            .expect("serial open task panicked")
            .map_err(|e| Error::Io(std::io::Error::other(format!("{path}: {e}"))))?;
        self.port = Some(port);
        log::info!(
            "serial channel connected on {} at {} baud",
            self.config.port,
            self.config.baud_rate
        );
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut port = self.port.take().ok_or(Error::Closed)?;
        let data = data.to_vec();
        let (result, port) = tokio::task::spawn_blocking(move || {
            let result = port.write_all(&data).map_err(Error::from);
            (result, port)
        })
        .await
        .expect("serial write task panicked");
        self.port = Some(port);
        result
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut port = self.port.take().ok_or(Error::Closed)?;
        let (result, port) = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; max.max(1)];
            let result = match port.read(&mut buf) {
                Ok(n) => Ok(buf[..n].to_vec()),
                // A timed-out read with nothing available is not an error
                // for this contract — it just means zero bytes are ready.
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
                Err(e) => Err(Error::from(e)),
            };
            (result, port)
        })
        .await
        .expect("serial read task panicked");
        self.port = Some(port);
        result
    }

    async fn close(&mut self) -> Result<()> {
        // Dropping the port handle closes the underlying file descriptor.
        self.port = None;
        Ok(())
    }

    fn split(self: Box<Self>) -> Result<(Box<dyn ByteChannelReader>, Box<dyn ByteChannelWriter>)> {
        let port = self.port.ok_or(Error::Closed)?;
        let read_port = port
            .try_clone()
            .map_err(|e| Error::Io(std::io::Error::other(format!("serial try_clone: {e}"))))?;
        Ok((
            Box::new(SerialReader {
                port: Some(read_port),
            }),
            Box::new(SerialWriter { port: Some(port) }),
        ))
    }
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("port", &self.config.port)
            .field("baud_rate", &self.config.baud_rate)
            .finish()
    }
}

/// Read half of a split [`SerialChannel`], produced via
/// [`serialport::SerialPort::try_clone`].
struct SerialReader {
    port: Option<Box<dyn serialport::SerialPort>>,
}

#[async_trait]
impl ByteChannelReader for SerialReader {
    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut port = self.port.take().ok_or(Error::Closed)?;
        let (result, port) = tokio::task::spawn_blocking(move || {
            let mut buf = vec![0u8; max.max(1)];
            let result = match port.read(&mut buf) {
                Ok(n) => Ok(buf[..n].to_vec()),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
                Err(e) => Err(Error::from(e)),
            };
            (result, port)
        })
        .await
        .expect("serial read task panicked");
        self.port = Some(port);
        result
    }

    async fn close(&mut self) -> Result<()> {
        self.port = None;
        Ok(())
    }
}

/// Write half of a split [`SerialChannel`].
struct SerialWriter {
    port: Option<Box<dyn serialport::SerialPort>>,
}

#[async_trait]
impl ByteChannelWriter for SerialWriter {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut port = self.port.take().ok_or(Error::Closed)?;
        let data = data.to_vec();
        let (result, port) = tokio::task::spawn_blocking(move || {
            let result = port.write_all(&data).map_err(Error::from);
            (result, port)
        })
        .await
        .expect("serial write task panicked");
        self.port = Some(port);
        result
    }

    async fn close(&mut self) -> Result<()> {
        self.port = None;
        Ok(())
    }
}
