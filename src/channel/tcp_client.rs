//! TCP client byte channel (§6.3): connects to `host:port` with a
//! 10-second connect timeout, then uses the standard read timeout.

use super::tcp_common::{TcpReader, TcpWriter};
use super::{ByteChannel, ByteChannelReader, ByteChannelWriter};
use crate::config::TcpClientConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// TCP client channel used for link simulation.
pub struct TcpClientChannel {
    config: TcpClientConfig,
    stream: Option<TcpStream>,
}

impl TcpClientChannel {
    /// Creates a channel for the given TCP client configuration.
    pub fn new(config: TcpClientConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }
}

#[async_trait]
impl ByteChannel for TcpClientChannel {
    async fn connect(&mut self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(&addr),
        )
        .await
        .map_err(|_| Error::Io(std::io::Error::from(std::io::ErrorKind::TimedOut)))??;
        log::info!("tcp client connected to {addr}");
        self.stream = Some(stream);
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        stream.write_all(data).await?;
        Ok(())
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        let mut buf = vec![0u8; max.max(1)];
        match tokio::time::timeout(self.config.read_timeout, stream.read(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(buf)
            }
            Ok(Err(e)) => Err(Error::from(e)),
            // Nothing arrived within the timeout; that is not an error here.
            Err(_) => Ok(Vec::new()),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream = None;
        Ok(())
    }

    fn split(self: Box<Self>) -> Result<(Box<dyn ByteChannelReader>, Box<dyn ByteChannelWriter>)> {
        let stream = self.stream.ok_or(Error::Closed)?;
        let (read_half, write_half) = stream.into_split();
        Ok((
            Box::new(TcpReader::new(read_half, self.config.read_timeout)),
            Box::new(TcpWriter::new(write_half)),
        ))
    }
}

impl std::fmt::Debug for TcpClientChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClientChannel")
            .field("host", &self.config.host)
            .field("port", &self.config.port)
            .finish()
    }
}
