//! TCP server byte channel (§6.3): binds with `SO_REUSEADDR` semantics
//! (tokio enables this by default), accepts exactly one connection
//! with a non-blocking accept polled on a ~100 ms cadence, then treats
//! it like the client case.

use super::tcp_common::{TcpReader, TcpWriter};
use super::{ByteChannel, ByteChannelReader, ByteChannelWriter};
use crate::config::TcpServerConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// TCP server channel used for link simulation. Accepts exactly one
/// peer; reconnection after disconnect is out of scope (§6.3).
pub struct TcpServerChannel {
    config: TcpServerConfig,
    stream: Option<TcpStream>,
}

impl TcpServerChannel {
    /// Creates a channel for the given TCP server configuration.
    pub fn new(config: TcpServerConfig) -> Self {
        Self {
            config,
            stream: None,
        }
    }
}

#[async_trait]
impl ByteChannel for TcpServerChannel {
    async fn connect(&mut self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!(
            "tcp server listening on {}, waiting for a peer...",
            self.config.bind_addr
        );

        // Poll accept on a fixed cadence rather than blocking forever,
        // matching the source interface's non-blocking-accept loop.
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    log::info!("accepted connection from {peer}");
                    self.stream = Some(stream);
                    return Ok(());
                }
                Err(e) => {
                    log::warn!("accept failed: {e}, retrying");
                    tokio::time::sleep(ACCEPT_POLL_INTERVAL).await;
                }
            }
        }
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

impl std::fmt::Debug for TcpServerChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServerChannel")
            .field("bind_addr", &self.config.bind_addr)
            .finish()
    }
}
