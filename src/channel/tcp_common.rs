//! Read/write halves shared by the TCP client and TCP server channels
//! (§6.3), built on `tokio::net::TcpStream::into_split`, which hands
//! out two independently-usable halves without any extra locking.

use super::{ByteChannelReader, ByteChannelWriter};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

pub(super) struct TcpReader {
    half: OwnedReadHalf,
    read_timeout: Duration,
}

impl TcpReader {
    pub(super) fn new(half: OwnedReadHalf, read_timeout: Duration) -> Self {
        Self { half, read_timeout }
    }
}

#[async_trait]
impl ByteChannelReader for TcpReader {
    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; max.max(1)];
        match tokio::time::timeout(self.read_timeout, self.half.read(&mut buf)).await {
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
        Ok(())
    }
}

pub(super) struct TcpWriter {
    half: OwnedWriteHalf,
}

impl TcpWriter {
    pub(super) fn new(half: OwnedWriteHalf) -> Self {
        Self { half }
    }
}

#[async_trait]
impl ByteChannelWriter for TcpWriter {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.half.write_all(data).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.half.shutdown().await;
        Ok(())
    }
}
