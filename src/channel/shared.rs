//! Wraps a split channel half so the sender and receiver workers can
//! each hold a cheaply-cloned handle to their own side, without
//! blocking on each other's in-flight I/O (§5).

use super::{ByteChannelReader, ByteChannelWriter};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Clone of a `SharedReader` forwards every read through the same
/// lock. Only the receiver worker (plus `stop()`, after the worker has
/// been joined) ever touches one, so contention is never real.
#[derive(Clone)]
pub struct SharedReader {
    inner: Arc<AsyncMutex<Box<dyn ByteChannelReader>>>,
}

impl SharedReader {
    pub fn new(reader: Box<dyn ByteChannelReader>) -> Self {
        Self {
            inner: Arc::new(AsyncMutex::new(reader)),
        }
    }
}

#[async_trait]
impl ByteChannelReader for SharedReader {
    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        self.inner.lock().await.read(max).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.lock().await.close().await
    }
}

/// Clone of a `SharedWriter` forwards every send through the same
/// lock. Only the sender worker (plus `stop()`, after the worker has
/// been joined) ever touches one, so contention is never real.
#[derive(Clone)]
pub struct SharedWriter {
    inner: Arc<AsyncMutex<Box<dyn ByteChannelWriter>>>,
}

impl SharedWriter {
    pub fn new(writer: Box<dyn ByteChannelWriter>) -> Self {
        Self {
            inner: Arc::new(AsyncMutex::new(writer)),
        }
    }
}

#[async_trait]
impl ByteChannelWriter for SharedWriter {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.inner.lock().await.send(data).await
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.lock().await.close().await
    }
}
