//! Byte channel abstraction (§4.2) and its concrete implementations
//! (§6.3): serial, TCP client, TCP server, plus an in-memory loopback
//! used by tests.

mod loopback;
mod serial;
mod shared;
mod tcp_client;
mod tcp_common;
mod tcp_server;

pub use loopback::LoopbackChannel;
pub use serial::SerialChannel;
pub(crate) use shared::{SharedReader, SharedWriter};
pub use tcp_client::TcpClientChannel;
pub use tcp_server::TcpServerChannel;

use crate::error::Result;
use async_trait::async_trait;

/// Abstract byte channel underlying the frame reader and sender.
///
/// Implementations must serialize concurrent callers on the same
/// direction (§4.2): a `&mut self` receiver on every method is the
/// mechanism used here, since the packet manager owns exactly one
/// sender task and one receiver task per channel half.
#[async_trait]
pub trait ByteChannel: Send {
    /// Establishes the transport. Must be called before any send/read.
    async fn connect(&mut self) -> Result<()>;

    /// Transmits `data` verbatim.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Reads between 0 and `max` bytes currently available. May return
    /// an empty vector immediately when nothing is ready.
    async fn read(&mut self, max: usize) -> Result<Vec<u8>>;

    /// Idempotent release of the transport.
    async fn close(&mut self) -> Result<()>;

    /// Splits a connected channel into independent read and write
    /// halves. The packet manager calls this once, right after
    /// `connect`, so the sender and receiver workers each hold their
    /// own half instead of sharing one lock — an in-flight read can no
    /// longer stall a retry sweep or a fresh ack-requiring send (§5).
    fn split(self: Box<Self>) -> Result<(Box<dyn ByteChannelReader>, Box<dyn ByteChannelWriter>)>;
}

/// The read half of a split byte channel (§5).
#[async_trait]
pub trait ByteChannelReader: Send {
    /// Reads between 0 and `max` bytes currently available.
    async fn read(&mut self, max: usize) -> Result<Vec<u8>>;

    /// Idempotent release of this half.
    async fn close(&mut self) -> Result<()>;
}

/// The write half of a split byte channel (§5).
#[async_trait]
pub trait ByteChannelWriter: Send {
    /// Transmits `data` verbatim.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Idempotent release of this half.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl ByteChannelReader for Box<dyn ByteChannelReader> {
    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        (**self).read(max).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}

#[async_trait]
impl ByteChannelWriter for Box<dyn ByteChannelWriter> {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        (**self).send(data).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}
