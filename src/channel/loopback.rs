//! In-memory loopback channel for tests and the bundled demo.
//!
//! Mirrors the teacher's `LoopbackTransport`: bytes written are
//! immediately available to be read back by whichever end reads next.
//! Each end's read side and write side already use distinct `Pipe`s,
//! so splitting is just handing out the two halves separately.

use super::{ByteChannel, ByteChannelReader, ByteChannelWriter};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Shared byte queue used by both ends of a loopback pair.
#[derive(Default)]
struct Pipe {
    queue: Mutex<VecDeque<u8>>,
}

impl Pipe {
    fn push(&self, data: &[u8]) {
        self.queue.lock().unwrap().extend(data.iter().copied());
    }

    fn pop(&self, max: usize) -> Vec<u8> {
        let mut queue = self.queue.lock().unwrap();
        let n = max.min(queue.len());
        queue.drain(..n).collect()
    }
}

/// One end of an in-memory loopback pair. Writes to `outbound` are
/// readable from the peer's `inbound`, and vice versa.
pub struct LoopbackChannel {
    outbound: Arc<Pipe>,
    inbound: Arc<Pipe>,
}

impl LoopbackChannel {
    /// Creates a connected pair of loopback channels.
    pub fn pair() -> (Self, Self) {
        let a_to_b = Arc::new(Pipe::default());
        let b_to_a = Arc::new(Pipe::default());

        let a = LoopbackChannel {
            outbound: a_to_b.clone(),
            inbound: b_to_a.clone(),
        };
        let b = LoopbackChannel {
            outbound: b_to_a,
            inbound: a_to_b,
        };
        (a, b)
    }
}

#[async_trait]
impl ByteChannel for LoopbackChannel {
    async fn connect(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.outbound.push(data);
        Ok(())
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        Ok(self.inbound.pop(max))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn split(self: Box<Self>) -> Result<(Box<dyn ByteChannelReader>, Box<dyn ByteChannelWriter>)> {
        Ok((
            Box::new(LoopbackReader {
                inbound: self.inbound,
            }),
            Box::new(LoopbackWriter {
                outbound: self.outbound,
            }),
        ))
    }
}

// Lets a whole, unsplit `LoopbackChannel` be handed directly to a
// `FrameReader` in tests, without first calling `split`.
#[async_trait]
impl ByteChannelReader for LoopbackChannel {
    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        Ok(self.inbound.pop(max))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Read half of a split [`LoopbackChannel`].
struct LoopbackReader {
    inbound: Arc<Pipe>,
}

#[async_trait]
impl ByteChannelReader for LoopbackReader {
    async fn read(&mut self, max: usize) -> Result<Vec<u8>> {
        Ok(self.inbound.pop(max))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Write half of a split [`LoopbackChannel`].
struct LoopbackWriter {
    outbound: Arc<Pipe>,
}

#[async_trait]
impl ByteChannelWriter for LoopbackWriter {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.outbound.push(data);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn data_flows_one_direction_at_a_time() {
        let (mut a, mut b) = LoopbackChannel::pair();
        a.send(b"hello").await.unwrap();
        assert_eq!(b.read(16).await.unwrap(), b"hello");
        assert!(b.read(16).await.unwrap().is_empty());

        b.send(b"world").await.unwrap();
        assert_eq!(a.read(16).await.unwrap(), b"world");
    }

    #[tokio::test]
    async fn read_respects_max() {
        let (mut a, mut b) = LoopbackChannel::pair();
        a.send(b"abcdef").await.unwrap();
        assert_eq!(b.read(3).await.unwrap(), b"abc");
        assert_eq!(b.read(3).await.unwrap(), b"def");
    }

    #[tokio::test]
    async fn split_halves_still_talk_to_each_other() {
        let (a, b) = LoopbackChannel::pair();
        let (mut a_reader, mut a_writer) = Box::new(a).split().unwrap();
        let (mut b_reader, mut b_writer) = Box::new(b).split().unwrap();

        a_writer.send(b"ping").await.unwrap();
        assert_eq!(b_reader.read(16).await.unwrap(), b"ping");

        b_writer.send(b"pong").await.unwrap();
        assert_eq!(a_reader.read(16).await.unwrap(), b"pong");
    }
}
