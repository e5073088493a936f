//! Byte-stream frame extraction under a bounded read deadline (§4.3).
//!
//! No partial state survives across calls: a short read on any step
//! simply returns `None`, and the next call starts fresh at the sync
//! marker. See SPEC_FULL.md / DESIGN.md for why this repo keeps that
//! behavior rather than the ring-buffer resync hinted at in §9.

use crate::channel::ByteChannelReader;
use crate::core;
use crate::message::Message;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// How long to sleep between short-read retries within one step.
const RETRY_SLEEP: Duration = Duration::from_millis(10);

/// Reads whole frames off the read half of a byte channel, bounded by
/// `read_timeout`.
pub struct FrameReader<C> {
    channel: C,
    read_timeout: Duration,
}

impl<C: ByteChannelReader> FrameReader<C> {
    /// Wraps a byte channel with the given per-frame read timeout.
    pub fn new(channel: C, read_timeout: Duration) -> Self {
        Self {
            channel,
            read_timeout,
        }
    }

    /// Returns the underlying channel, consuming the reader.
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Attempts to read exactly one frame before the deadline elapses.
    /// Returns `None` on any short read, bad sync marker, or a decode
    /// rejection (§4.1, §4.3, §7 — framing errors are not surfaced).
    pub async fn receive_frame(&mut self) -> Option<Message> {
        let deadline = Instant::now() + self.read_timeout;

        let sync = self.read_exact_by(2, deadline).await?;
        if sync != core::SYNC_MARKER {
            log::debug!("frame reader: bad sync marker, discarding");
            return None;
        }

        let length_bytes = self.read_exact_by(4, deadline).await?;
        let length = u32::from_be_bytes(length_bytes.as_slice().try_into().unwrap()) as usize;

        let body = self.read_exact_by(length, deadline).await?;
        let checksum = self.read_exact_by(2, deadline).await?;

        let mut frame = Vec::with_capacity(2 + 4 + length + 2);
        frame.extend_from_slice(&sync);
        frame.extend_from_slice(&length_bytes);
        frame.extend_from_slice(&body);
        frame.extend_from_slice(&checksum);

        match core::decode(&frame) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::debug!("frame reader: rejected frame: {e}");
                None
            }
        }
    }

    /// Reads exactly `n` bytes, sleeping briefly between short reads,
    /// until satisfied or `deadline` passes.
    async fn read_exact_by(&mut self, n: usize, deadline: Instant) -> Option<Vec<u8>> {
        let mut collected = Vec::with_capacity(n);
        while collected.len() < n {
            if Instant::now() >= deadline {
                return None;
            }
            match self.channel.read(n - collected.len()).await {
                Ok(chunk) if !chunk.is_empty() => collected.extend_from_slice(&chunk),
                Ok(_) => sleep(RETRY_SLEEP).await,
                Err(e) => {
                    log::warn!("frame reader: transport error: {e}");
                    return None;
                }
            }
        }
        Some(collected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoopbackChannel;
    use crate::message::Header;
    use std::time::Duration;

    #[tokio::test]
    async fn reads_a_whole_frame() {
        let (mut tx, rx) = LoopbackChannel::pair();
        let mut reader = FrameReader::new(rx, Duration::from_millis(200));

        let msg = Message::SyncRequest {
            header: Header {
                packet_id: 7,
                need_ack: true,
                timestamp: 42,
            },
        };
        tx.send(&crate::core::encode(&msg)).await.unwrap();

        assert_eq!(reader.receive_frame().await, Some(msg));
    }

    #[tokio::test]
    async fn times_out_on_no_data() {
        let (_tx, rx) = LoopbackChannel::pair();
        let mut reader = FrameReader::new(rx, Duration::from_millis(50));
        assert_eq!(reader.receive_frame().await, None);
    }

    #[tokio::test]
    async fn splits_frame_across_two_writes() {
        let (mut tx, rx) = LoopbackChannel::pair();
        let mut reader = FrameReader::new(rx, Duration::from_millis(500));

        let msg = Message::StartRequest {
            header: Header {
                packet_id: 1,
                need_ack: true,
                timestamp: 1,
            },
        };
        let frame = crate::core::encode(&msg);
        let (first, second) = frame.split_at(3);
        tx.send(first).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(second).await.unwrap();

        assert_eq!(reader.receive_frame().await, Some(msg));
    }

    #[tokio::test]
    async fn rejects_then_resyncs_on_next_call() {
        let (mut tx, rx) = LoopbackChannel::pair();
        let mut reader = FrameReader::new(rx, Duration::from_millis(200));

        // Junk bytes that aren't a sync marker at all.
        tx.send(&[0x00, 0x01]).await.unwrap();
        assert_eq!(reader.receive_frame().await, None);

        let msg = Message::StopRequest {
            header: Header {
                packet_id: 2,
                need_ack: true,
                timestamp: 2,
            },
        };
        tx.send(&crate::core::encode(&msg)).await.unwrap();
        assert_eq!(reader.receive_frame().await, Some(msg));
    }
}
