//! The packet manager: ties the byte channel, frame reader, send
//! queue, and outstanding-ack table into the sender/receiver worker
//! pair described in §4.4 and §5.

use super::queue::{AckTimeoutObserver, IdAllocator, OutstandingTable, SendQueue};
use crate::channel::{ByteChannel, ByteChannelReader, ByteChannelWriter, SharedReader, SharedWriter};
use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::frame_reader::FrameReader;
use crate::message::{current_timestamp_us, Header, Message};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Bound on how long `stop()` waits for each worker to join.
const WORKER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on how long the sender blocks waiting for the next queued
/// message before running a retry sweep.
const SENDER_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Allocates ids, serializes outbound traffic, tracks ack-requiring
/// sends, retransmits on timeout, and delivers inbound messages to
/// whatever closure was supplied at construction (§4.4).
pub struct PacketManager {
    config: ManagerConfig,
    channel: Mutex<Option<Box<dyn ByteChannel>>>,
    reader: Mutex<Option<SharedReader>>,
    writer: Mutex<Option<SharedWriter>>,
    queue: Arc<SendQueue>,
    outstanding: Arc<OutstandingTable>,
    ids: Arc<IdAllocator>,
    running: Arc<AtomicBool>,
    ack_timeout_observer: Option<AckTimeoutObserver>,
    inbound_handler: Arc<dyn Fn(Message) + Send + Sync>,
    sender_handle: Mutex<Option<JoinHandle<()>>>,
    receiver_handle: Mutex<Option<JoinHandle<()>>>,
}

impl PacketManager {
    /// Builds a manager over the given channel. `inbound_handler` is
    /// called with every non-Ack decoded message, after the automatic
    /// Ack (if any) has already been enqueued (§4.4.1).
    pub fn new(
        config: ManagerConfig,
        channel: Box<dyn ByteChannel>,
        inbound_handler: Arc<dyn Fn(Message) + Send + Sync>,
    ) -> Self {
        Self {
            config,
            channel: Mutex::new(Some(channel)),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            queue: Arc::new(SendQueue::new()),
            outstanding: Arc::new(OutstandingTable::new()),
            ids: Arc::new(IdAllocator::new()),
            running: Arc::new(AtomicBool::new(false)),
            ack_timeout_observer: None,
            inbound_handler,
            sender_handle: Mutex::new(None),
            receiver_handle: Mutex::new(None),
        }
    }

    /// Registers the callback invoked when an outstanding message
    /// exhausts `max_retries` (§7's "ack timeout" error class).
    pub fn with_ack_timeout_observer(mut self, observer: AckTimeoutObserver) -> Self {
        self.ack_timeout_observer = Some(observer);
        self
    }

    /// Allocates the next packet id (§4.4's `generate_packet_id`).
    pub fn next_packet_id(&self) -> u32 {
        self.ids.next_id()
    }

    /// Builds a header with a fresh id and the current timestamp.
    pub fn new_header(&self, need_ack: bool) -> Header {
        Header {
            packet_id: self.next_packet_id(),
            need_ack,
            timestamp: current_timestamp_us(),
        }
    }

    /// Enqueues a message for the sender worker, prioritizing it by
    /// `message.header().need_ack`.
    pub fn enqueue(&self, message: Message) {
        self.queue.push(message);
    }

    /// Connects the channel, splits it into independent read and write
    /// halves (§5), clears the stop flag, and spawns the sender and
    /// receiver workers. Calling `start` while already running is a
    /// logic error the caller should avoid; `stop` must be awaited
    /// first.
    pub async fn start(&self) -> Result<()> {
        let mut channel = self.channel.lock().unwrap().take().ok_or(Error::Closed)?;
        channel.connect().await?;
        let (reader_half, writer_half) = channel.split()?;
        let reader = SharedReader::new(reader_half);
        let writer = SharedWriter::new(writer_half);
        *self.reader.lock().unwrap() = Some(reader.clone());
        *self.writer.lock().unwrap() = Some(writer.clone());

        self.running.store(true, Ordering::SeqCst);

        let sender = tokio::spawn(run_sender(
            writer,
            self.queue.clone(),
            self.outstanding.clone(),
            self.running.clone(),
            self.config.ack_timeout,
            self.config.max_retries,
            self.ack_timeout_observer.clone(),
        ));
        *self.sender_handle.lock().unwrap() = Some(sender);

        let receiver = tokio::spawn(run_receiver(
            reader,
            self.config.read_timeout,
            self.queue.clone(),
            self.outstanding.clone(),
            self.ids.clone(),
            self.running.clone(),
            self.inbound_handler.clone(),
        ));
        *self.receiver_handle.lock().unwrap() = Some(receiver);

        Ok(())
    }

    /// Stops both workers and closes both channel halves. Safe to call
    /// more than once; calls after the first are no-ops (§4.4).
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let sender = self.sender_handle.lock().unwrap().take();
        if let Some(handle) = sender {
            if tokio::time::timeout(WORKER_JOIN_TIMEOUT, handle)
                .await
                .is_err()
            {
                log::warn!("sender worker did not stop within {WORKER_JOIN_TIMEOUT:?}");
            }
        }

        let receiver = self.receiver_handle.lock().unwrap().take();
        if let Some(handle) = receiver {
            if tokio::time::timeout(WORKER_JOIN_TIMEOUT, handle)
                .await
                .is_err()
            {
                log::warn!("receiver worker did not stop within {WORKER_JOIN_TIMEOUT:?}");
            }
        }

        let writer = self.writer.lock().unwrap().take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.close().await {
                log::warn!("error closing channel writer on stop: {e}");
            }
        }

        let reader = self.reader.lock().unwrap().take();
        if let Some(mut reader) = reader {
            if let Err(e) = reader.close().await {
                log::warn!("error closing channel reader on stop: {e}");
            }
        }
    }
}

async fn run_sender(
    mut channel: SharedWriter,
    queue: Arc<SendQueue>,
    outstanding: Arc<OutstandingTable>,
    running: Arc<AtomicBool>,
    ack_timeout: Duration,
    max_retries: u32,
    ack_timeout_observer: Option<AckTimeoutObserver>,
) {
    while running.load(Ordering::SeqCst) {
        match queue.pop_timeout(SENDER_POLL_INTERVAL).await {
            Some(message) => {
                let header = *message.header();
                let frame = crate::core::encode(&message);
                match channel.send(&frame).await {
                    Ok(()) => {
                        if header.need_ack {
                            outstanding.register(header.packet_id, message);
                        }
                    }
                    Err(e) => log::warn!("sender: transport error: {e}"),
                }
            }
            None => retry_sweep(
                &mut channel,
                &outstanding,
                ack_timeout,
                max_retries,
                ack_timeout_observer.as_ref(),
            )
            .await,
        }
    }
}

async fn retry_sweep(
    channel: &mut SharedWriter,
    outstanding: &OutstandingTable,
    ack_timeout: Duration,
    max_retries: u32,
    ack_timeout_observer: Option<&AckTimeoutObserver>,
) {
    let (to_retry, gave_up) = outstanding.sweep(ack_timeout, max_retries);

    for (packet_id, message) in to_retry {
        let frame = crate::core::encode(&message);
        if let Err(e) = channel.send(&frame).await {
            log::warn!("sender: retry of packet {packet_id} failed: {e}");
        }
    }

    for message in gave_up {
        log::warn!(
            "ack timeout: packet {} exhausted retries",
            message.header().packet_id
        );
        if let Some(observer) = ack_timeout_observer {
            observer(message);
        }
    }
}

async fn run_receiver(
    channel: SharedReader,
    read_timeout: Duration,
    queue: Arc<SendQueue>,
    outstanding: Arc<OutstandingTable>,
    ids: Arc<IdAllocator>,
    running: Arc<AtomicBool>,
    inbound_handler: Arc<dyn Fn(Message) + Send + Sync>,
) {
    let mut reader = FrameReader::new(channel, read_timeout);
    while running.load(Ordering::SeqCst) {
        if let Some(message) = reader.receive_frame().await {
            handle_inbound(message, &queue, &outstanding, &ids, &inbound_handler);
        }
    }
}

/// §4.4.1: Acks are consumed here; ack-requiring messages get their
/// reply Ack enqueued before the handler sees them.
fn handle_inbound(
    message: Message,
    queue: &SendQueue,
    outstanding: &OutstandingTable,
    ids: &IdAllocator,
    inbound_handler: &Arc<dyn Fn(Message) + Send + Sync>,
) {
    if let Message::Ack { ack_id, .. } = &message {
        if !outstanding.acknowledge(*ack_id) {
            log::debug!("ack for unknown packet {ack_id} discarded");
        }
        return;
    }

    if message.header().need_ack {
        let ack = Message::Ack {
            header: Header {
                packet_id: ids.next_id(),
                need_ack: false,
                timestamp: current_timestamp_us(),
            },
            ack_id: message.header().packet_id,
        };
        queue.push(ack);
    }

    inbound_handler(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::LoopbackChannel;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration as StdDuration;
    use tokio::sync::Mutex as AsyncMutex;

    fn config_with(ack_timeout_ms: u64, max_retries: u32) -> ManagerConfig {
        ManagerConfig::new()
            .with_ack_timeout(StdDuration::from_millis(ack_timeout_ms))
            .with_max_retries(max_retries)
            .with_read_timeout(StdDuration::from_millis(50))
    }

    #[tokio::test]
    async fn ack_requiring_message_is_acknowledged_and_stops_retrying() {
        let (a, b) = LoopbackChannel::pair();
        let received: Arc<AsyncMutex<Vec<Message>>> = Arc::new(AsyncMutex::new(Vec::new()));
        let received_clone = received.clone();

        let manager_a = PacketManager::new(config_with(100, 5), Box::new(a), Arc::new(|_msg| {}));
        let manager_b = PacketManager::new(
            config_with(100, 5),
            Box::new(b),
            Arc::new(move |msg| {
                let received = received_clone.clone();
                tokio::spawn(async move {
                    received.lock().await.push(msg);
                });
            }),
        );

        manager_a.start().await.unwrap();
        manager_b.start().await.unwrap();

        let header = manager_a.new_header(true);
        manager_a.enqueue(Message::StartRequest { header });

        tokio::time::sleep(StdDuration::from_millis(150)).await;

        let seen = received.lock().await;
        assert_eq!(seen.len(), 1);
        match &seen[0] {
            Message::StartRequest { header: h } => assert_eq!(h.packet_id, header.packet_id),
            other => panic!("unexpected message: {other:?}"),
        }
        drop(seen);

        manager_a.stop().await;
        manager_b.stop().await;
    }

    #[tokio::test]
    async fn retry_exhaustion_invokes_timeout_observer_once() {
        let (a, _b) = LoopbackChannel::pair();
        let timeouts: Arc<AsyncMutex<Vec<u32>>> = Arc::new(AsyncMutex::new(Vec::new()));
        let timeouts_clone = timeouts.clone();
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();

        let observer: AckTimeoutObserver = Arc::new(move |msg: Message| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            let timeouts = timeouts_clone.clone();
            let packet_id = msg.header().packet_id;
            tokio::spawn(async move {
                timeouts.lock().await.push(packet_id);
            });
        });

        let manager = PacketManager::new(config_with(50, 1), Box::new(a), Arc::new(|_| {}))
            .with_ack_timeout_observer(observer);
        manager.start().await.unwrap();

        let header = manager.new_header(true);
        manager.enqueue(Message::SyncRequest { header });

        tokio::time::sleep(StdDuration::from_millis(400)).await;
        manager.stop().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(timeouts.lock().await.as_slice(), &[header.packet_id]);
    }
}
