//! The outbound send queue and the outstanding-ack table (§4.4, §5).

use crate::message::Message;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Notify;

/// Called with the original message when an outstanding entry exhausts
/// its retries (§7's "ack timeout" error class). `Arc`-wrapped so the
/// sender worker can hold its own clone across the task boundary.
pub type AckTimeoutObserver = Arc<dyn Fn(Message) + Send + Sync>;

/// Two FIFO lanes behind one lock, rather than a single priority heap:
/// ties within a class only ever need to break FIFO, and a pair of
/// `VecDeque`s gets that for free without a comparator (see DESIGN.md).
#[derive(Default)]
struct Lanes {
    need_ack: VecDeque<Message>,
    plain: VecDeque<Message>,
}

/// Thread-safe send queue with two priority lanes. Priority 0
/// (`need_ack == true`) always drains before priority 1.
pub struct SendQueue {
    lanes: Mutex<Lanes>,
    notify: Notify,
}

impl SendQueue {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Lanes::default()),
            notify: Notify::new(),
        }
    }

    /// Enqueues a message into the lane matching its ack requirement.
    pub fn push(&self, msg: Message) {
        let mut lanes = self.lanes.lock().unwrap();
        if msg.header().need_ack {
            lanes.need_ack.push_back(msg);
        } else {
            lanes.plain.push_back(msg);
        }
        drop(lanes);
        self.notify.notify_one();
    }

    /// Pops the next message, preferring the need-ack lane, waiting up
    /// to `timeout` for one to appear if both lanes are empty.
    pub async fn pop_timeout(&self, timeout: std::time::Duration) -> Option<Message> {
        if let Some(msg) = self.try_pop() {
            return Some(msg);
        }
        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => self.try_pop(),
            _ = tokio::time::sleep(timeout) => None,
        }
    }

    fn try_pop(&self) -> Option<Message> {
        let mut lanes = self.lanes.lock().unwrap();
        lanes.need_ack.pop_front().or_else(|| lanes.plain.pop_front())
    }
}

/// Tracking record for a sent message awaiting its Ack (§3, §4.4).
#[derive(Clone)]
pub struct OutstandingEntry {
    pub message: Message,
    pub send_time: Instant,
    pub retries: u32,
}

/// Map from `packet_id` to outstanding entry. Lock scope never spans
/// an `.await` point: every method here is synchronous (§5).
#[derive(Default)]
pub struct OutstandingTable {
    entries: Mutex<HashMap<u32, OutstandingEntry>>,
}

impl OutstandingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes an entry for a just-sent ack-requiring message.
    pub fn register(&self, packet_id: u32, message: Message) {
        self.entries.lock().unwrap().insert(
            packet_id,
            OutstandingEntry {
                message,
                send_time: Instant::now(),
                retries: 0,
            },
        );
    }

    /// Removes the entry for `ack_id`, if present. Returns whether one
    /// was found, matching the "silently discarded" rule for a
    /// spurious Ack (§4.4.1).
    pub fn acknowledge(&self, ack_id: u32) -> bool {
        self.entries.lock().unwrap().remove(&ack_id).is_some()
    }

    /// Sweeps all entries older than `ack_timeout`. Entries within
    /// `max_retries` are returned for retransmission with their retry
    /// count bumped in place; entries that have exhausted retries are
    /// removed and returned separately for the timeout observer.
    pub fn sweep(
        &self,
        ack_timeout: std::time::Duration,
        max_retries: u32,
    ) -> (Vec<(u32, Message)>, Vec<Message>) {
        let mut to_retry = Vec::new();
        let mut to_give_up = Vec::new();
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();

        entries.retain(|&packet_id, entry| {
            if now.duration_since(entry.send_time) < ack_timeout {
                return true;
            }
            if entry.retries < max_retries {
                entry.retries += 1;
                entry.send_time = now;
                to_retry.push((packet_id, entry.message.clone()));
                true
            } else {
                to_give_up.push(entry.message.clone());
                false
            }
        });

        (to_retry, to_give_up)
    }
}

/// Monotonic packet id generator over `[1, 0x7FFFFFFF]`, wrapping to 1
/// past the top of the range (§4.4).
pub struct IdAllocator {
    next: Mutex<u32>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: Mutex::new(1) }
    }

    /// Returns the next id and advances the counter.
    pub fn next_id(&self) -> u32 {
        let mut next = self.next.lock().unwrap();
        let id = *next;
        *next = if id >= 0x7FFF_FFFF { 1 } else { id + 1 };
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Header;

    fn msg(id: u32, need_ack: bool) -> Message {
        Message::StartRequest {
            header: Header {
                packet_id: id,
                need_ack,
                timestamp: 0,
            },
        }
    }

    #[test]
    fn id_allocator_wraps_to_one() {
        let alloc = IdAllocator::new();
        assert_eq!(alloc.next_id(), 1);
        assert_eq!(alloc.next_id(), 2);

        let alloc = IdAllocator {
            next: Mutex::new(0x7FFF_FFFF),
        };
        assert_eq!(alloc.next_id(), 0x7FFF_FFFF);
        assert_eq!(alloc.next_id(), 1);
    }

    #[tokio::test]
    async fn need_ack_drains_before_plain() {
        let queue = SendQueue::new();
        queue.push(msg(1, false));
        queue.push(msg(2, true));
        queue.push(msg(3, false));

        let first = queue.pop_timeout(std::time::Duration::from_millis(50)).await;
        assert_eq!(first.unwrap().header().packet_id, 2);
        let second = queue.pop_timeout(std::time::Duration::from_millis(50)).await;
        assert_eq!(second.unwrap().header().packet_id, 1);
    }

    #[tokio::test]
    async fn pop_times_out_when_empty() {
        let queue = SendQueue::new();
        let result = queue.pop_timeout(std::time::Duration::from_millis(20)).await;
        assert!(result.is_none());
    }

    #[test]
    fn outstanding_acknowledge_removes_entry() {
        let table = OutstandingTable::new();
        table.register(7, msg(7, true));
        assert!(table.acknowledge(7));
        assert!(!table.acknowledge(7));
    }

    #[test]
    fn outstanding_sweep_leaves_fresh_entries_alone() {
        let table = OutstandingTable::new();
        table.register(1, msg(1, true));
        let (retry, gave_up) = table.sweep(std::time::Duration::from_secs(10), 5);
        assert!(retry.is_empty());
        assert!(gave_up.is_empty());
    }
}
