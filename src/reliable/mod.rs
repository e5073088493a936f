//! The concurrency heart of the crate: id allocation, the outbound
//! priority queue, outstanding-ack tracking, and the sender/receiver
//! worker loops (§4.4).

mod manager;
mod queue;

pub use manager::PacketManager;
pub use queue::AckTimeoutObserver;
