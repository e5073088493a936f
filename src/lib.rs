//! Reliable, bidirectional, packet-oriented messaging core for a
//! drone/ground-control radio telemetry link: framing and integrity
//! checking, schema-encoded message bodies, priority-queued
//! acknowledged delivery with retry-on-timeout, and typed dispatch to
//! registered observers.

pub mod channel;
pub mod config;
mod core;
pub mod dispatch;
pub mod error;
mod frame_reader;
mod message;
mod reliable;

pub use channel::{
    ByteChannel, ByteChannelReader, ByteChannelWriter, LoopbackChannel, SerialChannel,
    TcpClientChannel, TcpServerChannel,
};
pub use config::{ManagerConfig, SerialConfig, TcpClientConfig, TcpServerConfig};
pub use dispatch::{DroneLink, ObserverFn, ObserverId, SendStamp};
pub use error::{Error, Result};
pub use message::{
    records, ConfigRequestData, GpsData, Header, LocEstData, Message, PingData,
};
pub use reliable::AckTimeoutObserver;
