//! Core wire-format building blocks: the body schema, checksum, and
//! frame encode/decode.

mod body;
mod checksum;
mod frame;

pub use checksum::Crc16;
pub use frame::{decode, encode, SYNC_MARKER};
