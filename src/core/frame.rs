//! Wire framing: sync marker + length + body + checksum (§4.1, §6.1).
//!
//! ```text
//! +--------+--------+--------+----------+----------+
//! | AA 55  | length | body   | checksum |
//! | 2 bytes| 4 bytes| length | 2 bytes  |
//! +--------+--------+--------+----------+
//! ```
//! Length and checksum are big-endian; the body's own fields are
//! little-endian (§4.1) and handled by `core::body`.

use super::body;
use super::checksum::Crc16;
use crate::error::{Error, Result};
use crate::message::Message;

/// The two bytes that begin every valid frame.
pub const SYNC_MARKER: [u8; 2] = [0xAA, 0x55];

/// Size of the fixed framing overhead (sync + length + checksum).
const FRAMING_OVERHEAD: usize = SYNC_MARKER.len() + 4 + 2;

/// Encodes a message into a complete frame. Never fails for a
/// well-formed message (§4.1).
pub fn encode(msg: &Message) -> Vec<u8> {
    let body = body::serialize(msg);
    let length = body.len() as u32;

    let mut frame = Vec::with_capacity(FRAMING_OVERHEAD + body.len());
    frame.extend_from_slice(&SYNC_MARKER);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.extend_from_slice(&body);

    let checksum = Crc16::compute(&frame);
    frame.extend_from_slice(&checksum.to_be_bytes());
    frame
}

/// Decodes a complete candidate frame. Rejection is a single outcome
/// with no subtypes exposed to callers beyond the logged reason (§4.1).
pub fn decode(bytes: &[u8]) -> Result<Message> {
    if bytes.len() < FRAMING_OVERHEAD {
        return Err(Error::ShortBuffer);
    }
    if bytes[0..2] != SYNC_MARKER {
        return Err(Error::BadSyncMarker);
    }

    let length = u32::from_be_bytes(bytes[2..6].try_into().unwrap()) as usize;
    let expected_total = FRAMING_OVERHEAD + length;
    if bytes.len() != expected_total {
        return Err(Error::LengthMismatch);
    }

    let body_end = 6 + length;
    let stored_checksum = u16::from_be_bytes(bytes[body_end..body_end + 2].try_into().unwrap());
    let computed_checksum = Crc16::compute(&bytes[0..body_end]);
    if stored_checksum != computed_checksum {
        return Err(Error::ChecksumMismatch);
    }

    body::deserialize(&bytes[6..body_end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Header;

    fn sample_ack() -> Message {
        Message::Ack {
            header: Header {
                packet_id: 1234,
                need_ack: false,
                timestamp: 999_999,
            },
            ack_id: 5678,
        }
    }

    #[test]
    fn roundtrip_ack() {
        let msg = sample_ack();
        let frame = encode(&msg);
        assert_eq!(&frame[0..2], &SYNC_MARKER);
        assert_eq!(decode(&frame).unwrap(), msg);
    }

    #[test]
    fn truncated_frame_rejected() {
        // Meets the minimum frame size but declares a body length that
        // doesn't match what's actually present.
        let bytes = [0xAA, 0x55, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00];
        assert!(matches!(decode(&bytes), Err(Error::LengthMismatch)));
    }

    #[test]
    fn bad_checksum_rejected() {
        let mut frame = encode(&sample_ack());
        let last = frame.len();
        frame[last - 2] = 0x00;
        frame[last - 1] = 0x00;
        assert!(matches!(decode(&frame), Err(Error::ChecksumMismatch)));
    }

    #[test]
    fn bad_sync_marker_rejected() {
        let mut frame = encode(&sample_ack());
        frame[0] = 0x00;
        assert!(matches!(decode(&frame), Err(Error::BadSyncMarker)));
    }

    #[test]
    fn too_short_rejected() {
        assert!(matches!(decode(&[0xAA, 0x55]), Err(Error::ShortBuffer)));
    }

    #[test]
    fn single_byte_corruption_in_body_is_rejected() {
        let mut frame = encode(&sample_ack());
        // Flip a byte inside the body region.
        frame[8] ^= 0xFF;
        assert!(matches!(decode(&frame), Err(Error::ChecksumMismatch)));
    }
}
