//! Error types for the radio link core.

use std::fmt;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while framing, transporting, or
/// dispatching messages.
#[derive(Debug)]
pub enum Error {
    /// A candidate frame was shorter than the minimum possible frame.
    ShortBuffer,

    /// The first two bytes of a candidate frame were not the sync marker.
    BadSyncMarker,

    /// The recomputed CRC did not match the trailer.
    ChecksumMismatch,

    /// The length header didn't match the number of bytes actually present.
    LengthMismatch,

    /// The body carried a tag byte outside the known variant set.
    UnknownTag(u8),

    /// The body's own length-prefixed fields were internally inconsistent.
    MalformedBody,

    /// A required construction parameter was missing (e.g. no serial port path).
    MissingConfig(&'static str),

    /// The manager or channel has already been closed/stopped.
    Closed,

    /// Transport I/O failure, with the underlying cause.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ShortBuffer => write!(f, "buffer shorter than minimum frame size"),
            Error::BadSyncMarker => write!(f, "sync marker mismatch"),
            Error::ChecksumMismatch => write!(f, "checksum mismatch"),
            Error::LengthMismatch => write!(f, "frame length header did not match buffer size"),
            Error::UnknownTag(tag) => write!(f, "unknown message tag: 0x{tag:02x}"),
            Error::MalformedBody => write!(f, "malformed message body"),
            Error::MissingConfig(what) => write!(f, "missing required configuration: {what}"),
            Error::Closed => write!(f, "channel or manager is closed"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
