//! The message model: the `Header` every message carries, the thirteen
//! variant bodies, and the plain data records handed to observers.
//!
//! Field order within each variant is part of the wire contract (§3,
//! §6.2) and must match `codec.rs` exactly.

/// Header carried by every message (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Nonzero 31-bit id, unique per sender within a wrap cycle.
    pub packet_id: u32,

    /// Whether the peer should Ack this message.
    pub need_ack: bool,

    /// Microseconds since the Unix epoch at construction.
    pub timestamp: u64,
}

/// The tagged-union message. Variant order here fixes the wire tag
/// values used by `codec.rs` (`Ack` = 0, ... `Error` = 12).
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Ack { header: Header, ack_id: u32 },
    SyncRequest { header: Header },
    SyncResponse { header: Header, success: bool },
    ConfigRequest { header: Header, body: ConfigRequestData },
    ConfigResponse { header: Header, success: bool },
    GPS { header: Header, body: GpsData },
    Ping { header: Header, body: PingData },
    LocEst { header: Header, body: LocEstData },
    StartRequest { header: Header },
    StartResponse { header: Header, success: bool },
    StopRequest { header: Header },
    StopResponse { header: Header, success: bool },
    Error { header: Header },
}

impl Message {
    /// Returns the header shared by every variant.
    pub fn header(&self) -> &Header {
        match self {
            Message::Ack { header, .. }
            | Message::SyncRequest { header }
            | Message::SyncResponse { header, .. }
            | Message::ConfigRequest { header, .. }
            | Message::ConfigResponse { header, .. }
            | Message::GPS { header, .. }
            | Message::Ping { header, .. }
            | Message::LocEst { header, .. }
            | Message::StartRequest { header }
            | Message::StartResponse { header, .. }
            | Message::StopRequest { header }
            | Message::StopResponse { header, .. }
            | Message::Error { header } => header,
        }
    }

    /// The wire tag for this variant (§6.2's stable tag identity, here
    /// a single byte instead of a string — see DESIGN.md).
    pub fn tag(&self) -> u8 {
        match self {
            Message::Ack { .. } => 0,
            Message::SyncRequest { .. } => 1,
            Message::SyncResponse { .. } => 2,
            Message::ConfigRequest { .. } => 3,
            Message::ConfigResponse { .. } => 4,
            Message::GPS { .. } => 5,
            Message::Ping { .. } => 6,
            Message::LocEst { .. } => 7,
            Message::StartRequest { .. } => 8,
            Message::StartResponse { .. } => 9,
            Message::StopRequest { .. } => 10,
            Message::StopResponse { .. } => 11,
            Message::Error { .. } => 12,
        }
    }
}

/// Data record for a config request (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigRequestData {
    pub gain: f32,
    pub sampling_rate: u32,
    pub center_frequency: u32,
    pub run_num: u32,
    pub enable_test_data: bool,
    pub ping_width_ms: u32,
    pub ping_min_snr: i32,
    pub ping_max_len_mult: f32,
    pub ping_min_len_mult: f32,
    pub target_frequencies: Vec<u32>,
}

/// Data record for a GPS fix (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsData {
    pub easting: f64,
    pub northing: f64,
    pub altitude: f64,
    pub heading: f64,
    pub epsg_code: u32,
}

/// Data record for a radio ping detection (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingData {
    pub frequency: u32,
    pub amplitude: f64,
    pub easting: f64,
    pub northing: f64,
    pub altitude: f64,
    pub epsg_code: u32,
}

/// Data record for a location estimate (§3).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocEstData {
    pub frequency: u32,
    pub easting: f64,
    pub northing: f64,
    pub epsg_code: u32,
}

/// Plain structs exposed to observers/send callers, pairing header
/// fields with variant-specific fields (§4.5 step 1, "data record").
pub mod records {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SyncRequestRecord {
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct SyncResponseRecord {
        pub success: bool,
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct ConfigRequestRecord {
        pub data: ConfigRequestData,
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct ConfigResponseRecord {
        pub success: bool,
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct GpsRecord {
        pub data: GpsData,
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct PingRecord {
        pub data: PingData,
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct LocEstRecord {
        pub data: LocEstData,
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct StartRequestRecord {
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct StartResponseRecord {
        pub success: bool,
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct StopRequestRecord {
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct StopResponseRecord {
        pub success: bool,
        pub packet_id: u32,
        pub timestamp: u64,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct ErrorRecord {
        pub packet_id: u32,
        pub timestamp: u64,
    }
}

/// Returns the current time as microseconds since the Unix epoch.
pub fn current_timestamp_us() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as u64
}
