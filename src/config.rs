//! Configuration knobs for the packet manager and channel endpoints.
//!
//! Mirrors the teacher's `TransportConfig`: a plain struct with
//! `with_*` builder methods and sane defaults, constructed explicitly
//! rather than parsed from a file.

use std::time::Duration;

/// Default time to wait for an Ack before retrying (§6.4).
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of retransmissions before giving up (§6.4).
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default bound on a single frame receive attempt (§6.4).
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Default serial baud rate (§6.3).
pub const DEFAULT_BAUD_RATE: u32 = 56700;

/// Default TCP client connect timeout (§6.3).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the packet manager's retry/timeout behavior.
#[derive(Debug, Clone, Copy)]
pub struct ManagerConfig {
    /// Maximum age of an outstanding entry before it is retried.
    pub ack_timeout: Duration,

    /// Maximum retransmissions per outstanding message before giveup.
    pub max_retries: u32,

    /// Bound on each frame receive attempt.
    pub read_timeout: Duration,
}

impl ManagerConfig {
    /// Creates a configuration with the defaults from §6.4.
    pub fn new() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Overrides the ack timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Overrides the max retransmission count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Overrides the per-frame read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a serial byte channel.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0`.
    pub port: String,

    /// Bit rate.
    pub baud_rate: u32,

    /// Bound on each read attempt.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Creates a serial channel config for the given device path.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Overrides the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Overrides the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Configuration for a TCP client byte channel (simulation).
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Host to connect to.
    pub host: String,

    /// TCP port to connect to.
    pub port: u16,

    /// Bound on the initial connect.
    pub connect_timeout: Duration,

    /// Bound on each subsequent read attempt.
    pub read_timeout: Duration,
}

impl TcpClientConfig {
    /// Creates a TCP client config for the given host/port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Overrides the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Configuration for a TCP server byte channel (simulation).
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    /// Address to bind to, e.g. `0.0.0.0:50000`.
    pub bind_addr: String,

    /// Bound on each read attempt once a peer is connected.
    pub read_timeout: Duration,
}

impl TcpServerConfig {
    /// Creates a TCP server config bound to the given address.
    pub fn new(bind_addr: impl Into<String>) -> Self {
        Self {
            bind_addr: bind_addr.into(),
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Overrides the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}
