use std::time::Duration;

/// Default device address: the simulation server listens on localhost.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:30000";

/// Default number of connection attempts made by the host.
pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 5;

/// Connection settings for the TCP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TcpConfig {
    /// `host:port` to bind (device) or connect to (host).
    pub address: String,
    /// Number of connect attempts before giving up. Zero is treated as one.
    pub attempts: u32,
    /// Pause between two connect attempts.
    pub retry_delay: Duration,
    /// Disable Nagle's algorithm. Frames are small and latency-bound.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            attempts: DEFAULT_CONNECT_ATTEMPTS,
            retry_delay: Duration::from_secs(1),
            nodelay: true,
        }
    }
}

impl TcpConfig {
    /// Default settings pointed at `address`.
    pub fn with_address(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }
}
