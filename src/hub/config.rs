//! Hub configuration

use std::time::Duration;

/// Default capacity of each session's outbound queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Hub and per-session tuning
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Outbound queue capacity per session; a full queue evicts the session
    pub queue_capacity: usize,

    /// Maximum time a single write to a connection may take
    pub write_timeout: Duration,

    /// Keepalive ping interval (None = no pings)
    pub ping_interval: Option<Duration>,

    /// Send a `connection-status: connected` event to every admitted client
    pub send_greeting: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            write_timeout: Duration::from_secs(10),
            ping_interval: Some(Duration::from_secs(54)),
            send_greeting: true,
        }
    }
}

impl HubConfig {
    /// Set the per-session queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the write timeout
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the keepalive ping interval; zero disables pings
    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval).filter(|period| !period.is_zero());
        self
    }

    /// Disable keepalive pings
    pub fn disable_ping(mut self) -> Self {
        self.ping_interval = None;
        self
    }

    /// Do not greet newly admitted clients
    pub fn disable_greeting(mut self) -> Self {
        self.send_greeting = false;
        self
    }
}
