//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::hub::HubConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Path clients upgrade on
    pub path: String,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// WebSocket handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Hub and per-session settings
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            path: "/ws".to_string(),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the upgrade path
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Replace the hub configuration
    pub fn hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.path, "/ws");
        assert_eq!(config.max_connections, 0);
        assert!(config.tcp_nodelay);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 9001);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .path("/events")
            .max_connections(50)
            .handshake_timeout(Duration::from_secs(5))
            .hub(HubConfig::default().queue_capacity(16));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.path, "/events");
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.handshake_timeout, Duration::from_secs(5));
        assert_eq!(config.hub.queue_capacity, 16);
    }
}
