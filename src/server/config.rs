//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::media::ImageFrame;
use crate::protocol::constants::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
use crate::relay::RelayConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Largest message payload accepted from a client
    pub max_message_size: usize,

    /// Relay tunables
    pub relay: RelayConfig,

    /// Default media sent to each client on connect
    pub standby_image: Option<ImageFrame>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Frames are latency sensitive
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            relay: RelayConfig::default(),
            standby_image: None,
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

    /// Set the listen port, keeping the host
    pub fn port(mut self, port: u16) -> Self {
        self.bind_addr.set_port(port);
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the maximum accepted message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the staleness window
    pub fn staleness_window(mut self, window: Duration) -> Self {
        self.relay = self.relay.staleness_window(window);
        self
    }

    /// Set the minimum interval between relayed images
    pub fn min_video_interval(mut self, interval: Duration) -> Self {
        self.relay = self.relay.min_video_interval(interval);
        self
    }

    /// Replace the relay configuration
    pub fn relay(mut self, relay: RelayConfig) -> Self {
        self.relay = relay;
        self
    }

    /// Set the default media shown to clients
    pub fn standby_image(mut self, image: ImageFrame) -> Self {
        self.standby_image = Some(image);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 6000);
        assert_eq!(config.max_connections, 0);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert!(config.tcp_nodelay);
        assert!(config.standby_image.is_none());
        assert_eq!(config.relay.staleness_window, Duration::from_millis(300));
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:6001".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 6001);
    }

    #[test]
    fn test_builder_port() {
        let config = ServerConfig::default().port(7000);

        assert_eq!(config.bind_addr.port(), 7000);
        assert!(config.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:6000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .max_connections(50)
            .max_message_size(1024)
            .staleness_window(Duration::from_millis(500))
            .min_video_interval(Duration::from_millis(20))
            .standby_image(ImageFrame::new(1, 1, 16, vec![0u8; 3]));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_connections, 50);
        assert_eq!(config.max_message_size, 1024);
        assert_eq!(config.relay.staleness_window, Duration::from_millis(500));
        assert_eq!(config.relay.min_video_interval, Duration::from_millis(20));
        assert!(config.standby_image.is_some());
    }
}
