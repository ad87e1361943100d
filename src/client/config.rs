//! Client configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::constants::{DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT};
use crate::relay::config::DEFAULT_STALENESS_WINDOW;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay server address
    pub server_addr: SocketAddr,

    /// Publisher name announced to the server
    pub name: Option<String>,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Enable TCP_NODELAY
    pub tcp_nodelay: bool,

    /// Largest message payload accepted from the server
    pub max_message_size: usize,

    /// How long playback keeps showing the broadcast without new images
    pub staleness_window: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            name: None,
            connect_timeout: Duration::from_secs(5),
            tcp_nodelay: true,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            staleness_window: DEFAULT_STALENESS_WINDOW,
        }
    }
}

impl ClientConfig {
    /// Create a config for the given server
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            ..Default::default()
        }
    }

    /// Set the publisher name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the playback staleness window
    pub fn staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.server_addr.to_string(), "127.0.0.1:6000");
        assert!(config.name.is_none());
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.staleness_window, Duration::from_millis(300));
    }

    #[test]
    fn test_builder() {
        let addr: SocketAddr = "10.0.0.2:7000".parse().unwrap();
        let config = ClientConfig::new(addr)
            .name("alice")
            .connect_timeout(Duration::from_millis(250))
            .tcp_nodelay(false)
            .staleness_window(Duration::from_millis(500));

        assert_eq!(config.server_addr, addr);
        assert_eq!(config.name.as_deref(), Some("alice"));
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
        assert!(!config.tcp_nodelay);
        assert_eq!(config.staleness_window, Duration::from_millis(500));
    }
}
