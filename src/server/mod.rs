//! Intercom relay server
//!
//! Accepts TCP connections and runs one session per client over the shared
//! broadcast hub.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::Connection;
pub use listener::IntercomServer;
