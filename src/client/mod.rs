//! Intercom client
//!
//! Provides the client side of the relay:
//! - Publishing captured frames to the server, switchable on and off
//! - Consuming the relayed broadcast for playback

pub mod capture;
pub mod config;
pub mod connector;
pub mod display;
pub mod playback;

pub use capture::CaptureLoop;
pub use config::ClientConfig;
pub use connector::{BroadcastSender, IntercomConnector, RelayReceiver};
pub use display::{DisplaySink, LoggingDisplay};
pub use playback::{PlaybackConsumer, PlaybackEvent};
