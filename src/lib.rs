//! Two-party video intercom relay
//!
//! A relay server that lets at most one client broadcast at a time and fans
//! the latest image and audio out to every connected client, plus the client
//! side used to publish frames and play the relayed broadcast back.
//!
//! # Server
//!
//! ```no_run
//! use intercom_relay::{IntercomServer, ServerConfig};
//!
//! # async fn example() -> intercom_relay::Result<()> {
//! let server = IntercomServer::new(ServerConfig::default());
//! server.run_until(async {
//!     let _ = tokio::signal::ctrl_c().await;
//! }).await
//! # }
//! ```
//!
//! # Client
//!
//! ```no_run
//! use intercom_relay::client::{ClientConfig, IntercomConnector};
//! use intercom_relay::media::{FrameSource, TestPattern};
//!
//! # async fn example() -> intercom_relay::Result<()> {
//! let config = ClientConfig::new("127.0.0.1:6000".parse().unwrap()).name("alice");
//! let (mut sender, mut receiver) = IntercomConnector::connect(config).await?;
//!
//! let mut source = TestPattern::new(640, 360);
//! sender.send_image(source.next_image()).await?;
//!
//! while let Some(msg) = receiver.next_message().await? {
//!     println!("{:?}", msg.name());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod media;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod session;
pub mod stats;

pub use error::{Error, Result};
pub use server::{IntercomServer, ServerConfig};
