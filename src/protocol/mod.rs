//! Intercom wire protocol
//!
//! One TCP connection per client carries tagged messages in both directions:
//! published frames and a name announcement upstream, relayed frames, status
//! and admission replies downstream.

pub mod codec;
pub mod constants;
pub mod message;

pub use codec::{MessageReader, MessageWriter};
pub use message::Message;
