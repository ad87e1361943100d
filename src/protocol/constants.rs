//! Wire protocol constants

/// Default server port
pub const DEFAULT_PORT: u16 = 6000;

/// Message header: type (1) + payload length (4)
pub const HEADER_SIZE: usize = 5;

/// Default maximum payload size accepted from a peer (16 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Image payload prefix: height, width, format tag
pub const IMAGE_HEADER_SIZE: usize = 12;

// Message type IDs
pub const MSG_HELLO: u8 = 0x01;
pub const MSG_IMAGE: u8 = 0x02;
pub const MSG_AUDIO: u8 = 0x03;
pub const MSG_PUBLISH_REPLY: u8 = 0x04;
pub const MSG_BROADCAST_STATUS: u8 = 0x05;
pub const MSG_STANDBY: u8 = 0x06;

/// Rejection reason sent when another publisher holds the slot
pub const REASON_BACKOFF: &str = "BACKOFF";
