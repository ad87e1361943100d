//! Intercom protocol messages
//!
//! Every message travels as:
//!
//! ```text
//! +---------+----------------+-----------------+
//! | Type(1) | PayloadLen(4)  | Payload(N)      |
//! +---------+----------------+-----------------+
//! ```
//!
//! Payload layouts (big-endian):
//! ```text
//! Hello            name_len(2) name
//! Image / Standby  height(4) width(4) format(4) pixels...
//! Audio            sample(4)*
//! PublishReply     accepted(1) reason_len(2) reason
//! BroadcastStatus  live(1) name_len(2) name
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;
use crate::media::{AudioFrame, Frame, ImageFrame};

use super::constants::*;

/// A protocol message in either direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Client announces its publisher name
    Hello { name: String },
    /// Media frame (client to server when publishing, server to client when relaying)
    Frame(Frame),
    /// Admission outcome for a published image
    PublishReply { accepted: bool, reason: String },
    /// Whether a broadcast is currently live, and who holds it
    BroadcastStatus { live: bool, publisher: String },
    /// Server default media, shown when nothing is live
    Standby(ImageFrame),
}

impl Message {
    pub fn hello(name: impl Into<String>) -> Self {
        Message::Hello { name: name.into() }
    }

    pub fn accepted() -> Self {
        Message::PublishReply {
            accepted: true,
            reason: String::new(),
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Message::PublishReply {
            accepted: false,
            reason: reason.into(),
        }
    }

    /// Message type ID
    pub fn type_id(&self) -> u8 {
        match self {
            Message::Hello { .. } => MSG_HELLO,
            Message::Frame(Frame::Image(_)) => MSG_IMAGE,
            Message::Frame(Frame::Audio(_)) => MSG_AUDIO,
            Message::PublishReply { .. } => MSG_PUBLISH_REPLY,
            Message::BroadcastStatus { .. } => MSG_BROADCAST_STATUS,
            Message::Standby(_) => MSG_STANDBY,
        }
    }

    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Message::Hello { .. } => "Hello",
            Message::Frame(Frame::Image(_)) => "Image",
            Message::Frame(Frame::Audio(_)) => "Audio",
            Message::PublishReply { .. } => "PublishReply",
            Message::BroadcastStatus { .. } => "BroadcastStatus",
            Message::Standby(_) => "Standby",
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            Message::Hello { name } => 2 + string_len(name),
            Message::Frame(Frame::Image(image)) | Message::Standby(image) => {
                IMAGE_HEADER_SIZE + image.pixels.len()
            }
            Message::Frame(Frame::Audio(audio)) => audio.samples.len() * 4,
            Message::PublishReply { reason, .. } => 1 + 2 + string_len(reason),
            Message::BroadcastStatus { publisher, .. } => 1 + 2 + string_len(publisher),
        }
    }

    /// Append the framed message (header + payload) to `buf`
    pub fn encode(&self, buf: &mut BytesMut) {
        let len = self.payload_len();
        buf.reserve(HEADER_SIZE + len);
        buf.put_u8(self.type_id());
        buf.put_u32(len as u32);

        match self {
            Message::Hello { name } => put_string(buf, name),
            Message::Frame(Frame::Image(image)) | Message::Standby(image) => {
                buf.put_i32(image.height);
                buf.put_i32(image.width);
                buf.put_i32(image.format_tag);
                buf.put_slice(&image.pixels);
            }
            Message::Frame(Frame::Audio(audio)) => {
                for sample in audio.samples.iter() {
                    buf.put_i32(*sample);
                }
            }
            Message::PublishReply { accepted, reason } => {
                buf.put_u8(u8::from(*accepted));
                put_string(buf, reason);
            }
            Message::BroadcastStatus { live, publisher } => {
                buf.put_u8(u8::from(*live));
                put_string(buf, publisher);
            }
        }
    }

    /// Encode into a fresh buffer
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode a payload whose type and length were already read from the header
    pub fn decode(msg_type: u8, mut payload: Bytes) -> Result<Self, ProtocolError> {
        match msg_type {
            MSG_HELLO => Ok(Message::Hello {
                name: get_string(&mut payload, "hello name")?,
            }),
            MSG_IMAGE => Ok(Message::Frame(Frame::Image(get_image(payload)?))),
            MSG_STANDBY => Ok(Message::Standby(get_image(payload)?)),
            MSG_AUDIO => {
                if payload.len() % 4 != 0 {
                    return Err(ProtocolError::Truncated("audio samples"));
                }
                let mut samples = Vec::with_capacity(payload.len() / 4);
                while payload.has_remaining() {
                    samples.push(payload.get_i32());
                }
                Ok(Message::Frame(Frame::Audio(AudioFrame::new(samples))))
            }
            MSG_PUBLISH_REPLY => {
                let accepted = get_flag(&mut payload, "publish reply")?;
                let reason = get_string(&mut payload, "publish reason")?;
                Ok(Message::PublishReply { accepted, reason })
            }
            MSG_BROADCAST_STATUS => {
                let live = get_flag(&mut payload, "broadcast status")?;
                let publisher = get_string(&mut payload, "publisher name")?;
                Ok(Message::BroadcastStatus { live, publisher })
            }
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }
}

/// Encoded length of a string field, clamped to a char boundary within u16
fn string_len(s: &str) -> usize {
    let mut len = s.len().min(u16::MAX as usize);
    while !s.is_char_boundary(len) {
        len -= 1;
    }
    len
}

fn put_string(buf: &mut BytesMut, s: &str) {
    let len = string_len(s);
    buf.put_u16(len as u16);
    buf.put_slice(&s.as_bytes()[..len]);
}

fn get_flag(buf: &mut Bytes, what: &'static str) -> Result<bool, ProtocolError> {
    if buf.remaining() < 1 {
        return Err(ProtocolError::Truncated(what));
    }
    Ok(buf.get_u8() != 0)
}

fn get_string(buf: &mut Bytes, what: &'static str) -> Result<String, ProtocolError> {
    if buf.remaining() < 2 {
        return Err(ProtocolError::Truncated(what));
    }
    let len = buf.get_u16() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::Truncated(what));
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

fn get_image(mut payload: Bytes) -> Result<ImageFrame, ProtocolError> {
    if payload.remaining() < IMAGE_HEADER_SIZE {
        return Err(ProtocolError::Truncated("image header"));
    }
    let height = payload.get_i32();
    let width = payload.get_i32();
    let format_tag = payload.get_i32();
    Ok(ImageFrame::new(height, width, format_tag, payload))
}
