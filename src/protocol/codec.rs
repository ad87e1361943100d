//! Async message reader/writer over a byte stream

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};

use super::constants::HEADER_SIZE;
use super::message::Message;

/// Reads framed messages from a stream
pub struct MessageReader<R> {
    inner: R,
    max_message_size: usize,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(inner: R, max_message_size: usize) -> Self {
        Self {
            inner,
            max_message_size,
        }
    }

    /// Read the next message.
    ///
    /// Returns `Ok(None)` on a clean end of stream at a message boundary.
    /// This is cancel safe only between messages: dropping the future mid-read
    /// loses the partial message.
    pub async fn read_message(&mut self) -> Result<Option<Message>> {
        let mut header = [0u8; HEADER_SIZE];
        let first = self.inner.read(&mut header[..1]).await?;
        if first == 0 {
            return Ok(None);
        }
        self.read_exact_or_eof(&mut header[1..], "message header")
            .await?;

        let mut hdr = &header[..];
        let msg_type = hdr.get_u8();
        let len = hdr.get_u32() as usize;

        if len > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge {
                size: len,
                max: self.max_message_size,
            }
            .into());
        }

        let mut payload = BytesMut::zeroed(len);
        self.read_exact_or_eof(&mut payload[..], "message payload")
            .await?;

        Ok(Some(Message::decode(msg_type, payload.freeze())?))
    }

    async fn read_exact_or_eof(&mut self, dst: &mut [u8], what: &'static str) -> Result<()> {
        match self.inner.read_exact(dst).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(ProtocolError::UnexpectedEof(what).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Writes framed messages to a stream
pub struct MessageWriter<W> {
    inner: W,
    buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(64 * 1024),
        }
    }

    /// Encode and flush one message
    pub async fn write_message(&mut self, msg: &Message) -> Result<()> {
        self.buf.clear();
        msg.encode(&mut self.buf);
        self.inner.write_all(&self.buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the write half
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::error::Error;
    use crate::media::{Frame, ImageFrame};

    #[tokio::test]
    async fn test_read_split_across_reads() {
        let msg = Message::Frame(Frame::Image(ImageFrame::new(1, 2, 16, vec![9u8; 6])));
        let bytes = msg.to_bytes();

        let mock = Builder::new()
            .read(&bytes[..3])
            .read(&bytes[3..10])
            .read(&bytes[10..])
            .build();

        let mut reader = MessageReader::new(mock, 1024);
        assert_eq!(reader.read_message().await.unwrap(), Some(msg));
        assert_eq!(reader.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_multiple_messages() {
        let a = Message::hello("alice");
        let b = Message::rejected("BACKOFF");
        let mut all = a.to_bytes().to_vec();
        all.extend_from_slice(&b.to_bytes());

        let mock = Builder::new().read(&all).build();
        let mut reader = MessageReader::new(mock, 1024);

        assert_eq!(reader.read_message().await.unwrap(), Some(a));
        assert_eq!(reader.read_message().await.unwrap(), Some(b));
        assert_eq!(reader.read_message().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_eof_mid_message_is_disconnect() {
        let bytes = Message::hello("alice").to_bytes();
        let mock = Builder::new().read(&bytes[..bytes.len() - 2]).build();
        let mut reader = MessageReader::new(mock, 1024);

        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::UnexpectedEof("message payload"))
        ));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_oversized_message_rejected() {
        let msg = Message::Frame(Frame::Image(ImageFrame::new(10, 10, 16, vec![0u8; 300])));
        let bytes = msg.to_bytes();
        let mock = Builder::new().read(&bytes[..HEADER_SIZE]).build();
        let mut reader = MessageReader::new(mock, 100);

        let err = reader.read_message().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::MessageTooLarge { size: 312, max: 100 })
        ));
    }

    #[tokio::test]
    async fn test_write_message() {
        let msg = Message::BroadcastStatus {
            live: false,
            publisher: String::new(),
        };
        let mock = Builder::new().write(&msg.to_bytes()).build();
        let mut writer = MessageWriter::new(mock);
        writer.write_message(&msg).await.unwrap();
    }
}
