//! Connection to an intercom relay server
//!
//! `IntercomConnector::connect` opens the TCP connection, announces the
//! publisher name and hands back two independent halves: a
//! [`BroadcastSender`] for the capture loop and a [`RelayReceiver`] for the
//! playback loop.

use std::net::SocketAddr;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};
use crate::media::{AudioFrame, ImageFrame};
use crate::protocol::{Message, MessageReader, MessageWriter};

use super::config::ClientConfig;

/// Opens client connections
pub struct IntercomConnector;

impl IntercomConnector {
    /// Connect to the server and announce the configured name
    pub async fn connect(config: ClientConfig) -> Result<(BroadcastSender, RelayReceiver)> {
        tracing::debug!(addr = %config.server_addr, "Connecting to intercom server");

        let socket = timeout(config.connect_timeout, TcpStream::connect(config.server_addr))
            .await
            .map_err(|_| Error::Timeout)??;

        if config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }

        let peer_addr = socket.peer_addr()?;
        let (read_half, write_half) = socket.into_split();

        let mut sender = BroadcastSender {
            writer: MessageWriter::new(write_half),
            peer_addr,
            images_sent: 0,
            audio_sent: 0,
        };
        if let Some(name) = &config.name {
            sender.writer.write_message(&Message::hello(name.as_str())).await?;
        }

        let receiver = RelayReceiver {
            reader: MessageReader::new(read_half, config.max_message_size),
        };

        tracing::info!(peer = %peer_addr, name = ?config.name, "Connected to intercom server");
        Ok((sender, receiver))
    }
}

/// Sending half: publishes captured media
pub struct BroadcastSender {
    writer: MessageWriter<OwnedWriteHalf>,
    peer_addr: SocketAddr,
    images_sent: u64,
    audio_sent: u64,
}

impl BroadcastSender {
    /// Publish one image
    pub async fn send_image(&mut self, image: ImageFrame) -> Result<()> {
        self.writer
            .write_message(&Message::Frame(image.into()))
            .await?;
        self.images_sent += 1;
        Ok(())
    }

    /// Publish one audio frame
    pub async fn send_audio(&mut self, audio: AudioFrame) -> Result<()> {
        self.writer
            .write_message(&Message::Frame(audio.into()))
            .await?;
        self.audio_sent += 1;
        Ok(())
    }

    /// Tell the server this client has stopped broadcasting
    pub async fn end_broadcast(&mut self) -> Result<()> {
        tracing::debug!(peer = %self.peer_addr, "Ending broadcast");
        self.writer
            .write_message(&Message::Frame(ImageFrame::empty().into()))
            .await
    }

    /// Close the sending direction; the server ends the session
    pub async fn close(mut self) -> Result<()> {
        self.writer.shutdown().await
    }

    pub fn images_sent(&self) -> u64 {
        self.images_sent
    }

    pub fn audio_sent(&self) -> u64 {
        self.audio_sent
    }
}

/// Receiving half: relayed media and server notices
pub struct RelayReceiver {
    reader: MessageReader<OwnedReadHalf>,
}

impl RelayReceiver {
    /// Next message from the server, `None` once the server closes
    pub async fn next_message(&mut self) -> Result<Option<Message>> {
        self.reader.read_message().await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;
    use crate::media::Frame;
    use crate::protocol::constants::DEFAULT_MAX_MESSAGE_SIZE;

    #[tokio::test]
    async fn test_connect_sends_hello_then_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut reader = MessageReader::new(socket, DEFAULT_MAX_MESSAGE_SIZE);
            let mut seen = Vec::new();
            while let Some(msg) = reader.read_message().await.unwrap() {
                seen.push(msg);
            }
            seen
        });

        let config = ClientConfig::new(addr).name("alice");
        let (mut sender, _receiver) = IntercomConnector::connect(config).await.unwrap();
        let image = ImageFrame::new(1, 1, 0, vec![7u8]);
        sender.send_image(image.clone()).await.unwrap();
        sender.send_audio(AudioFrame::new(vec![1, -1])).await.unwrap();
        sender.end_broadcast().await.unwrap();
        assert_eq!(sender.images_sent(), 1);
        assert_eq!(sender.audio_sent(), 1);
        sender.close().await.unwrap();

        let seen = server.await.unwrap();
        assert_eq!(
            seen,
            vec![
                Message::hello("alice"),
                Message::Frame(Frame::Image(image)),
                Message::Frame(Frame::Audio(AudioFrame::new(vec![1, -1]))),
                Message::Frame(Frame::Image(ImageFrame::empty())),
            ]
        );
    }

    #[tokio::test]
    async fn test_receiver_sees_server_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut writer = MessageWriter::new(socket);
            writer.write_message(&Message::accepted()).await.unwrap();
            writer.shutdown().await.unwrap();
        });

        let (_sender, mut receiver) = IntercomConnector::connect(ClientConfig::new(addr))
            .await
            .unwrap();
        assert_eq!(receiver.next_message().await.unwrap(), Some(Message::accepted()));
        assert_eq!(receiver.next_message().await.unwrap(), None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig::new(addr).connect_timeout(Duration::from_secs(2));
        let err = IntercomConnector::connect(config).await.err().unwrap();
        assert!(matches!(err, Error::Io(_) | Error::Timeout));
    }
}
