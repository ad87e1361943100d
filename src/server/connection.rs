//! Connection session
//!
//! Each accepted connection runs two tasks over the shared hub:
//!
//! - inbound: reads messages, runs admission on images, writes accepted
//!   frames into the hub, queues admission replies
//! - outbound: watches the hub, sends status on liveness edges, relays each
//!   new image/audio snapshot once, forwards queued replies
//!
//! Both tasks stop on the session's cancellation signal, which fires when
//! either task ends or the server shuts down. Every write races that signal,
//! so a consumer that stopped reading cannot hold its session open.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{sleep_until, timeout, Instant};

use crate::error::{Error, Result};
use crate::media::{Frame, ImageFrame};
use crate::protocol::{Message, MessageReader, MessageWriter};
use crate::relay::liveness::{is_broadcast_live, stale_at};
use crate::relay::{AdmissionDecision, BroadcastHub, EndOutcome, ImageAction, RelayCursor};
use crate::session::SessionState;
use crate::stats::SessionStats;

use super::config::ServerConfig;

/// Queued replies waiting for the outbound task
const REPLY_QUEUE: usize = 16;

/// How long a cancelled loop gets to return before it is aborted
const STOP_GRACE: Duration = Duration::from_secs(1);

/// Counters gathered by one loop, and how it ended
type LoopOutcome = (SessionStats, Result<()>);

/// A single client connection
pub struct Connection {
    session_id: u64,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: Arc<BroadcastHub>,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    pub fn new(
        session_id: u64,
        socket: TcpStream,
        peer_addr: SocketAddr,
        config: ServerConfig,
        hub: Arc<BroadcastHub>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session_id,
            socket,
            peer_addr,
            config,
            hub,
            shutdown,
        }
    }

    /// Run the session until the client leaves or the server shuts down.
    ///
    /// Stats are returned even when the session ended with an error.
    pub async fn run(self) -> (SessionStats, Result<()>) {
        let (read_half, write_half) = self.socket.into_split();
        run_session(
            SessionState::new(self.session_id, self.peer_addr),
            read_half,
            write_half,
            &self.config,
            self.hub,
            self.shutdown,
        )
        .await
    }
}

enum First {
    Inbound(std::result::Result<LoopOutcome, JoinError>),
    Outbound(std::result::Result<LoopOutcome, JoinError>),
    Shutdown,
}

/// Drive one session over any byte stream pair
pub async fn run_session<R, W>(
    session: SessionState,
    reader: R,
    writer: W,
    config: &ServerConfig,
    hub: Arc<BroadcastHub>,
    mut shutdown: watch::Receiver<bool>,
) -> (SessionStats, Result<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let session_id = session.id;
    let connected_at = session.connected_at;
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let (reply_tx, reply_rx) = mpsc::channel(REPLY_QUEUE);

    tracing::debug!(session_id, peer = %session.peer_addr, "Session started");

    let reader = MessageReader::new(reader, config.max_message_size);
    let writer = MessageWriter::new(writer);

    let mut inbound: JoinHandle<LoopOutcome> = tokio::spawn(inbound_loop(
        reader,
        session,
        Arc::clone(&hub),
        reply_tx,
        cancel_rx.clone(),
    ));
    let mut outbound: JoinHandle<LoopOutcome> = tokio::spawn(outbound_loop(
        writer,
        hub,
        config.standby_image.clone(),
        reply_rx,
        cancel_rx,
    ));

    let first = tokio::select! {
        res = &mut inbound => First::Inbound(res),
        res = &mut outbound => First::Outbound(res),
        _ = cancelled(&mut shutdown) => First::Shutdown,
    };

    // Stop whichever loop is still running
    cancel_tx.send_replace(true);

    let (inbound_res, outbound_res) = match first {
        First::Inbound(res) => (Some(res), stop(&mut outbound, session_id, "outbound").await),
        First::Outbound(res) => (stop(&mut inbound, session_id, "inbound").await, Some(res)),
        First::Shutdown => {
            tracing::debug!(session_id, "Session cancelled by shutdown");
            (
                stop(&mut inbound, session_id, "inbound").await,
                stop(&mut outbound, session_id, "outbound").await,
            )
        }
    };

    let mut stats = SessionStats::new();
    let mut error = None;
    for (side, res) in [("inbound", inbound_res), ("outbound", outbound_res)] {
        match res {
            Some(Ok((part, result))) => {
                stats.merge(&part);
                match result {
                    Ok(()) => {}
                    Err(e) if e.is_disconnect() => {
                        tracing::debug!(session_id, side, error = %e, "Peer disconnected");
                    }
                    Err(e) => {
                        if error.is_none() {
                            error = Some(e);
                        }
                    }
                }
            }
            Some(Err(join_err)) => {
                tracing::error!(session_id, side, error = %join_err, "Session task failed");
            }
            None => {}
        }
    }
    stats.duration = connected_at.elapsed();

    (stats, error.map_or(Ok(()), Err))
}

/// Wait a bounded time for a cancelled loop, aborting it if it hangs
async fn stop(
    handle: &mut JoinHandle<LoopOutcome>,
    session_id: u64,
    side: &'static str,
) -> Option<std::result::Result<LoopOutcome, JoinError>> {
    match timeout(STOP_GRACE, &mut *handle).await {
        Ok(res) => Some(res),
        Err(_) => {
            tracing::warn!(session_id, side, "Loop ignored cancellation, aborting");
            handle.abort();
            None
        }
    }
}

/// Resolves once the signal is set or its sender is gone
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|cancelled| *cancelled).await;
}

/// Write one message unless the session is cancelled first.
///
/// Returns `false` if cancellation won; the stream may then hold a partial
/// message and must only be shut down.
async fn send<W>(
    writer: &mut MessageWriter<W>,
    msg: &Message,
    cancel: &mut watch::Receiver<bool>,
) -> Result<bool>
where
    W: AsyncWrite + Unpin,
{
    tokio::select! {
        biased;
        _ = cancelled(cancel) => Ok(false),
        res = writer.write_message(msg) => res.map(|()| true),
    }
}

async fn inbound_loop<R>(
    mut reader: MessageReader<R>,
    mut session: SessionState,
    hub: Arc<BroadcastHub>,
    replies: mpsc::Sender<Message>,
    mut cancel: watch::Receiver<bool>,
) -> LoopOutcome
where
    R: AsyncRead + Unpin,
{
    let mut stats = SessionStats::new();

    let result = async {
        loop {
            let msg = tokio::select! {
                _ = cancelled(&mut cancel) => break,
                msg = reader.read_message() => msg?,
            };

            let Some(msg) = msg else {
                tracing::debug!(session_id = session.id, "Client closed stream");
                break;
            };

            let frame = match msg {
                Message::Frame(frame) => frame,
                Message::Hello { name } => {
                    if session.set_publisher_name(name.clone()) {
                        tracing::debug!(session_id = session.id, name = %name, "Client identified");
                    } else {
                        tracing::debug!(
                            session_id = session.id,
                            name = %name,
                            "Ignoring rename while publishing"
                        );
                    }
                    continue;
                }
                other => {
                    tracing::debug!(
                        session_id = session.id,
                        message = other.name(),
                        "Ignoring unexpected message from client"
                    );
                    continue;
                }
            };

            stats.bytes_received += frame.payload_len() as u64;
            let publisher = session.publisher_id();

            match frame {
                Frame::Image(image) => {
                    stats.images_received += 1;

                    if image.is_empty() {
                        if hub.end_broadcast(&publisher).await == EndOutcome::Ended {
                            session.on_broadcast_ended();
                        }
                        continue;
                    }

                    let decision = hub.publish_image(&publisher, image).await;
                    if let AdmissionDecision::Rejected(reason) = &decision {
                        stats.images_rejected += 1;
                        tracing::trace!(session_id = session.id, reason = %reason, "Publish rejected");
                    }

                    if session.on_decision(&decision).is_some() {
                        let reply = match &decision {
                            AdmissionDecision::Rejected(reason) => {
                                tracing::debug!(
                                    session_id = session.id,
                                    publisher = %publisher,
                                    reason = %reason,
                                    "Publisher backed off"
                                );
                                Message::rejected(reason.as_str())
                            }
                            _ => Message::accepted(),
                        };
                        if replies.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Frame::Audio(audio) => {
                    stats.audio_received += 1;

                    if audio.is_empty() {
                        tracing::trace!(session_id = session.id, "Ignoring empty audio frame");
                        continue;
                    }
                    if !hub.publish_audio(&publisher, audio).await {
                        stats.audio_dropped += 1;
                    }
                }
            }
        }
        Ok::<(), Error>(())
    }
    .await;

    (stats, result)
}

async fn outbound_loop<W>(
    mut writer: MessageWriter<W>,
    hub: Arc<BroadcastHub>,
    standby: Option<ImageFrame>,
    mut replies: mpsc::Receiver<Message>,
    mut cancel: watch::Receiver<bool>,
) -> LoopOutcome
where
    W: AsyncWrite + Unpin,
{
    let config = hub.config().clone();
    let mut stats = SessionStats::new();
    let mut cursor = RelayCursor::new(config.min_video_interval);
    let mut changes = hub.state().subscribe();
    let mut live: Option<bool> = None;
    let mut replies_open = true;

    let result = async {
        if let Some(image) = standby {
            let len = image.pixels.len() as u64;
            if !send(&mut writer, &Message::Standby(image), &mut cancel).await? {
                return Ok(());
            }
            stats.bytes_sent += len;
        }

        loop {
            if *cancel.borrow() {
                break;
            }
            changes.borrow_and_update();

            // Copy snapshots out; no lock is held past these awaits
            let now = Instant::now();
            let image = hub.state().read_image().await;
            let is_live = is_broadcast_live(image.as_ref().map(|s| s.at), now, config.staleness_window);

            if live != Some(is_live) {
                let publisher = if is_live {
                    hub.current_publisher(now).await.unwrap_or_default()
                } else {
                    String::new()
                };
                let status = Message::BroadcastStatus {
                    live: is_live,
                    publisher,
                };
                if !send(&mut writer, &status, &mut cancel).await? {
                    break;
                }
                live = Some(is_live);
            }

            let mut wake_at = now + config.poll_interval;

            if let (true, Some(snap)) = (is_live, image) {
                wake_at = wake_at.min(stale_at(snap.at, config.staleness_window));

                match cursor.image_action(snap.seq, now) {
                    ImageAction::Send => {
                        let len = snap.frame.pixels.len() as u64;
                        let msg = Message::Frame(Frame::Image(snap.frame));
                        if !send(&mut writer, &msg, &mut cancel).await? {
                            break;
                        }
                        stats.images_relayed += 1;
                        stats.bytes_sent += len;
                        cursor.mark_image_sent(snap.seq, now);
                    }
                    ImageAction::WaitUntil(at) => wake_at = wake_at.min(at),
                    ImageAction::Skip => {}
                }

                if let Some(audio) = hub.state().read_audio().await {
                    if cursor.audio_due(&audio, now, config.staleness_window) {
                        let len = (audio.frame.samples.len() * 4) as u64;
                        let msg = Message::Frame(Frame::Audio(audio.frame));
                        if !send(&mut writer, &msg, &mut cancel).await? {
                            break;
                        }
                        stats.audio_relayed += 1;
                        stats.bytes_sent += len;
                        cursor.mark_audio_sent(audio.seq);
                    }
                }
            }

            tokio::select! {
                _ = cancelled(&mut cancel) => break,
                reply = replies.recv(), if replies_open => match reply {
                    Some(msg) => {
                        if !send(&mut writer, &msg, &mut cancel).await? {
                            break;
                        }
                    }
                    None => replies_open = false,
                },
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = sleep_until(wake_at) => {}
            }
        }
        Ok::<(), Error>(())
    }
    .await;

    let _ = timeout(STOP_GRACE, writer.shutdown()).await;
    (stats, result)
}
