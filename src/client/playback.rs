//! Client playback consumer
//!
//! Tracks whether this client is receiving a broadcast, judged only from
//! frames that actually arrive, and keeps the image the renderer should show.
//! When images stop arriving for longer than the staleness window the
//! display reverts to the default image.

use std::time::Duration;

use tokio::time::Instant;

use crate::media::{AudioFrame, Frame, ImageFrame};
use crate::protocol::Message;
use crate::relay::liveness::is_stale;

/// Receiving state changes reported to the renderer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// First image of a broadcast arrived
    Started,
    /// Broadcast ended or went stale; display reverted to the default
    Ended,
    /// Server reported the admission outcome of our own publish
    PublishReply { accepted: bool, reason: String },
}

#[derive(Debug)]
pub struct PlaybackConsumer {
    window: Duration,
    default_image: Option<ImageFrame>,
    current: Option<ImageFrame>,
    latest_audio: Option<AudioFrame>,
    is_receiving: bool,
    last_frame_at: Option<Instant>,
    publisher: Option<String>,
}

impl PlaybackConsumer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            default_image: None,
            current: None,
            latest_audio: None,
            is_receiving: false,
            last_frame_at: None,
            publisher: None,
        }
    }

    /// Use `image` as the default display
    pub fn with_default_image(mut self, image: ImageFrame) -> Self {
        self.default_image = Some(image);
        self
    }

    /// Feed one message from the server
    pub fn on_message(&mut self, msg: Message, now: Instant) -> Option<PlaybackEvent> {
        match msg {
            Message::Frame(Frame::Image(image)) => self.on_image(image, now),
            Message::Frame(Frame::Audio(audio)) => {
                self.on_audio(audio);
                None
            }
            Message::BroadcastStatus { live, publisher } => self.on_status(live, publisher),
            Message::Standby(image) => {
                self.on_standby(image);
                None
            }
            Message::PublishReply { accepted, reason } => {
                Some(PlaybackEvent::PublishReply { accepted, reason })
            }
            Message::Hello { .. } => None,
        }
    }

    /// A relayed image arrived
    pub fn on_image(&mut self, image: ImageFrame, now: Instant) -> Option<PlaybackEvent> {
        if image.is_empty() {
            return self.end();
        }
        if !image.is_consistent() {
            tracing::debug!(
                width = image.width,
                height = image.height,
                format = image.format_tag,
                len = image.pixels.len(),
                "Dropping undisplayable image"
            );
            return None;
        }

        self.current = Some(image);
        self.last_frame_at = Some(now);

        if self.is_receiving {
            None
        } else {
            self.is_receiving = true;
            Some(PlaybackEvent::Started)
        }
    }

    /// A relayed audio frame arrived. Audio does not keep the broadcast alive.
    pub fn on_audio(&mut self, audio: AudioFrame) {
        if !audio.is_empty() {
            self.latest_audio = Some(audio);
        }
    }

    /// Server liveness notice
    pub fn on_status(&mut self, live: bool, publisher: String) -> Option<PlaybackEvent> {
        if live {
            self.publisher = (!publisher.is_empty()).then_some(publisher);
            None
        } else {
            self.end()
        }
    }

    /// Server default media; adopted only when no default is set
    pub fn on_standby(&mut self, image: ImageFrame) {
        if self.default_image.is_none() && image.is_consistent() {
            self.default_image = Some(image);
        }
    }

    /// Periodic display refresh
    pub fn refresh(&mut self, now: Instant) -> Option<PlaybackEvent> {
        match self.last_frame_at {
            Some(at) if self.is_receiving && is_stale(at, now, self.window) => self.end(),
            _ => None,
        }
    }

    fn end(&mut self) -> Option<PlaybackEvent> {
        self.current = None;
        self.latest_audio = None;
        self.publisher = None;
        if self.is_receiving {
            self.is_receiving = false;
            Some(PlaybackEvent::Ended)
        } else {
            None
        }
    }

    /// Image the renderer should show now
    pub fn displayable(&self) -> Option<&ImageFrame> {
        if self.is_receiving {
            self.current.as_ref()
        } else {
            self.default_image.as_ref()
        }
    }

    /// Take the latest audio for the playback device
    pub fn take_audio(&mut self) -> Option<AudioFrame> {
        self.latest_audio.take()
    }

    pub fn is_receiving(&self) -> bool {
        self.is_receiving
    }

    pub fn last_frame_at(&self) -> Option<Instant> {
        self.last_frame_at
    }

    /// Name of the current broadcaster, if the server announced one
    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PixelFormat;

    const WINDOW: Duration = Duration::from_millis(300);

    fn image(fill: u8) -> ImageFrame {
        ImageFrame::new(100, 100, PixelFormat::Bgr24.tag(), vec![fill; 30_000])
    }

    fn background() -> ImageFrame {
        ImageFrame::new(2, 2, PixelFormat::Gray8.tag(), vec![0u8; 4])
    }

    #[test]
    fn test_image_starts_receiving() {
        let t0 = Instant::now();
        let mut playback = PlaybackConsumer::new(WINDOW).with_default_image(background());
        assert_eq!(playback.displayable(), Some(&background()));

        assert_eq!(playback.on_image(image(1), t0), Some(PlaybackEvent::Started));
        assert!(playback.is_receiving());
        assert_eq!(playback.displayable(), Some(&image(1)));

        assert_eq!(playback.on_image(image(2), t0), None);
        assert_eq!(playback.displayable(), Some(&image(2)));
    }

    #[test]
    fn test_stale_reverts_to_default() {
        // Image at t=50ms, refresh at t=400ms with a 300ms window
        let t0 = Instant::now();
        let mut playback = PlaybackConsumer::new(WINDOW).with_default_image(background());
        playback.on_image(image(1), t0 + Duration::from_millis(50));

        assert_eq!(playback.refresh(t0 + Duration::from_millis(350)), None);
        assert!(playback.is_receiving());

        assert_eq!(
            playback.refresh(t0 + Duration::from_millis(400)),
            Some(PlaybackEvent::Ended)
        );
        assert!(!playback.is_receiving());
        assert_eq!(playback.displayable(), Some(&background()));
        assert_eq!(playback.refresh(t0 + Duration::from_millis(500)), None);
    }

    #[test]
    fn test_audio_does_not_refresh_staleness() {
        let t0 = Instant::now();
        let mut playback = PlaybackConsumer::new(WINDOW);
        playback.on_image(image(1), t0);
        playback.on_audio(AudioFrame::new(vec![5]));

        assert_eq!(
            playback.refresh(t0 + Duration::from_millis(301)),
            Some(PlaybackEvent::Ended)
        );
        assert!(playback.take_audio().is_none());
    }

    #[test]
    fn test_empty_image_and_status_end_broadcast() {
        let t0 = Instant::now();
        let mut playback = PlaybackConsumer::new(WINDOW);

        playback.on_image(image(1), t0);
        assert_eq!(playback.on_image(ImageFrame::empty(), t0), Some(PlaybackEvent::Ended));
        assert_eq!(playback.displayable(), None);

        playback.on_image(image(1), t0);
        playback.on_status(true, "alice".into());
        assert_eq!(playback.publisher(), Some("alice"));
        assert_eq!(
            playback.on_status(false, String::new()),
            Some(PlaybackEvent::Ended)
        );
        assert_eq!(playback.publisher(), None);
    }

    #[test]
    fn test_inconsistent_image_ignored() {
        let t0 = Instant::now();
        let mut playback = PlaybackConsumer::new(WINDOW);
        let bad = ImageFrame::new(100, 100, PixelFormat::Bgr24.tag(), vec![0u8; 10]);

        assert_eq!(playback.on_image(bad, t0), None);
        assert!(!playback.is_receiving());
        assert!(playback.last_frame_at().is_none());
    }

    #[test]
    fn test_standby_adopted_once() {
        let mut playback = PlaybackConsumer::new(WINDOW);
        playback.on_message(Message::Standby(background()), Instant::now());
        assert_eq!(playback.displayable(), Some(&background()));

        let mut configured = PlaybackConsumer::new(WINDOW).with_default_image(image(3));
        configured.on_standby(background());
        assert_eq!(configured.displayable(), Some(&image(3)));
    }

    #[test]
    fn test_publish_reply_surfaces() {
        let mut playback = PlaybackConsumer::new(WINDOW);
        let event = playback.on_message(Message::rejected("BACKOFF"), Instant::now());
        assert_eq!(
            event,
            Some(PlaybackEvent::PublishReply {
                accepted: false,
                reason: "BACKOFF".into()
            })
        );
    }
}
