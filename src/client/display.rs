//! Display sinks
//!
//! Rendering hardware lives outside this crate. The client binary hands each
//! refreshed frame to a `DisplaySink`; `LoggingDisplay` stands in for a real
//! window and logs what would be shown.

use crate::media::ImageFrame;

use super::playback::PlaybackEvent;

/// Receives the frame to show on every display refresh
pub trait DisplaySink: Send {
    /// Show `image`, or a blank screen for `None`
    fn show(&mut self, image: Option<&ImageFrame>);

    /// Receiving state changed
    fn on_event(&mut self, event: &PlaybackEvent) {
        let _ = event;
    }
}

/// Sink that logs frame changes instead of drawing them
#[derive(Debug, Default)]
pub struct LoggingDisplay {
    shown: u64,
    last: Option<(i32, i32, usize)>,
}

impl LoggingDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of refreshes that changed the displayed frame
    pub fn frames_shown(&self) -> u64 {
        self.shown
    }
}

impl DisplaySink for LoggingDisplay {
    fn show(&mut self, image: Option<&ImageFrame>) {
        let key = image.map(|i| (i.width, i.height, i.pixels.as_ptr() as usize));
        if key == self.last {
            return;
        }
        self.last = key;
        self.shown += 1;

        match image {
            Some(image) => tracing::trace!(
                width = image.width,
                height = image.height,
                bytes = image.pixels.len(),
                "Display frame"
            ),
            None => tracing::trace!("Display blank"),
        }
    }

    fn on_event(&mut self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::Started => tracing::info!("Receiving broadcast"),
            PlaybackEvent::Ended => tracing::info!("Broadcast ended, showing default"),
            PlaybackEvent::PublishReply { accepted: true, .. } => {
                tracing::info!("Broadcasting")
            }
            PlaybackEvent::PublishReply { accepted: false, reason } => {
                tracing::info!(reason = %reason, "Another client is broadcasting")
            }
        }
    }
}
