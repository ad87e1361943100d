//! Capture-and-publish loop
//!
//! Pulls media from a [`FrameSource`] at the frame rate and publishes it while
//! publishing is switched on. Switching it off sends the end-of-broadcast
//! marker so viewers revert at once instead of waiting for staleness.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

use crate::error::Result;
use crate::media::FrameSource;

use super::connector::BroadcastSender;

pub struct CaptureLoop<S> {
    sender: BroadcastSender,
    source: S,
    frame_interval: Duration,
    publishing: bool,
}

impl<S: FrameSource> CaptureLoop<S> {
    pub fn new(sender: BroadcastSender, source: S, frame_interval: Duration) -> Self {
        Self {
            sender,
            source,
            frame_interval,
            publishing: false,
        }
    }

    /// Run until the source runs dry or `shutdown` is set.
    ///
    /// `enabled` switches publishing on and off; the sending half is closed on
    /// return.
    pub async fn run(
        mut self,
        mut enabled: watch::Receiver<bool>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut ticker = interval(self.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut toggle_open = true;
        let initial = *enabled.borrow_and_update();
        self.set_publishing(initial).await?;

        loop {
            tokio::select! {
                _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => break,
                changed = enabled.changed(), if toggle_open => {
                    match changed {
                        Ok(()) => {
                            let on = *enabled.borrow_and_update();
                            self.set_publishing(on).await?;
                        }
                        Err(_) => toggle_open = false,
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            if !self.publishing {
                continue;
            }

            let image = self.source.next_image();
            if image.is_empty() {
                tracing::info!(frames = self.sender.images_sent(), "Capture finished");
                break;
            }
            self.sender.send_image(image).await?;

            if let Some(audio) = self.source.next_audio() {
                if !audio.is_empty() {
                    self.sender.send_audio(audio).await?;
                }
            }
        }

        if self.publishing {
            self.sender.end_broadcast().await?;
        }
        self.sender.close().await
    }

    async fn set_publishing(&mut self, on: bool) -> Result<()> {
        if on == self.publishing {
            return Ok(());
        }
        self.publishing = on;

        if on {
            tracing::info!("Publishing started");
        } else {
            tracing::info!(frames = self.sender.images_sent(), "Publishing stopped");
            self.sender.end_broadcast().await?;
        }
        Ok(())
    }
}
