//! Broadcast hub
//!
//! Ties admission to the shared state. Every connection holds an
//! `Arc<BroadcastHub>`; the hub is the only path that mutates the state.

use tokio::time::Instant;

use crate::media::{AudioFrame, ImageFrame};

use super::admission::{AdmissionController, AdmissionDecision};
use super::config::RelayConfig;
use super::liveness::is_broadcast_live;
use super::state::BroadcastState;

/// Result of an end-of-broadcast request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// The caller held the slot; it is released and the slots are cleared
    Ended,
    /// The caller did not hold the slot; nothing changed
    NotHolder,
}

/// Shared relay hub (one per server process)
#[derive(Debug)]
pub struct BroadcastHub {
    config: RelayConfig,
    state: BroadcastState,
    admission: AdmissionController,
}

impl BroadcastHub {
    pub fn new(config: RelayConfig) -> Self {
        let admission = AdmissionController::new(config.staleness_window);
        Self {
            config,
            state: BroadcastState::new(),
            admission,
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Read access to the latest-frame slots
    pub fn state(&self) -> &BroadcastState {
        &self.state
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Offer an image from `publisher`.
    ///
    /// The admission lock is held across the write so a reclaiming publisher
    /// cannot interleave with the one it replaces. An empty image is not
    /// offered here; use [`end_broadcast`](Self::end_broadcast).
    pub async fn publish_image(&self, publisher: &str, image: ImageFrame) -> AdmissionDecision {
        let now = Instant::now();
        let mut slot = self.admission.lock().await;
        let decision = slot.decide(publisher, now, self.config.staleness_window);

        match &decision {
            AdmissionDecision::Claimed { previous } => {
                tracing::info!(
                    publisher = %publisher,
                    previous = ?previous,
                    "Publisher admitted"
                );
                self.state.write_image_at(image, now).await;
            }
            AdmissionDecision::Refreshed => {
                self.state.write_image_at(image, now).await;
            }
            AdmissionDecision::Rejected(reason) => {
                tracing::trace!(publisher = %publisher, reason = %reason, "Image rejected");
            }
        }

        decision
    }

    /// Offer audio from `publisher`.
    ///
    /// Audio never claims or refreshes the slot. It is written only when the
    /// publisher holds the slot or nobody does. Returns whether it was written.
    pub async fn publish_audio(&self, publisher: &str, audio: AudioFrame) -> bool {
        let now = Instant::now();
        let slot = self.admission.lock().await;
        if !slot.permits(publisher, now, self.config.staleness_window) {
            return false;
        }
        self.state.write_audio_at(audio, now).await;
        true
    }

    /// End `publisher`'s broadcast at once instead of waiting for staleness
    pub async fn end_broadcast(&self, publisher: &str) -> EndOutcome {
        let mut slot = self.admission.lock().await;
        if !slot.release(publisher) {
            return EndOutcome::NotHolder;
        }
        self.state.clear().await;
        tracing::info!(publisher = %publisher, "Broadcast ended");
        EndOutcome::Ended
    }

    /// Whether a broadcast is live at `now`
    pub async fn is_live(&self, now: Instant) -> bool {
        let latest = self.state.read_image().await.map(|s| s.at);
        is_broadcast_live(latest, now, self.config.staleness_window)
    }

    /// Name of the publisher holding the slot, if its record is fresh
    pub async fn current_publisher(&self, now: Instant) -> Option<String> {
        self.admission.holder(now).await
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}
