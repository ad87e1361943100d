//! Shared broadcast state
//!
//! Holds the latest image and latest audio frame, each behind its own lock.
//! Writers swap a whole snapshot in; readers clone the snapshot out and drop
//! the guard before doing any I/O. Frames are reference counted, so a clone
//! never copies pixels or samples.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{watch, RwLock};
use tokio::time::Instant;

use crate::media::{AudioFrame, ImageFrame};

/// A frame together with when it was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<T> {
    pub frame: T,
    /// Write time
    pub at: Instant,
    /// Write sequence number, unique across both slots
    pub seq: u64,
}

/// Latest-frame slots shared by every connection
#[derive(Debug)]
pub struct BroadcastState {
    image: RwLock<Option<Snapshot<ImageFrame>>>,
    audio: RwLock<Option<Snapshot<AudioFrame>>>,
    next_seq: AtomicU64,
    /// Bumped on every slot change so outbound loops wake without polling
    changes: watch::Sender<u64>,
}

impl BroadcastState {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            image: RwLock::new(None),
            audio: RwLock::new(None),
            next_seq: AtomicU64::new(1),
            changes,
        }
    }

    /// Replace the latest image, stamped now
    pub async fn write_image(&self, frame: ImageFrame) -> u64 {
        self.write_image_at(frame, Instant::now()).await
    }

    /// Replace the latest audio frame, stamped now
    pub async fn write_audio(&self, frame: AudioFrame) -> u64 {
        self.write_audio_at(frame, Instant::now()).await
    }

    /// Replace the latest image with an explicit timestamp.
    ///
    /// Timestamps never go backwards within a slot.
    pub async fn write_image_at(&self, frame: ImageFrame, at: Instant) -> u64 {
        let seq = {
            let mut slot = self.image.write().await;
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let at = slot.as_ref().map_or(at, |prev| at.max(prev.at));
            *slot = Some(Snapshot { frame, at, seq });
            seq
        };
        self.changes.send_replace(seq);
        seq
    }

    /// Replace the latest audio frame with an explicit timestamp
    pub async fn write_audio_at(&self, frame: AudioFrame, at: Instant) -> u64 {
        let seq = {
            let mut slot = self.audio.write().await;
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            let at = slot.as_ref().map_or(at, |prev| at.max(prev.at));
            *slot = Some(Snapshot { frame, at, seq });
            seq
        };
        self.changes.send_replace(seq);
        seq
    }

    /// Snapshot of the latest image
    pub async fn read_image(&self) -> Option<Snapshot<ImageFrame>> {
        self.image.read().await.clone()
    }

    /// Snapshot of the latest audio frame
    pub async fn read_audio(&self) -> Option<Snapshot<AudioFrame>> {
        self.audio.read().await.clone()
    }

    /// Drop both slots, ending the broadcast immediately
    pub async fn clear(&self) {
        *self.image.write().await = None;
        *self.audio.write().await = None;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.changes.send_replace(seq);
    }

    /// Receiver that changes whenever either slot changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }
}

impl Default for BroadcastState {
    fn default() -> Self {
        Self::new()
    }
}
