//! Per-consumer relay cursor
//!
//! Remembers what one consumer has already been sent so the outbound loop
//! relays each frame once, when its sequence number changes, instead of on
//! every wake-up.

use std::time::Duration;

use tokio::time::Instant;

use crate::media::AudioFrame;

use super::liveness::is_stale;
use super::state::Snapshot;

/// What to do with the current latest image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageAction {
    /// New image and the video interval has elapsed
    Send,
    /// New image, but too soon after the previous send
    WaitUntil(Instant),
    /// Already sent
    Skip,
}

#[derive(Debug, Clone)]
pub struct RelayCursor {
    min_video_interval: Duration,
    last_image_seq: Option<u64>,
    last_image_sent_at: Option<Instant>,
    last_audio_seq: Option<u64>,
}

impl RelayCursor {
    pub fn new(min_video_interval: Duration) -> Self {
        Self {
            min_video_interval,
            last_image_seq: None,
            last_image_sent_at: None,
            last_audio_seq: None,
        }
    }

    /// Decide whether the image with sequence `seq` should go out at `now`
    pub fn image_action(&self, seq: u64, now: Instant) -> ImageAction {
        if self.last_image_seq == Some(seq) {
            return ImageAction::Skip;
        }
        match self.last_image_sent_at {
            Some(sent) if now < sent + self.min_video_interval => {
                ImageAction::WaitUntil(sent + self.min_video_interval)
            }
            _ => ImageAction::Send,
        }
    }

    pub fn mark_image_sent(&mut self, seq: u64, now: Instant) {
        self.last_image_seq = Some(seq);
        self.last_image_sent_at = Some(now);
    }

    /// Whether an audio snapshot is new and still fresh
    pub fn audio_due(&self, snap: &Snapshot<AudioFrame>, now: Instant, window: Duration) -> bool {
        self.last_audio_seq != Some(snap.seq) && !is_stale(snap.at, now, window)
    }

    pub fn mark_audio_sent(&mut self, seq: u64) {
        self.last_audio_seq = Some(seq);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(33);

    #[test]
    fn test_each_image_sent_once() {
        let t0 = Instant::now();
        let mut cursor = RelayCursor::new(INTERVAL);

        assert_eq!(cursor.image_action(1, t0), ImageAction::Send);
        cursor.mark_image_sent(1, t0);

        // Same frame on later ticks is never resent
        for tick in 1..10 {
            let now = t0 + Duration::from_millis(tick * 50);
            assert_eq!(cursor.image_action(1, now), ImageAction::Skip);
        }
    }

    #[test]
    fn test_video_interval_throttles() {
        let t0 = Instant::now();
        let mut cursor = RelayCursor::new(INTERVAL);
        cursor.mark_image_sent(1, t0);

        let soon = t0 + Duration::from_millis(10);
        assert_eq!(cursor.image_action(2, soon), ImageAction::WaitUntil(t0 + INTERVAL));
        assert_eq!(cursor.image_action(2, t0 + INTERVAL), ImageAction::Send);
    }

    #[test]
    fn test_audio_due() {
        let t0 = Instant::now();
        let window = Duration::from_millis(300);
        let mut cursor = RelayCursor::new(INTERVAL);
        let snap = Snapshot {
            frame: AudioFrame::new(vec![1, 2]),
            at: t0,
            seq: 4,
        };

        assert!(cursor.audio_due(&snap, t0, window));
        assert!(!cursor.audio_due(&snap, t0 + Duration::from_millis(301), window));

        cursor.mark_audio_sent(4);
        assert!(!cursor.audio_due(&snap, t0, window));
    }
}
