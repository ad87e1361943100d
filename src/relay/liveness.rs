//! Liveness policy
//!
//! Pure checks over timestamps. Liveness follows the image channel only: a
//! publisher still sending images is live even with no recent audio, and one
//! that stopped sending images is not, whatever audio trails in.
//!
//! The window boundary is inclusive: an image exactly `window` old is live.

use std::time::Duration;

use tokio::time::Instant;

/// Whether a timestamp is older than the window
pub fn is_stale(at: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(at) > window
}

/// Whether a broadcast is live given the latest image timestamp.
///
/// `None` means no image has been written (or the broadcast was ended).
pub fn is_broadcast_live(latest_image_at: Option<Instant>, now: Instant, window: Duration) -> bool {
    match latest_image_at {
        Some(at) => !is_stale(at, now, window),
        None => false,
    }
}

/// Instant at which a timestamp becomes stale
pub fn stale_at(at: Instant, window: Duration) -> Instant {
    at + window + Duration::from_nanos(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(300);

    #[test]
    fn test_never_written_is_not_live() {
        assert!(!is_broadcast_live(None, Instant::now(), WINDOW));
    }

    #[test]
    fn test_live_immediately_after_write() {
        let at = Instant::now();
        assert!(is_broadcast_live(Some(at), at, WINDOW));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let at = Instant::now();
        assert!(is_broadcast_live(Some(at), at + WINDOW, WINDOW));
        assert!(!is_broadcast_live(
            Some(at),
            at + WINDOW + Duration::from_nanos(1),
            WINDOW
        ));
        assert!(!is_stale(at, stale_at(at, WINDOW) - Duration::from_nanos(1), WINDOW));
        assert!(is_stale(at, stale_at(at, WINDOW), WINDOW));
    }

    #[test]
    fn test_clock_before_timestamp_is_fresh() {
        let now = Instant::now();
        let later = now + Duration::from_millis(5);
        assert!(!is_stale(later, now, WINDOW));
    }
}
