//! Relay configuration

use std::time::Duration;

/// Relay tunables shared by admission, liveness and the outbound loops
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum age of the latest image (or admission record) before the
    /// broadcast counts as ended
    pub staleness_window: Duration,

    /// Minimum spacing between two images relayed to one consumer
    pub min_video_interval: Duration,

    /// Longest an idle outbound loop waits before re-checking liveness
    pub poll_interval: Duration,
}

/// Staleness window used by the server and by client playback
pub const DEFAULT_STALENESS_WINDOW: Duration = Duration::from_millis(300);

/// Floor for `poll_interval`, so an idle loop never spins
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            staleness_window: DEFAULT_STALENESS_WINDOW,
            min_video_interval: Duration::from_micros(1_000_000 / 30),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl RelayConfig {
    /// Set the staleness window
    pub fn staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Set the minimum interval between relayed images
    pub fn min_video_interval(mut self, interval: Duration) -> Self {
        self.min_video_interval = interval;
        self
    }

    /// Set the idle poll interval (floored at 1 ms)
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.staleness_window, Duration::from_millis(300));
        assert_eq!(config.min_video_interval, Duration::from_micros(33_333));
        assert_eq!(config.poll_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_poll_interval_floor() {
        let config = RelayConfig::default().poll_interval(Duration::ZERO);
        assert_eq!(config.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn test_builder_chaining() {
        let config = RelayConfig::default()
            .staleness_window(Duration::from_millis(500))
            .min_video_interval(Duration::from_millis(50));
        assert_eq!(config.staleness_window, Duration::from_millis(500));
        assert_eq!(config.min_video_interval, Duration::from_millis(50));
    }
}
