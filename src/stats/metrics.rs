//! Statistics for relay sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Per-connection statistics
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    /// Images received from this client
    pub images_received: u64,
    /// Audio frames received from this client
    pub audio_received: u64,
    /// Images refused by admission
    pub images_rejected: u64,
    /// Audio frames dropped because another publisher held the slot
    pub audio_dropped: u64,
    /// Images relayed to this client
    pub images_relayed: u64,
    /// Audio frames relayed to this client
    pub audio_relayed: u64,
    /// Payload bytes received
    pub bytes_received: u64,
    /// Payload bytes sent
    pub bytes_sent: u64,
    /// Connection duration
    pub duration: Duration,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inbound bitrate over the session (bits/sec)
    pub fn inbound_bitrate(&self) -> u64 {
        let secs = self.duration.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }

    /// Merge counters from the other half of the same session
    pub fn merge(&mut self, other: &SessionStats) {
        self.images_received += other.images_received;
        self.audio_received += other.audio_received;
        self.images_rejected += other.images_rejected;
        self.audio_dropped += other.audio_dropped;
        self.images_relayed += other.images_relayed;
        self.audio_relayed += other.audio_relayed;
        self.bytes_received += other.bytes_received;
        self.bytes_sent += other.bytes_sent;
    }
}

/// Server-wide counters, shared by every connection
#[derive(Debug)]
pub struct ServerMetrics {
    started_at: Instant,
    total_connections: AtomicU64,
    active_connections: AtomicU64,
    images_received: AtomicU64,
    audio_received: AtomicU64,
    publishes_rejected: AtomicU64,
    frames_relayed: AtomicU64,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            images_received: AtomicU64::new(0),
            audio_received: AtomicU64::new(0),
            publishes_rejected: AtomicU64::new(0),
            frames_relayed: AtomicU64::new(0),
        }
    }

    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    /// Fold a finished session's counters in
    pub fn record_session(&self, stats: &SessionStats) {
        self.images_received
            .fetch_add(stats.images_received, Ordering::Relaxed);
        self.audio_received
            .fetch_add(stats.audio_received, Ordering::Relaxed);
        self.publishes_rejected
            .fetch_add(stats.images_rejected, Ordering::Relaxed);
        self.frames_relayed.fetch_add(
            stats.images_relayed + stats.audio_relayed,
            Ordering::Relaxed,
        );
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_connections: self.total_connections.load(Ordering::Relaxed),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            images_received: self.images_received.load(Ordering::Relaxed),
            audio_received: self.audio_received.load(Ordering::Relaxed),
            publishes_rejected: self.publishes_rejected.load(Ordering::Relaxed),
            frames_relayed: self.frames_relayed.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Server-wide statistics
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Total connections ever
    pub total_connections: u64,
    /// Current active connections
    pub active_connections: u64,
    /// Images received from finished sessions
    pub images_received: u64,
    /// Audio frames received from finished sessions
    pub audio_received: u64,
    /// Images refused by admission
    pub publishes_rejected: u64,
    /// Frames relayed to consumers
    pub frames_relayed: u64,
    /// Uptime
    pub uptime: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_stats_bitrate() {
        let mut stats = SessionStats::new();
        stats.bytes_received = 1_000_000;
        stats.duration = Duration::from_secs(10);
        assert_eq!(stats.inbound_bitrate(), 800_000);

        stats.duration = Duration::ZERO;
        assert_eq!(stats.inbound_bitrate(), 0);
    }

    #[test]
    fn test_session_stats_merge() {
        let mut inbound = SessionStats {
            images_received: 3,
            images_rejected: 1,
            ..Default::default()
        };
        let outbound = SessionStats {
            images_relayed: 5,
            audio_relayed: 2,
            bytes_sent: 100,
            ..Default::default()
        };
        inbound.merge(&outbound);

        assert_eq!(inbound.images_received, 3);
        assert_eq!(inbound.images_relayed, 5);
        assert_eq!(inbound.bytes_sent, 100);
    }

    #[test]
    fn test_server_metrics() {
        let metrics = ServerMetrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();

        metrics.record_session(&SessionStats {
            images_received: 10,
            images_rejected: 4,
            images_relayed: 7,
            audio_relayed: 3,
            ..Default::default()
        });

        let stats = metrics.snapshot();
        assert_eq!(stats.total_connections, 2);
        assert_eq!(stats.active_connections, 1);
        assert_eq!(stats.images_received, 10);
        assert_eq!(stats.publishes_rejected, 4);
        assert_eq!(stats.frames_relayed, 10);
    }
}
