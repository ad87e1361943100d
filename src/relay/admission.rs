//! Publisher admission
//!
//! A single slot admits one publisher at a time, keyed by publisher name.
//!
//! ```text
//!   Open ── publish(Y) ──────────────────────────────► Held(Y)
//!   Held(X) ── publish(X) ───────────────────────────► Held(X)  (refreshed)
//!   Held(X) ── publish(Y), record fresh ─────────────► Held(X)  (BACKOFF)
//!   Held(X) ── publish(Y), record stale ─────────────► Held(Y)  (reclaimed)
//!   Held(X) ── release(X) ───────────────────────────► Open
//! ```
//!
//! A held slot whose record is older than the staleness window behaves as
//! open, so a crashed publisher cannot lock the slot forever.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

use crate::protocol::constants::REASON_BACKOFF;

use super::liveness::is_stale;

/// Why a publish attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Another publisher holds the slot; retry later
    Backoff,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Backoff => REASON_BACKOFF,
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a publish attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Same publisher, record refreshed
    Refreshed,
    /// Slot taken over; `previous` is the stale holder, if any
    Claimed { previous: Option<String> },
    /// Slot held by someone else
    Rejected(RejectReason),
}

impl AdmissionDecision {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, AdmissionDecision::Rejected(_))
    }
}

/// Observable slot state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Open,
    Held(String),
}

/// Who was last accepted, and when
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionRecord {
    pub publisher_id: String,
    pub accepted_at: Instant,
}

/// The admission slot state machine
#[derive(Debug, Default)]
pub struct AdmissionSlot {
    record: Option<AdmissionRecord>,
}

impl AdmissionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, treating a stale record as open
    pub fn state(&self, now: Instant, window: Duration) -> SlotState {
        match &self.record {
            Some(r) if !is_stale(r.accepted_at, now, window) => SlotState::Held(r.publisher_id.clone()),
            _ => SlotState::Open,
        }
    }

    /// Raw record, stale or not
    pub fn record(&self) -> Option<&AdmissionRecord> {
        self.record.as_ref()
    }

    /// Decide a publish attempt and update the record on acceptance
    pub fn decide(&mut self, publisher_id: &str, now: Instant, window: Duration) -> AdmissionDecision {
        let decision = match &self.record {
            None => AdmissionDecision::Claimed { previous: None },
            Some(r) if r.publisher_id == publisher_id => AdmissionDecision::Refreshed,
            Some(r) if is_stale(r.accepted_at, now, window) => AdmissionDecision::Claimed {
                previous: Some(r.publisher_id.clone()),
            },
            Some(_) => AdmissionDecision::Rejected(RejectReason::Backoff),
        };

        if decision.is_accepted() {
            match self.record.as_mut() {
                Some(r) if r.publisher_id == publisher_id => r.accepted_at = r.accepted_at.max(now),
                _ => {
                    self.record = Some(AdmissionRecord {
                        publisher_id: publisher_id.to_string(),
                        accepted_at: now,
                    })
                }
            }
        }

        decision
    }

    /// Whether `publisher_id` could write without claiming: it holds the
    /// slot, or the slot is open. Never mutates the record.
    pub fn permits(&self, publisher_id: &str, now: Instant, window: Duration) -> bool {
        match self.state(now, window) {
            SlotState::Open => true,
            SlotState::Held(holder) => holder == publisher_id,
        }
    }

    /// Whether the record names `publisher_id`, regardless of staleness
    pub fn is_holder(&self, publisher_id: &str) -> bool {
        self.record
            .as_ref()
            .is_some_and(|r| r.publisher_id == publisher_id)
    }

    /// Open the slot if `publisher_id` holds it. Returns whether it did.
    pub fn release(&mut self, publisher_id: &str) -> bool {
        if self.is_holder(publisher_id) {
            self.record = None;
            true
        } else {
            false
        }
    }
}

/// Async-shared admission slot
#[derive(Debug)]
pub struct AdmissionController {
    slot: Mutex<AdmissionSlot>,
    window: Duration,
}

impl AdmissionController {
    pub fn new(window: Duration) -> Self {
        Self {
            slot: Mutex::new(AdmissionSlot::new()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Decide a publish attempt at `now`
    pub async fn admit(&self, publisher_id: &str, now: Instant) -> AdmissionDecision {
        self.slot.lock().await.decide(publisher_id, now, self.window)
    }

    /// Current holder, if the record is fresh
    pub async fn holder(&self, now: Instant) -> Option<String> {
        match self.slot.lock().await.state(now, self.window) {
            SlotState::Held(id) => Some(id),
            SlotState::Open => None,
        }
    }

    /// Release the slot if `publisher_id` holds it
    pub async fn release(&self, publisher_id: &str) -> bool {
        self.slot.lock().await.release(publisher_id)
    }

    /// Lock the slot so a decision and the write it guards happen together
    pub async fn lock(&self) -> MutexGuard<'_, AdmissionSlot> {
        self.slot.lock().await
    }
}
