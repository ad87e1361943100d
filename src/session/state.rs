//! Per-connection session state
//!
//! Identity and publish role of one connection, owned by its inbound loop.

use std::net::SocketAddr;
use std::time::Instant;

use crate::relay::AdmissionDecision;

/// Publish role of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    /// Never published, or broadcast ended
    Idle,
    /// Last image was accepted
    Publishing,
    /// Last image was refused
    BackedOff,
}

/// Per-connection state owned by the inbound loop
#[derive(Debug)]
pub struct SessionState {
    /// Unique session ID
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Connection start time
    pub connected_at: Instant,

    /// Publisher name announced with Hello
    pub publisher_name: Option<String>,

    /// Current publish role
    pub publish_state: PublishState,

    /// Last admission reply sent to the client (accepted?)
    last_reply: Option<bool>,
}

impl SessionState {
    /// Create a new session state
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            connected_at: Instant::now(),
            publisher_name: None,
            publish_state: PublishState::Idle,
            last_reply: None,
        }
    }

    /// Record the name from Hello.
    ///
    /// The publisher id is fixed while the session has images in flight,
    /// whether it announced a name or published under the default one. A
    /// Hello in that state is ignored and `false` is returned.
    pub fn set_publisher_name(&mut self, name: String) -> bool {
        if self.publish_state != PublishState::Idle {
            return false;
        }
        self.publisher_name = Some(name);
        true
    }

    /// Name used for admission: the announced one, or a per-session default
    pub fn publisher_id(&self) -> String {
        match &self.publisher_name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("session-{}", self.id),
        }
    }

    /// Apply an admission decision.
    ///
    /// Returns `Some(accepted)` when a reply should go to the client, which
    /// happens on the first decision and whenever the outcome flips.
    pub fn on_decision(&mut self, decision: &AdmissionDecision) -> Option<bool> {
        let accepted = decision.is_accepted();
        self.publish_state = if accepted {
            PublishState::Publishing
        } else {
            PublishState::BackedOff
        };

        if self.last_reply == Some(accepted) {
            None
        } else {
            self.last_reply = Some(accepted);
            Some(accepted)
        }
    }

    /// Broadcast ended by this client
    pub fn on_broadcast_ended(&mut self) {
        self.publish_state = PublishState::Idle;
        self.last_reply = None;
    }
}
