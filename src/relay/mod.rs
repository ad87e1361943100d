//! Broadcast relay core
//!
//! One publisher at a time writes into a shared set of latest-frame slots;
//! every connected consumer reads from them and relays what is new.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<BroadcastHub>
//!                 ┌──────────────────────────────┐
//!                 │ admission: Mutex<Slot>       │
//!                 │ state: {                     │
//!                 │   image: RwLock<Snapshot>,   │
//!                 │   audio: RwLock<Snapshot>,   │
//!                 │   changes: watch::Sender,    │
//!                 │ }                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!        ┌───────────────────────┼───────────────────────┐
//!        │                       │                       │
//!        ▼                       ▼                       ▼
//!   [inbound loop]         [outbound loop]         [outbound loop]
//!   publish_image()        read_image()            read_image()
//!        │                       │                       │
//!        └──► admission ──► state ──► edge-triggered send ──► TCP
//! ```
//!
//! Snapshots are cloned out under the lock and sent after it is released;
//! no lock is ever held across a network write.

pub mod admission;
pub mod config;
pub mod cursor;
pub mod hub;
pub mod liveness;
pub mod state;

pub use admission::{AdmissionController, AdmissionDecision, AdmissionSlot, RejectReason, SlotState};
pub use config::RelayConfig;
pub use cursor::{ImageAction, RelayCursor};
pub use hub::{BroadcastHub, EndOutcome};
pub use state::{BroadcastState, Snapshot};
