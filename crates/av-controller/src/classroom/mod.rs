//! The classroom coordinator actor.
//!
//! One `ClassroomActor` runs per joined classroom. It owns the
//! membership snapshot and the configured provider, and it is the only
//! task that ever calls `reconcile`, which makes the serialization
//! invariant structural: two reconciliations cannot interleave because
//! they are issued from one task, and a torn-down provider cannot be
//! mutated by stale callbacks because nothing else holds it.
//!
//! ```text
//! signaling events ─┐
//! UI commands ──────┼─> mailbox ─> ClassroomActor
//!                   │               ├── ClassroomState (membership snapshot)
//!                   │               ├── compute_groups() on every change
//!                   │               └── provider.reconcile(&groups)
//! groups broadcast <┘ (initiating client only)
//! ```
//!
//! # Modules
//!
//! - [`actor`] - `ClassroomActor` and its run loop
//! - [`messages`] - mailbox message types and the state snapshot

pub mod actor;
pub mod messages;

pub use actor::{ClassroomActor, ClassroomHandle};
pub use messages::{ClassroomMessage, ClassroomSnapshot};
