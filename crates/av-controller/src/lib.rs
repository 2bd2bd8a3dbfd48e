//! Chalkline Audio/Video Controller
//!
//! This library converges live conferencing sessions onto the classroom's
//! desired group partition. The classroom can run against any of three
//! conferencing back-ends; all of them satisfy the same capability
//! contract, so the rest of the client never sees vendor specifics.
//!
//! # Architecture
//!
//! ```text
//! ClassroomActor (one per joined classroom)
//! ├── owns the membership snapshot (users, teams, private talk)
//! ├── recomputes the group partition on every membership change
//! └── owns one AudioVideo provider
//!     └── Reconciler<B: MediaBackend> (generic skeleton)
//!         └── ProviderSession (one per live group)
//! ```
//!
//! # Key Design Decisions
//!
//! - **One session per group**: each group in the partition maps to
//!   exactly one provider session; a group surviving a partition change
//!   is reconfigured in place, never rejoined.
//! - **Serialized reconciliation**: all reconcile calls are issued from
//!   the single classroom actor task, so two reconciliations can never
//!   interleave. Queued membership events are drained and coalesced
//!   before each pass, so bursts converge in one reconcile.
//! - **Egocentric partitions**: every client computes its own partition
//!   from shared membership state; only the initiating client broadcasts
//!   the serialized snapshot.
//!
//! # Modules
//!
//! - [`contract`] - the `AudioVideo` capability trait and provider factory
//! - [`reconcile`] - the generic reconciliation skeleton
//! - [`session`] - per-group session records and their state machine
//! - [`backend`] - the vendor transport boundary
//! - [`providers`] - the three vendor back-ends
//! - [`classroom`] - the classroom coordinator actor
//! - [`errors`] - error types

pub mod backend;
pub mod classroom;
pub mod contract;
pub mod errors;
pub mod providers;
pub mod reconcile;
pub mod session;

pub use classroom::{ClassroomActor, ClassroomHandle, ClassroomSnapshot};
pub use contract::{create_provider, AudioVideo, VideoSink};
pub use errors::{AvError, ClassroomError, ConnectFailure, GroupFailure, JoinFailure, SessionError};
pub use reconcile::Reconciler;
