//! Classroom membership model, group partitioner, and wire format.
//!
//! This crate is the pure heart of the Chalkline client. It knows nothing
//! about conferencing providers or transports:
//!
//! - [`membership`] - immutable snapshots of classroom membership state
//!   (users, teams, team talk, private talk). Every mutation produces a
//!   new snapshot, so equality-based diffing stays valid upstream.
//! - [`partition`] - [`partition::compute_groups`], the pure function that
//!   derives the egocentric audio/video partition from membership state.
//! - [`wire`] - the JSON shapes exchanged with the signaling channel:
//!   the outbound [`wire::GroupsSnapshot`] broadcast and inbound
//!   [`wire::SignalingEvent`]s.
//!
//! The partitioner never performs I/O and never fails; malformed input is
//! a caller bug, not a runtime error.

#![warn(clippy::pedantic)]

pub mod membership;
pub mod partition;
pub mod wire;

pub use membership::{ClassroomState, MembershipError, PrivateTalk, Role, Team, TeamTalk, User};
pub use partition::{compute_groups, Group, GroupKey, Groups};
