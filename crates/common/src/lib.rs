//! Common building blocks for Chalkline components.
//!
//! Chalkline is a classroom conferencing client: one teacher and a set of
//! students share audio/video while the class is dynamically partitioned
//! into breakout groups (whole class, team talk, private talk). This crate
//! holds the pieces every other crate needs:
//!
//! - [`types`] - newtype identifiers for classroom users and teams
//! - [`secret`] - secret wrappers for provider credentials
//! - [`config`] - environment-driven configuration

pub mod config;
pub mod secret;
pub mod types;
