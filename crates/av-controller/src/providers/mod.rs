//! Conferencing vendor back-ends.
//!
//! Three interchangeable transports, each implementing [`crate::backend::MediaBackend`]:
//!
//! - [`skylark`] - Skylark Meetings: one meeting per room, per-attendee join tokens
//! - [`tessera`] - Tessera Video: named sessions with passcodes, local per-user mute
//! - [`harbor`] - Harbor RTC: session/publisher model with publisher tokens
//!
//! None of them contains reconciliation logic; the generic skeleton in
//! [`crate::reconcile`] drives all three identically.

pub mod harbor;
pub mod skylark;
pub mod tessera;

pub use harbor::HarborBackend;
pub use skylark::SkylarkBackend;
pub use tessera::TesseraBackend;
