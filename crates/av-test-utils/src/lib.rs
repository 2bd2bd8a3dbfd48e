//! # AV Test Utilities
//!
//! Shared test utilities for the Chalkline audio/video controller.
//!
//! This crate provides a scriptable mock conferencing backend and
//! classroom fixtures so reconciliation logic can be tested without any
//! vendor transport.
//!
//! ## Modules
//!
//! - `mock_backend` - [`MockBackend`], a `MediaBackend` with scripted
//!   failures, call counters, and per-session inspection probes
//! - `fixtures` - classroom roster builders and test configuration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use av_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let backend = MockBackend::new();
//!     backend.fail_connect_for("class-101/team-2");
//!
//!     let config = test_config();
//!     let mut provider = Reconciler::new(backend.clone(), &config, UserId(1));
//!
//!     // Drive the provider, then inspect sessions:
//!     let probe = backend.session("class-101").unwrap();
//!     assert!(probe.audio_published());
//! }
//! ```

pub mod fixtures;
pub mod mock_backend;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_backend::*;

/// Install a compact tracing subscriber for test output.
///
/// Safe to call from every test; only the first call installs.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
