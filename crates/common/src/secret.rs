//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Use them for
//! every sensitive value the client holds: provider API tokens, room
//! credentials, and session passcodes.
//!
//! `SecretString` implements `Debug` with redaction, so any struct that
//! derives `Debug` while holding a secret gets safe logging behavior for
//! free. Reading the actual value requires an explicit
//! [`ExposeSecret::expose_secret`] call, and secrets are zeroized on drop.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct RoomCredentials {
//!     room: String,
//!     token: SecretString,
//! }
//!
//! let credentials = RoomCredentials {
//!     room: "class-47".to_string(),
//!     token: SecretString::from("sk-live-abc123"),
//! };
//!
//! // Safe: the token is redacted in Debug output.
//! let debug = format!("{credentials:?}");
//! assert!(!debug.contains("sk-live-abc123"));
//!
//! // Explicit access only.
//! assert_eq!(credentials.token.expose_secret(), "sk-live-abc123");
//! ```

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecretString::from("hunter2");
        let debug_str = format!("{secret:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("hunter2"));
    }

    #[test]
    fn test_expose_secret_returns_inner_value() {
        let secret = SecretString::from("session-passcode");
        assert_eq!(secret.expose_secret(), "session-passcode");
    }

    #[test]
    fn test_struct_with_secret_is_safe() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct ProviderCredentials {
            attendee: String,
            token: SecretString,
        }

        let creds = ProviderCredentials {
            attendee: "attendee-1".to_string(),
            token: SecretString::from("super-secret"),
        };

        let debug_str = format!("{creds:?}");

        assert!(debug_str.contains("attendee-1"));
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super-secret"));
    }
}
