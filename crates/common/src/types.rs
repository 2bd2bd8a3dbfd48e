//! Common identifier types for Chalkline components.
//!
//! Classroom-level identifiers are numeric because the signaling wire
//! format carries them as JSON numbers. Both newtypes serialize
//! transparently as their inner value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a classroom user.
///
/// Assigned by the classroom backend at login and stable for the
/// lifetime of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a team within a classroom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub u32);

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_numbers() {
        assert_eq!(serde_json::to_string(&UserId(42)).unwrap(), "42");
        assert_eq!(serde_json::to_string(&TeamId(7)).unwrap(), "7");
    }

    #[test]
    fn test_ids_deserialize_from_numbers() {
        let user: UserId = serde_json::from_str("42").unwrap();
        assert_eq!(user, UserId(42));

        let team: TeamId = serde_json::from_str("7").unwrap();
        assert_eq!(team, TeamId(7));
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(UserId(3).to_string(), "3");
        assert_eq!(TeamId(12).to_string(), "12");
    }
}
