//! Audio/video controller error types.
//!
//! Failures cross the provider boundary as values, never as panics.
//! `InvalidState` is the exception in spirit: it signals a caller logic
//! bug (an operation issued outside the contract's state machine) and is
//! not meant to be recovered from.

use classroom_protocol::membership::MembershipError;
use classroom_protocol::partition::GroupKey;
use thiserror::Error;

/// Failure acquiring session credentials from the provider.
///
/// Fatal for `init`: the classroom stays unjoined until the caller
/// retries and succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectFailure {
    /// The credential endpoint could not be reached (transient).
    #[error("credential endpoint unreachable: {0}")]
    Unreachable(String),

    /// The credential request was rejected (bad token, unknown room).
    #[error("credential request rejected: {0}")]
    Rejected(String),
}

/// Failure attaching to a provider room. Retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinFailure {
    /// The transport rejected the join.
    #[error("transport join rejected: {0}")]
    Rejected(String),

    /// The transport did not answer in time.
    #[error("transport join timed out: {0}")]
    Timeout(String),
}

/// Failure operating on a live provider session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session was already closed.
    #[error("session already closed")]
    Closed,

    /// A media operation failed inside the vendor transport.
    #[error("media operation failed: {0}")]
    Media(String),
}

/// One group that failed to converge during a reconcile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupFailure {
    pub key: GroupKey,
    pub reason: String,
}

/// Audio/video controller error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AvError {
    /// Credential acquisition failed; the classroom remains unjoined.
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectFailure),

    /// The main session join was rejected.
    #[error("join failed: {0}")]
    Join(#[from] JoinFailure),

    /// One or more group sessions failed to create or update. Sessions
    /// that succeeded are preserved; `failed` names the groups that did
    /// not converge.
    #[error("reconcile failed for {} group(s)", .failed.len())]
    Reconcile { failed: Vec<GroupFailure> },

    /// A media operation on a live session failed.
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// Operation issued outside the contract's state machine. A logic
    /// bug in the caller, not a recoverable condition.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    /// Channel or task plumbing failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AvError {
    /// Whether the caller may retry the failed operation unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            AvError::Connect(ConnectFailure::Unreachable(_))
            | AvError::Join(_)
            | AvError::Reconcile { .. }
            | AvError::Session(SessionError::Media(_)) => true,
            AvError::Connect(ConnectFailure::Rejected(_))
            | AvError::Session(SessionError::Closed)
            | AvError::InvalidState(_)
            | AvError::Internal(_) => false,
        }
    }
}

/// Classroom coordinator error type.
#[derive(Debug, Error)]
pub enum ClassroomError {
    /// A roster operation referenced a missing team or user.
    #[error("membership error: {0}")]
    Membership(#[from] MembershipError),

    /// The provider reported a failure.
    #[error(transparent)]
    Av(#[from] AvError),

    /// Actor channel plumbing failed (actor stopped or mailbox closed).
    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::types::TeamId;

    #[test]
    fn test_retryable_classification() {
        // Transient failures invite a retry.
        assert!(AvError::Connect(ConnectFailure::Unreachable("dns".to_string())).is_retryable());
        assert!(AvError::Join(JoinFailure::Timeout("5s".to_string())).is_retryable());
        assert!(AvError::Reconcile { failed: vec![] }.is_retryable());
        assert!(AvError::Session(SessionError::Media("glitch".to_string())).is_retryable());

        // Rejections and logic bugs do not.
        assert!(!AvError::Connect(ConnectFailure::Rejected("bad token".to_string()))
            .is_retryable());
        assert!(!AvError::Session(SessionError::Closed).is_retryable());
        assert!(!AvError::InvalidState("join before init").is_retryable());
        assert!(!AvError::Internal("channel closed".to_string()).is_retryable());
    }

    #[test]
    fn test_reconcile_error_reports_failed_groups() {
        let err = AvError::Reconcile {
            failed: vec![
                GroupFailure {
                    key: GroupKey::Team(TeamId(2)),
                    reason: "transport join rejected: room full".to_string(),
                },
                GroupFailure {
                    key: GroupKey::Private,
                    reason: "credential endpoint unreachable: dns".to_string(),
                },
            ],
        };

        assert_eq!(err.to_string(), "reconcile failed for 2 group(s)");
        if let AvError::Reconcile { failed } = err {
            assert_eq!(failed.first().map(|f| f.key), Some(GroupKey::Team(TeamId(2))));
        }
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            AvError::Connect(ConnectFailure::Rejected("expired token".to_string())).to_string(),
            "connect failed: credential request rejected: expired token"
        );
        assert_eq!(
            AvError::InvalidState("reconcile before join").to_string(),
            "invalid state: reconcile before join"
        );
    }
}
