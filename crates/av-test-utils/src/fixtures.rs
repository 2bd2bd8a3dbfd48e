//! Pre-configured test data for classroom testing.
//!
//! Provides a roster builder for membership snapshots and ready-made
//! configuration values.

use classroom_protocol::membership::{ClassroomState, PrivateTalk, Role, Team, User};
use classroom_protocol::partition::{compute_groups, Groups};
use common::config::Config;
use common::types::{TeamId, UserId};
use std::collections::HashMap;

/// Default room used by [`test_config`].
pub const TEST_ROOM: &str = "class-101";

/// Configuration for tests, backed by the same `from_vars` path
/// production uses.
#[must_use]
pub fn test_config() -> Config {
    test_config_for_room(TEST_ROOM)
}

/// Configuration for tests against a specific room name.
#[must_use]
pub fn test_config_for_room(room: &str) -> Config {
    let vars = HashMap::from([
        ("CLASSROOM_ROOM".to_string(), room.to_string()),
        ("AV_PROVIDER_TOKEN".to_string(), "test-token".to_string()),
    ]);
    Config::from_vars(&vars).expect("test config should load")
}

/// Builder for classroom membership snapshots.
///
/// ```rust
/// use av_test_utils::TestRoster;
///
/// let state = TestRoster::teacher(1)
///     .with_students(&[2, 3, 4, 5])
///     .with_team(1, "Red", &[2, 3])
///     .with_team(2, "Blue", &[4, 5])
///     .team_talk_started()
///     .build();
///
/// assert_eq!(state.remote_users.len(), 4);
/// ```
#[derive(Clone)]
pub struct TestRoster {
    state: ClassroomState,
}

impl TestRoster {
    /// Start a roster with a local teacher.
    #[must_use]
    pub fn teacher(id: u64) -> Self {
        Self {
            state: ClassroomState::new(User::new(UserId(id), Role::Teacher)),
        }
    }

    /// Start a roster with a local student.
    #[must_use]
    pub fn student(id: u64) -> Self {
        Self {
            state: ClassroomState::new(User::new(UserId(id), Role::Student)),
        }
    }

    /// Add remote students.
    #[must_use]
    pub fn with_students(mut self, ids: &[u64]) -> Self {
        for id in ids {
            self.state = self
                .state
                .with_remote_user(User::new(UserId(*id), Role::Student));
        }
        self
    }

    /// Add a remote teacher.
    #[must_use]
    pub fn with_remote_teacher(mut self, id: u64) -> Self {
        self.state = self
            .state
            .with_remote_user(User::new(UserId(id), Role::Teacher));
        self
    }

    /// Add a team with the given members.
    #[must_use]
    pub fn with_team(mut self, team_id: u32, name: &str, member_ids: &[u64]) -> Self {
        let team = Team::new(TeamId(team_id), name, "#808080")
            .with_members(member_ids.iter().copied().map(UserId));
        self.state.team_talk = self
            .state
            .team_talk
            .with_team(team)
            .expect("fixture team id should be unique");
        self
    }

    /// Start team talk.
    #[must_use]
    pub fn team_talk_started(mut self) -> Self {
        self.state.team_talk = self.state.team_talk.started();
        self
    }

    /// Start a private talk with the given members.
    #[must_use]
    pub fn with_private_talk(mut self, member_ids: &[u64]) -> Self {
        let mut private_talk = PrivateTalk::default();
        for id in member_ids {
            private_talk = private_talk.with_member(UserId(*id));
        }
        self.state.private_talk = private_talk.started();
        self
    }

    /// Finish the roster.
    #[must_use]
    pub fn build(self) -> ClassroomState {
        self.state
    }

    /// Compute the partition this roster produces.
    #[must_use]
    pub fn groups(&self) -> Groups {
        compute_groups(
            &self.state.local_user,
            &self.state.remote_users,
            &self.state.team_talk,
            &self.state.private_talk,
        )
    }
}
