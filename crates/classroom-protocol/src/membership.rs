//! Immutable classroom membership snapshots.
//!
//! All membership state is modeled as value snapshots: every mutation
//! returns a new value and leaves the old one untouched. The partitioner
//! re-derives groups from a snapshot on every change, and the coordinator
//! compares successive partitions by equality, so in-place mutation of
//! nested sets would silently break diffing.

use common::types::{TeamId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Classroom role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Teacher,
    Student,
}

/// Signaling-level connection state of a remote user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomConnection {
    Online,
    Offline,
    Pending,
}

/// A classroom participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique, stable for the session's lifetime.
    pub id: UserId,
    pub role: Role,
    #[serde(default = "RoomConnection::online")]
    pub connection: RoomConnection,
}

impl RoomConnection {
    const fn online() -> Self {
        RoomConnection::Online
    }
}

impl User {
    /// Create a user in the `Online` connection state.
    #[must_use]
    pub fn new(id: UserId, role: Role) -> Self {
        Self {
            id,
            role,
            connection: RoomConnection::Online,
        }
    }
}

/// A named team of classroom users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    pub color: String,
    pub member_ids: BTreeSet<UserId>,
}

impl Team {
    /// Create an empty team.
    #[must_use]
    pub fn new(id: TeamId, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            member_ids: BTreeSet::new(),
        }
    }

    /// Return a copy of this team with `user_id` as a member.
    #[must_use]
    pub fn with_member(&self, user_id: UserId) -> Self {
        let mut team = self.clone();
        team.member_ids.insert(user_id);
        team
    }

    /// Return a copy of this team without `user_id`.
    #[must_use]
    pub fn without_member(&self, user_id: UserId) -> Self {
        let mut team = self.clone();
        team.member_ids.remove(&user_id);
        team
    }

    /// Return a copy of this team with all of `user_ids` added.
    #[must_use]
    pub fn with_members(&self, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        let mut team = self.clone();
        team.member_ids.extend(user_ids);
        team
    }
}

/// Team-talk mode: the set of teams plus whether team talk is active.
///
/// Teams can exist (be created, edited) while team talk is stopped; only
/// `started` gives them partition effects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamTalk {
    pub started: bool,
    /// Teams by id; ordered map so partition output is deterministic.
    pub teams: BTreeMap<TeamId, Team>,
}

impl TeamTalk {
    /// Add a new team. Fails if the id is already taken.
    pub fn with_team(&self, team: Team) -> Result<Self, MembershipError> {
        if self.teams.contains_key(&team.id) {
            return Err(MembershipError::TeamExists(team.id));
        }

        let mut next = self.clone();
        next.teams.insert(team.id, team);
        Ok(next)
    }

    /// Remove a team. Removing an unknown id is a no-op.
    #[must_use]
    pub fn without_team(&self, team_id: TeamId) -> Self {
        let mut next = self.clone();
        next.teams.remove(&team_id);
        next
    }

    /// Remove every team.
    #[must_use]
    pub fn without_teams(&self) -> Self {
        let mut next = self.clone();
        next.teams.clear();
        next
    }

    /// Add a user to a team.
    pub fn with_team_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<Self, MembershipError> {
        let team = self
            .teams
            .get(&team_id)
            .ok_or(MembershipError::TeamNotFound(team_id))?;

        let mut next = self.clone();
        next.teams.insert(team_id, team.with_member(user_id));
        Ok(next)
    }

    /// Remove a user from a team.
    pub fn without_team_member(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<Self, MembershipError> {
        let team = self
            .teams
            .get(&team_id)
            .ok_or(MembershipError::TeamNotFound(team_id))?;

        let mut next = self.clone();
        next.teams.insert(team_id, team.without_member(user_id));
        Ok(next)
    }

    /// Move a user between teams.
    pub fn with_member_moved(
        &self,
        from: TeamId,
        to: TeamId,
        user_id: UserId,
    ) -> Result<Self, MembershipError> {
        if !self.teams.contains_key(&to) {
            return Err(MembershipError::TeamNotFound(to));
        }

        self.without_team_member(from, user_id)?
            .with_team_member(to, user_id)
    }

    /// Merge team `from` into team `to`, deleting `from`.
    pub fn with_teams_merged(&self, from: TeamId, to: TeamId) -> Result<Self, MembershipError> {
        let source = self
            .teams
            .get(&from)
            .ok_or(MembershipError::TeamNotFound(from))?;
        let target = self
            .teams
            .get(&to)
            .ok_or(MembershipError::TeamNotFound(to))?;

        let merged = target.with_members(source.member_ids.iter().copied());

        let mut next = self.clone();
        next.teams.remove(&from);
        next.teams.insert(to, merged);
        Ok(next)
    }

    /// Start team talk.
    #[must_use]
    pub fn started(&self) -> Self {
        let mut next = self.clone();
        next.started = true;
        next
    }

    /// Stop team talk. Teams are kept; only the partition effect ends.
    #[must_use]
    pub fn stopped(&self) -> Self {
        let mut next = self.clone();
        next.started = false;
        next
    }
}

/// Private-talk mode: an audio-exclusive subset of participants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateTalk {
    pub started: bool,
    pub member_ids: BTreeSet<UserId>,
}

impl PrivateTalk {
    /// Start the private talk with the current member set.
    #[must_use]
    pub fn started(&self) -> Self {
        let mut next = self.clone();
        next.started = true;
        next
    }

    /// End the private talk. Members are kept for a possible restart.
    #[must_use]
    pub fn stopped(&self) -> Self {
        let mut next = self.clone();
        next.started = false;
        next
    }

    #[must_use]
    pub fn with_member(&self, user_id: UserId) -> Self {
        let mut next = self.clone();
        next.member_ids.insert(user_id);
        next
    }

    #[must_use]
    pub fn without_member(&self, user_id: UserId) -> Self {
        let mut next = self.clone();
        next.member_ids.remove(&user_id);
        next
    }
}

/// Full membership snapshot of one classroom, as seen by the local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassroomState {
    pub local_user: User,
    /// Remote users by id; ordered map for deterministic iteration.
    pub remote_users: BTreeMap<UserId, User>,
    pub team_talk: TeamTalk,
    pub private_talk: PrivateTalk,
}

impl ClassroomState {
    /// Create a classroom containing only the local user.
    #[must_use]
    pub fn new(local_user: User) -> Self {
        Self {
            local_user,
            remote_users: BTreeMap::new(),
            team_talk: TeamTalk::default(),
            private_talk: PrivateTalk::default(),
        }
    }

    /// Add or replace a remote user.
    #[must_use]
    pub fn with_remote_user(&self, user: User) -> Self {
        let mut next = self.clone();
        next.remote_users.insert(user.id, user);
        next
    }

    /// Remove a remote user. They stay in any team/private-talk member
    /// sets; the partitioner works over ids, and membership sets may
    /// reference users that already left.
    #[must_use]
    pub fn without_remote_user(&self, user_id: UserId) -> Self {
        let mut next = self.clone();
        next.remote_users.remove(&user_id);
        next
    }

    /// Update a remote user's connection state.
    pub fn with_remote_connection(
        &self,
        user_id: UserId,
        connection: RoomConnection,
    ) -> Result<Self, MembershipError> {
        let user = self
            .remote_users
            .get(&user_id)
            .ok_or(MembershipError::UserNotFound(user_id))?;

        let mut updated = user.clone();
        updated.connection = connection;

        let mut next = self.clone();
        next.remote_users.insert(user_id, updated);
        Ok(next)
    }
}

/// Errors from membership snapshot operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MembershipError {
    /// Team id is already taken.
    #[error("Team {0} already exists")]
    TeamExists(TeamId),

    /// Operation referenced a team that does not exist.
    #[error("Team {0} does not exist")]
    TeamNotFound(TeamId),

    /// Operation referenced a user that does not exist.
    #[error("User {0} does not exist")]
    UserNotFound(UserId),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn team_talk_with_team(team_id: TeamId) -> TeamTalk {
        TeamTalk::default()
            .with_team(Team::new(team_id, "Red", "#ff0000"))
            .unwrap()
    }

    #[test]
    fn test_with_team_rejects_duplicate_id() {
        let talk = team_talk_with_team(TeamId(1));
        let result = talk.with_team(Team::new(TeamId(1), "Blue", "#0000ff"));

        assert_eq!(result.unwrap_err(), MembershipError::TeamExists(TeamId(1)));
    }

    #[test]
    fn test_with_team_member_requires_existing_team() {
        let talk = team_talk_with_team(TeamId(1));
        let result = talk.with_team_member(TeamId(9), UserId(5));

        assert_eq!(result.unwrap_err(), MembershipError::TeamNotFound(TeamId(9)));
    }

    #[test]
    fn test_mutations_leave_original_snapshot_untouched() {
        let talk = team_talk_with_team(TeamId(1));
        let updated = talk.with_team_member(TeamId(1), UserId(5)).unwrap();

        assert!(talk.teams[&TeamId(1)].member_ids.is_empty());
        assert!(updated.teams[&TeamId(1)].member_ids.contains(&UserId(5)));
    }

    #[test]
    fn test_move_member_between_teams() {
        let talk = team_talk_with_team(TeamId(1))
            .with_team(Team::new(TeamId(2), "Blue", "#0000ff"))
            .unwrap()
            .with_team_member(TeamId(1), UserId(5))
            .unwrap();

        let moved = talk.with_member_moved(TeamId(1), TeamId(2), UserId(5)).unwrap();

        assert!(!moved.teams[&TeamId(1)].member_ids.contains(&UserId(5)));
        assert!(moved.teams[&TeamId(2)].member_ids.contains(&UserId(5)));
    }

    #[test]
    fn test_merge_teams_moves_members_and_deletes_source() {
        let talk = team_talk_with_team(TeamId(1))
            .with_team(Team::new(TeamId(2), "Blue", "#0000ff"))
            .unwrap()
            .with_team_member(TeamId(1), UserId(5))
            .unwrap()
            .with_team_member(TeamId(2), UserId(6))
            .unwrap();

        let merged = talk.with_teams_merged(TeamId(1), TeamId(2)).unwrap();

        assert!(!merged.teams.contains_key(&TeamId(1)));
        let target = &merged.teams[&TeamId(2)];
        assert!(target.member_ids.contains(&UserId(5)));
        assert!(target.member_ids.contains(&UserId(6)));
    }

    #[test]
    fn test_private_talk_stop_keeps_members() {
        let talk = PrivateTalk::default()
            .with_member(UserId(1))
            .with_member(UserId(2))
            .started();

        let stopped = talk.stopped();

        assert!(!stopped.started);
        assert_eq!(stopped.member_ids.len(), 2);
    }

    #[test]
    fn test_team_talk_stop_keeps_teams() {
        let talk = team_talk_with_team(TeamId(1)).started();
        let stopped = talk.stopped();

        assert!(!stopped.started);
        assert!(stopped.teams.contains_key(&TeamId(1)));
    }

    #[test]
    fn test_classroom_remote_user_roster() {
        let classroom = ClassroomState::new(User::new(UserId(1), Role::Teacher))
            .with_remote_user(User::new(UserId(2), Role::Student));

        assert!(classroom.remote_users.contains_key(&UserId(2)));

        let smaller = classroom.without_remote_user(UserId(2));
        assert!(smaller.remote_users.is_empty());
        // Original snapshot unchanged.
        assert!(classroom.remote_users.contains_key(&UserId(2)));
    }

    #[test]
    fn test_connection_state_update() {
        let classroom = ClassroomState::new(User::new(UserId(1), Role::Teacher))
            .with_remote_user(User::new(UserId(2), Role::Student));

        let updated = classroom
            .with_remote_connection(UserId(2), RoomConnection::Offline)
            .unwrap();
        assert_eq!(
            updated.remote_users[&UserId(2)].connection,
            RoomConnection::Offline
        );

        let missing = classroom.with_remote_connection(UserId(9), RoomConnection::Offline);
        assert_eq!(
            missing.unwrap_err(),
            MembershipError::UserNotFound(UserId(9))
        );
    }

    #[test]
    fn test_role_serializes_in_wire_case() {
        assert_eq!(
            serde_json::to_string(&Role::Teacher).unwrap(),
            "\"TEACHER\""
        );
        assert_eq!(
            serde_json::to_string(&RoomConnection::Online).unwrap(),
            "\"ONLINE\""
        );
    }
}
