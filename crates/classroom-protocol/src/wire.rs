//! JSON wire shapes for the signaling channel.
//!
//! Two contracts live here:
//!
//! - [`GroupsSnapshot`] - the outbound broadcast a client sends after it
//!   changed the partition locally, so other participants apply the same
//!   partition without recomputation races. Member sets are carried as
//!   ordered arrays.
//! - [`SignalingEvent`] - inbound events that update the membership model
//!   before the partitioner re-runs.

use crate::membership::{RoomConnection, Team, User};
use crate::partition::Groups;
use common::types::{TeamId, UserId};
use serde::{Deserialize, Serialize};

/// One group in the broadcast snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSnapshot {
    pub member_ids: Vec<UserId>,
    pub audio: bool,
    pub video: bool,
}

/// One team group in the broadcast snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamGroupSnapshot {
    pub id: TeamId,
    pub member_ids: Vec<UserId>,
    pub audio: bool,
    pub video: bool,
}

/// Serialized form of a [`Groups`] value.
///
/// `teamGroups` is omitted when no team groups exist, `privateGroup` when
/// no private talk is running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<GroupSnapshot>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_groups: Option<Vec<TeamGroupSnapshot>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_group: Option<GroupSnapshot>,
}

impl From<&Groups> for GroupsSnapshot {
    fn from(groups: &Groups) -> Self {
        let main = Some(GroupSnapshot {
            member_ids: groups.main.member_ids.iter().copied().collect(),
            audio: groups.main.audio_available,
            video: groups.main.video_available,
        });

        let team_groups = if groups.team_groups.is_empty() {
            None
        } else {
            Some(
                groups
                    .team_groups
                    .iter()
                    .map(|(id, group)| TeamGroupSnapshot {
                        id: *id,
                        member_ids: group.member_ids.iter().copied().collect(),
                        audio: group.audio_available,
                        video: group.video_available,
                    })
                    .collect(),
            )
        };

        let private_group = groups.private_group.as_ref().map(|group| GroupSnapshot {
            member_ids: group.member_ids.iter().copied().collect(),
            audio: group.audio_available,
            video: group.video_available,
        });

        GroupsSnapshot {
            main,
            team_groups,
            private_group,
        }
    }
}

/// Inbound signaling events.
///
/// Each event carries enough data to update the membership snapshot
/// before the partitioner re-runs; clients never have to fetch state in
/// response to an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalingEvent {
    /// Team talk started or stopped. Carries the full team roster when
    /// started, so late state converges in one event.
    #[serde(rename_all = "camelCase")]
    TeamTalkChanged {
        started: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        teams: Option<Vec<Team>>,
    },

    /// Private talk started or stopped.
    #[serde(rename_all = "camelCase")]
    PrivateTalkChanged { started: bool },

    /// A user was added to the running private talk.
    #[serde(rename_all = "camelCase")]
    UserAddedToPrivateTalk { user_id: UserId },

    /// A user was removed from the running private talk.
    #[serde(rename_all = "camelCase")]
    UserRemovedFromPrivateTalk { user_id: UserId },

    /// A remote user joined the classroom.
    #[serde(rename_all = "camelCase")]
    UserJoined { user: User },

    /// A remote user left the classroom.
    #[serde(rename_all = "camelCase")]
    UserLeft { user_id: UserId },

    /// A remote user's connection state changed.
    #[serde(rename_all = "camelCase")]
    UserConnectionStateChanged {
        user_id: UserId,
        connection: RoomConnection,
    },
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::membership::{PrivateTalk, Role, TeamTalk};
    use crate::partition::compute_groups;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn classroom_groups() -> Groups {
        let local = User::new(UserId(1), Role::Teacher);
        let remote: BTreeMap<UserId, User> = [2u64, 3, 4, 5]
            .iter()
            .map(|id| (UserId(*id), User::new(UserId(*id), Role::Student)))
            .collect();

        let team_talk = TeamTalk::default()
            .with_team(
                Team::new(TeamId(7), "Red", "#ff0000")
                    .with_members([UserId(2), UserId(3)]),
            )
            .unwrap()
            .started();

        let private_talk = PrivateTalk::default()
            .with_member(UserId(2))
            .with_member(UserId(3))
            .started();

        compute_groups(&local, &remote, &team_talk, &private_talk)
    }

    #[test]
    fn test_snapshot_shape_matches_wire_contract() {
        let snapshot = GroupsSnapshot::from(&classroom_groups());
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(
            value,
            json!({
                "main": {
                    "memberIds": [1, 4, 5],
                    "audio": false,
                    "video": true
                },
                "teamGroups": [{
                    "id": 7,
                    "memberIds": [2, 3],
                    "audio": false,
                    "video": true
                }],
                "privateGroup": {
                    "memberIds": [2, 3],
                    "audio": false,
                    "video": false
                }
            })
        );
    }

    #[test]
    fn test_snapshot_member_ids_are_ordered() {
        let snapshot = GroupsSnapshot::from(&classroom_groups());
        let main = snapshot.main.unwrap();

        let mut sorted = main.member_ids.clone();
        sorted.sort_unstable();
        assert_eq!(main.member_ids, sorted);
    }

    #[test]
    fn test_snapshot_omits_absent_sections() {
        let local = User::new(UserId(1), Role::Student);
        let groups = compute_groups(
            &local,
            &BTreeMap::new(),
            &TeamTalk::default(),
            &PrivateTalk::default(),
        );

        let value = serde_json::to_value(GroupsSnapshot::from(&groups)).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("main"));
        assert!(!object.contains_key("teamGroups"));
        assert!(!object.contains_key("privateGroup"));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = GroupsSnapshot::from(&classroom_groups());
        let text = serde_json::to_string(&snapshot).unwrap();
        let parsed: GroupsSnapshot = serde_json::from_str(&text).unwrap();

        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_signaling_event_tags() {
        let event = SignalingEvent::UserAddedToPrivateTalk { user_id: UserId(4) };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(
            value,
            json!({"type": "user-added-to-private-talk", "userId": 4})
        );
    }

    #[test]
    fn test_team_talk_changed_parses_with_roster() {
        let raw = json!({
            "type": "team-talk-changed",
            "started": true,
            "teams": [{
                "id": 1,
                "name": "Red",
                "color": "#ff0000",
                "memberIds": [2, 3]
            }]
        });

        let event: SignalingEvent = serde_json::from_value(raw).unwrap();
        match event {
            SignalingEvent::TeamTalkChanged { started, teams } => {
                assert!(started);
                let teams = teams.unwrap();
                assert_eq!(teams.len(), 1);
                assert!(teams[0].member_ids.contains(&UserId(2)));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_team_talk_changed_parses_without_roster() {
        let raw = json!({"type": "team-talk-changed", "started": false});

        let event: SignalingEvent = serde_json::from_str(&raw.to_string()).unwrap();
        assert_eq!(
            event,
            SignalingEvent::TeamTalkChanged {
                started: false,
                teams: None
            }
        );
    }

    #[test]
    fn test_user_joined_event_round_trip() {
        let event = SignalingEvent::UserJoined {
            user: User::new(UserId(9), Role::Student),
        };

        let text = serde_json::to_string(&event).unwrap();
        let parsed: SignalingEvent = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, event);
    }
}
