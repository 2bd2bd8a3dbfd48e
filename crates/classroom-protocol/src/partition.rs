//! Egocentric group partitioning.
//!
//! [`compute_groups`] derives, from a membership snapshot, which subset of
//! participants the local user should hear and see. The output is
//! egocentric: availability flags describe the local viewer only, and each
//! participant computes its own partition independently from the shared
//! membership state.
//!
//! The function is pure and deterministic. Identical inputs produce
//! structurally identical output, including group ordering (teams are
//! iterated in id order), so callers can diff successive partitions by
//! equality.

use crate::membership::{PrivateTalk, Role, TeamTalk, User};
use common::types::{TeamId, UserId};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// One egocentric group: a member set plus the local user's availability.
///
/// The flags never describe anyone but the local viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub member_ids: BTreeSet<UserId>,
    /// Whether the local user may hear and speak in this group.
    pub audio_available: bool,
    /// Whether the local user may see this group's video.
    pub video_available: bool,
}

/// Identity of a group across successive partitions.
///
/// Reconciliation diffs two `Groups` values by key: a key present in both
/// means the session is updated in place, a key that disappears means the
/// session is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Main,
    Team(TeamId),
    Private,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Main => f.write_str("main"),
            GroupKey::Team(id) => write!(f, "team-{id}"),
            GroupKey::Private => f.write_str("private"),
        }
    }
}

/// The partitioner's output: one main group, zero-or-more team groups,
/// and an optional private-talk group.
///
/// Invariant: every classroom user id appears in `main` or in a team
/// group (exactly one of the two); private-talk members additionally
/// appear in `private_group`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Groups {
    pub main: Group,
    /// Team groups in team-id order.
    pub team_groups: Vec<(TeamId, Group)>,
    pub private_group: Option<Group>,
}

impl Groups {
    /// Iterate all groups with their reconciliation keys, main first,
    /// teams in id order, private last.
    pub fn entries(&self) -> impl Iterator<Item = (GroupKey, &Group)> {
        std::iter::once((GroupKey::Main, &self.main))
            .chain(
                self.team_groups
                    .iter()
                    .map(|(id, group)| (GroupKey::Team(*id), group)),
            )
            .chain(
                self.private_group
                    .iter()
                    .map(|group| (GroupKey::Private, group)),
            )
    }

    /// Look up a group by key.
    #[must_use]
    pub fn get(&self, key: GroupKey) -> Option<&Group> {
        self.entries()
            .find_map(|(k, group)| (k == key).then_some(group))
    }
}

/// Compute the local user's group partition.
///
/// Team talk is applied first, then private talk; private talk always
/// wins. A private conversation must never leak audio into groups its
/// participants have nominally left, while video stays on at the room and
/// team level so non-participants still see who is present.
#[must_use]
pub fn compute_groups(
    local_user: &User,
    remote_users: &BTreeMap<UserId, User>,
    team_talk: &TeamTalk,
    private_talk: &PrivateTalk,
) -> Groups {
    let mut pool: BTreeSet<UserId> = remote_users.keys().copied().collect();
    pool.insert(local_user.id);

    // A user listed in several teams is subtracted from the pool once per
    // team and ends up in every listing team's group, never in main.
    let local_in_any_team = team_talk.started
        && team_talk
            .teams
            .values()
            .any(|team| team.member_ids.contains(&local_user.id));

    let mut team_groups: Vec<(TeamId, Group)> = Vec::new();
    if team_talk.started {
        for (team_id, team) in &team_talk.teams {
            for member in &team.member_ids {
                pool.remove(member);
            }

            let is_member = team.member_ids.contains(&local_user.id);
            let (audio_available, video_available) = match local_user.role {
                Role::Student => (is_member, is_member),
                // A teacher sees every team; an unassigned teacher also
                // hears every team.
                Role::Teacher => (if local_in_any_team { is_member } else { true }, true),
            };

            team_groups.push((
                *team_id,
                Group {
                    member_ids: team.member_ids.clone(),
                    audio_available,
                    video_available,
                },
            ));
        }
    }

    let mut main = match local_user.role {
        Role::Student => Group {
            member_ids: pool,
            audio_available: !local_in_any_team,
            video_available: !local_in_any_team,
        },
        Role::Teacher => Group {
            member_ids: pool,
            audio_available: !local_in_any_team,
            video_available: true,
        },
    };

    let private_group = if private_talk.started {
        // Private talk is audio-exclusive: force audio off everywhere
        // else, leave video untouched.
        main.audio_available = false;
        for (_, group) in &mut team_groups {
            group.audio_available = false;
        }

        Some(Group {
            member_ids: private_talk.member_ids.clone(),
            audio_available: private_talk.member_ids.contains(&local_user.id),
            video_available: false,
        })
    } else {
        None
    };

    Groups {
        main,
        team_groups,
        private_group,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::membership::Team;

    fn user(id: u64, role: Role) -> User {
        User::new(UserId(id), role)
    }

    fn remote_students(ids: &[u64]) -> BTreeMap<UserId, User> {
        ids.iter()
            .map(|id| (UserId(*id), user(*id, Role::Student)))
            .collect()
    }

    fn team(id: u32, members: &[u64]) -> Team {
        Team::new(TeamId(id), format!("team-{id}"), "#808080")
            .with_members(members.iter().copied().map(UserId))
    }

    fn team_talk(started: bool, teams: Vec<Team>) -> TeamTalk {
        let mut talk = TeamTalk::default();
        for t in teams {
            talk = talk.with_team(t).unwrap();
        }
        if started {
            talk = talk.started();
        }
        talk
    }

    fn private_talk(started: bool, members: &[u64]) -> PrivateTalk {
        let mut talk = PrivateTalk::default();
        for id in members {
            talk = talk.with_member(UserId(*id));
        }
        if started {
            talk = talk.started();
        }
        talk
    }

    /// Every classroom user must land in exactly one of main/team groups.
    fn assert_partition_complete(groups: &Groups, all_users: &[u64]) {
        for id in all_users {
            let id = UserId(*id);
            let in_main = groups.main.member_ids.contains(&id);
            let team_count = groups
                .team_groups
                .iter()
                .filter(|(_, g)| g.member_ids.contains(&id))
                .count();

            assert!(
                in_main || team_count > 0,
                "user {id} not placed in any group"
            );
            assert!(
                !(in_main && team_count > 0),
                "user {id} placed in main and a team group"
            );
        }
    }

    #[test]
    fn test_whole_class_when_no_modes_active() {
        let local = user(1, Role::Student);
        let remote = remote_students(&[2, 3, 4]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(false, vec![]),
            &private_talk(false, &[]),
        );

        assert_eq!(groups.main.member_ids.len(), 4);
        assert!(groups.main.audio_available);
        assert!(groups.main.video_available);
        assert!(groups.team_groups.is_empty());
        assert!(groups.private_group.is_none());
    }

    #[test]
    fn test_empty_remote_set() {
        let local = user(1, Role::Teacher);

        let groups = compute_groups(
            &local,
            &BTreeMap::new(),
            &team_talk(false, vec![]),
            &private_talk(false, &[]),
        );

        assert_eq!(
            groups.main.member_ids,
            BTreeSet::from([UserId(1)]),
            "local user alone still forms the main group"
        );
        assert!(groups.main.audio_available);
    }

    #[test]
    fn test_teams_without_team_talk_have_no_effect() {
        let local = user(1, Role::Student);
        let remote = remote_students(&[2, 3]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(false, vec![team(1, &[1, 2])]),
            &private_talk(false, &[]),
        );

        assert!(groups.team_groups.is_empty());
        assert_eq!(groups.main.member_ids.len(), 3);
        assert!(groups.main.audio_available);
    }

    #[test]
    fn test_student_in_team_hears_own_team_only() {
        let local = user(2, Role::Student);
        let remote = remote_students(&[3, 4, 5]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(1, &[2, 3]), team(2, &[4, 5])]),
            &private_talk(false, &[]),
        );

        let own = groups.get(GroupKey::Team(TeamId(1))).unwrap();
        assert!(own.audio_available);
        assert!(own.video_available);

        let other = groups.get(GroupKey::Team(TeamId(2))).unwrap();
        assert!(!other.audio_available);
        assert!(!other.video_available);

        // Absorbed into a team, so the student lost main availability.
        assert!(!groups.main.audio_available);
        assert!(!groups.main.video_available);
        assert_partition_complete(&groups, &[2, 3, 4, 5]);
    }

    /// Four students in two teams, team talk on: the unassigned teacher
    /// hears and sees every team, and main retains audio and video.
    #[test]
    fn test_unassigned_teacher_hears_and_sees_every_team() {
        let local = user(1, Role::Teacher);
        let remote = remote_students(&[2, 3, 4, 5]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(1, &[2, 3]), team(2, &[4, 5])]),
            &private_talk(false, &[]),
        );

        assert_eq!(groups.team_groups.len(), 2);
        for (_, group) in &groups.team_groups {
            assert!(group.audio_available);
            assert!(group.video_available);
            assert_eq!(group.member_ids.len(), 2);
        }

        // All students absorbed into teams; only the teacher remains.
        assert_eq!(groups.main.member_ids, BTreeSet::from([UserId(1)]));
        assert!(groups.main.audio_available);
        assert!(groups.main.video_available);
        assert_partition_complete(&groups, &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_assigned_teacher_hears_own_team_only_but_sees_all() {
        let local = user(1, Role::Teacher);
        let remote = remote_students(&[2, 3, 4, 5]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(1, &[1, 2, 3]), team(2, &[4, 5])]),
            &private_talk(false, &[]),
        );

        let own = groups.get(GroupKey::Team(TeamId(1))).unwrap();
        assert!(own.audio_available);
        assert!(own.video_available);

        let other = groups.get(GroupKey::Team(TeamId(2))).unwrap();
        assert!(!other.audio_available, "assigned teacher hears only own team");
        assert!(other.video_available, "teacher always sees every team");

        assert!(!groups.main.audio_available);
        assert!(groups.main.video_available);
    }

    /// A student's own team goes silent while a private talk runs with
    /// that team's members; the private group carries the audio.
    #[test]
    fn test_private_talk_dominates_team_audio() {
        let local = user(2, Role::Student);
        let remote = remote_students(&[3, 4, 5]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(1, &[2, 3]), team(2, &[4, 5])]),
            &private_talk(true, &[2, 3]),
        );

        let own_team = groups.get(GroupKey::Team(TeamId(1))).unwrap();
        assert!(!own_team.audio_available);
        assert!(own_team.video_available, "video untouched by private talk");

        assert!(!groups.main.audio_available);

        let private = groups.private_group.as_ref().unwrap();
        assert!(private.audio_available);
        assert!(!private.video_available);
        assert_eq!(private.member_ids, BTreeSet::from([UserId(2), UserId(3)]));
    }

    #[test]
    fn test_private_talk_excludes_non_members_audio() {
        let local = user(4, Role::Student);
        let remote = remote_students(&[2, 3, 5]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(false, vec![]),
            &private_talk(true, &[2, 3]),
        );

        assert!(!groups.main.audio_available);
        assert!(groups.main.video_available, "non-member keeps room video");

        let private = groups.private_group.as_ref().unwrap();
        assert!(!private.audio_available);
    }

    #[test]
    fn test_private_talk_with_single_member() {
        let local = user(1, Role::Student);
        let remote = remote_students(&[2]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(false, vec![]),
            &private_talk(true, &[1]),
        );

        let private = groups.private_group.as_ref().unwrap();
        assert_eq!(private.member_ids.len(), 1);
        assert!(private.audio_available);
    }

    #[test]
    fn test_team_talk_stopping_leaves_private_talk_active() {
        let local = user(1, Role::Student);
        let remote = remote_students(&[2, 3]);
        let private = private_talk(true, &[1, 2]);

        let during = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(1, &[1, 2])]),
            &private,
        );
        assert!(during.private_group.is_some());

        let after = compute_groups(&local, &remote, &team_talk(false, vec![]), &private);

        assert!(after.team_groups.is_empty());
        assert!(!after.main.audio_available, "private talk still dominates");
        assert_eq!(after.private_group, during.private_group);
    }

    #[test]
    fn test_zero_member_team_forms_empty_group() {
        let local = user(1, Role::Teacher);
        let remote = remote_students(&[2]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(1, &[])]),
            &private_talk(false, &[]),
        );

        let empty = groups.get(GroupKey::Team(TeamId(1))).unwrap();
        assert!(empty.member_ids.is_empty());
        assert_eq!(groups.main.member_ids.len(), 2);
    }

    /// Membership is expected to be disjoint, but the partition must stay
    /// safe if a user was added to two teams upstream: they appear in
    /// both team groups and never in main.
    #[test]
    fn test_user_in_two_teams_leaves_main_only_once() {
        let local = user(1, Role::Teacher);
        let remote = remote_students(&[2, 3]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(1, &[2]), team(2, &[2, 3])]),
            &private_talk(false, &[]),
        );

        assert!(!groups.main.member_ids.contains(&UserId(2)));
        let listing_teams = groups
            .team_groups
            .iter()
            .filter(|(_, g)| g.member_ids.contains(&UserId(2)))
            .count();
        assert_eq!(listing_teams, 2);
    }

    #[test]
    fn test_idempotence() {
        let local = user(2, Role::Student);
        let remote = remote_students(&[3, 4, 5]);
        let teams = team_talk(true, vec![team(1, &[2, 3]), team(2, &[4, 5])]);
        let private = private_talk(true, &[2, 3]);

        let first = compute_groups(&local, &remote, &teams, &private);
        let second = compute_groups(&local, &remote, &teams, &private);

        assert_eq!(first, second);
    }

    #[test]
    fn test_team_groups_ordered_by_id() {
        let local = user(1, Role::Teacher);
        let remote = remote_students(&[2, 3, 4]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(7, &[2]), team(3, &[3]), team(5, &[4])]),
            &private_talk(false, &[]),
        );

        let ids: Vec<TeamId> = groups.team_groups.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![TeamId(3), TeamId(5), TeamId(7)]);
    }

    #[test]
    fn test_entries_yields_main_teams_private_in_order() {
        let local = user(1, Role::Teacher);
        let remote = remote_students(&[2, 3]);

        let groups = compute_groups(
            &local,
            &remote,
            &team_talk(true, vec![team(1, &[2])]),
            &private_talk(true, &[2, 3]),
        );

        let keys: Vec<GroupKey> = groups.entries().map(|(key, _)| key).collect();
        assert_eq!(
            keys,
            vec![GroupKey::Main, GroupKey::Team(TeamId(1)), GroupKey::Private]
        );
    }
}
