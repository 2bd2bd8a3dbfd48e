//! Classroom actor integration tests.
//!
//! These exercise the full path: signaling events and local commands go
//! through the actor mailbox, the partition is recomputed, and the mock
//! backend shows what the provider converged to.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use av_controller::{ClassroomActor, ClassroomHandle, Reconciler, VideoSink};
use av_test_utils::{init_test_tracing, test_config, MockBackend, TEST_ROOM};
use classroom_protocol::membership::{Role, Team, User};
use classroom_protocol::wire::{GroupsSnapshot, SignalingEvent};
use common::types::{TeamId, UserId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

fn spawn_classroom(
    backend: &MockBackend,
    local_user: User,
) -> (
    ClassroomHandle,
    JoinHandle<()>,
    mpsc::Receiver<GroupsSnapshot>,
    CancellationToken,
) {
    let config = test_config();
    let provider = Box::new(Reconciler::new(backend.clone(), &config, local_user.id));
    let cancel_token = CancellationToken::new();
    let (handle, task, broadcast_rx) =
        ClassroomActor::spawn(local_user, provider, &config, cancel_token.clone());
    (handle, task, broadcast_rx, cancel_token)
}

/// Wait for every previously sent message (and its reconcile) to be
/// processed by round-tripping a state request.
async fn sync(handle: &ClassroomHandle) -> av_controller::ClassroomSnapshot {
    handle.state().await.unwrap()
}

async fn join_with_students(handle: &ClassroomHandle, student_ids: &[u64]) {
    handle.join().await.unwrap();
    for id in student_ids {
        handle
            .signal(SignalingEvent::UserJoined {
                user: User::new(UserId(*id), Role::Student),
            })
            .await
            .unwrap();
    }
    sync(handle).await;
}

#[tokio::test]
async fn test_team_talk_setup_converges_provider() {
    init_test_tracing();
    let backend = MockBackend::new();
    let (handle, _task, mut broadcast_rx, _cancel) =
        spawn_classroom(&backend, User::new(UserId(1), Role::Teacher));

    join_with_students(&handle, &[2, 3, 4, 5]).await;

    handle.create_team(TeamId(1), "Red", "#ff0000").await.unwrap();
    handle.add_user_to_team(TeamId(1), UserId(2)).await.unwrap();
    handle.add_user_to_team(TeamId(1), UserId(3)).await.unwrap();
    handle.create_team(TeamId(2), "Blue", "#0000ff").await.unwrap();
    handle.add_user_to_team(TeamId(2), UserId(4)).await.unwrap();
    handle.add_user_to_team(TeamId(2), UserId(5)).await.unwrap();
    handle.set_team_talk_started(true).await.unwrap();

    let snapshot = sync(&handle).await;
    let groups = snapshot.groups.expect("partition applied");
    assert_eq!(groups.team_groups.len(), 2);
    assert_eq!(
        groups.main.member_ids.iter().copied().collect::<Vec<_>>(),
        vec![UserId(1)],
        "students absorbed into teams"
    );
    assert!(groups.main.audio_available, "teacher unassigned");

    // The provider holds one session per group.
    assert_eq!(
        backend.live_rooms(),
        vec![
            "class-101".to_string(),
            "class-101/team-1".to_string(),
            "class-101/team-2".to_string(),
        ]
    );
    let team_one = backend.session("class-101/team-1").unwrap();
    assert!(team_one.audio_playback());
    assert!(team_one.video_playback());

    // Roster edits before team talk never changed the partition, so the
    // one broadcast carries the team-talk partition.
    let broadcast = broadcast_rx.try_recv().unwrap();
    assert_eq!(broadcast.team_groups.map(|teams| teams.len()), Some(2));
    assert!(broadcast_rx.try_recv().is_err(), "exactly one broadcast");
}

#[tokio::test]
async fn test_signaling_events_are_not_rebroadcast() {
    let backend = MockBackend::new();
    let (handle, _task, mut broadcast_rx, _cancel) =
        spawn_classroom(&backend, User::new(UserId(2), Role::Student));

    join_with_students(&handle, &[3, 4]).await;

    handle
        .signal(SignalingEvent::TeamTalkChanged {
            started: true,
            teams: Some(vec![
                Team::new(TeamId(1), "Red", "#ff0000").with_members([UserId(2), UserId(3)])
            ]),
        })
        .await
        .unwrap();
    let snapshot = sync(&handle).await;

    assert_eq!(snapshot.groups.unwrap().team_groups.len(), 1);
    assert!(
        broadcast_rx.try_recv().is_err(),
        "remote changes are applied, never echoed back"
    );
}

#[tokio::test]
async fn test_private_talk_dominance_end_to_end() {
    let backend = MockBackend::new();
    let (handle, _task, _broadcast_rx, _cancel) =
        spawn_classroom(&backend, User::new(UserId(2), Role::Student));

    join_with_students(&handle, &[3, 4, 5]).await;

    handle
        .signal(SignalingEvent::TeamTalkChanged {
            started: true,
            teams: Some(vec![
                Team::new(TeamId(1), "Red", "#ff0000").with_members([UserId(2), UserId(3)]),
                Team::new(TeamId(2), "Blue", "#0000ff").with_members([UserId(4), UserId(5)]),
            ]),
        })
        .await
        .unwrap();
    sync(&handle).await;

    let own_team = backend.session("class-101/team-1").unwrap();
    assert!(own_team.audio_playback(), "own team audible before private talk");

    handle
        .signal(SignalingEvent::PrivateTalkChanged { started: true })
        .await
        .unwrap();
    handle
        .signal(SignalingEvent::UserAddedToPrivateTalk { user_id: UserId(2) })
        .await
        .unwrap();
    handle
        .signal(SignalingEvent::UserAddedToPrivateTalk { user_id: UserId(3) })
        .await
        .unwrap();
    sync(&handle).await;

    assert!(!own_team.audio_playback(), "private talk silences the team");
    assert!(own_team.video_playback(), "team video stays on");

    let private = backend.session("class-101/private").unwrap();
    assert!(private.audio_playback(), "participant hears the private talk");
    assert!(!private.video_playback(), "private talk is audio-only");
}

#[tokio::test]
async fn test_mode_flips_never_reconnect_team_sessions() {
    let backend = MockBackend::new();
    let (handle, _task, _broadcast_rx, _cancel) =
        spawn_classroom(&backend, User::new(UserId(1), Role::Teacher));

    join_with_students(&handle, &[2, 3, 4, 5]).await;
    handle.create_team(TeamId(1), "Red", "#ff0000").await.unwrap();
    handle.add_user_to_team(TeamId(1), UserId(2)).await.unwrap();
    handle.add_user_to_team(TeamId(1), UserId(3)).await.unwrap();
    handle.set_team_talk_started(true).await.unwrap();
    sync(&handle).await;

    let connects_after_setup = backend.connect_count();
    let team = backend.session("class-101/team-1").unwrap();

    handle.set_private_talk_started(true).await.unwrap();
    handle.add_user_to_private_talk(UserId(2)).await.unwrap();
    handle.add_user_to_private_talk(UserId(3)).await.unwrap();
    sync(&handle).await;

    assert!(!team.audio_playback());
    assert!(!team.closed(), "flag change must not reconnect the team");

    handle.set_private_talk_started(false).await.unwrap();
    sync(&handle).await;

    assert!(team.audio_playback(), "team audio restored");
    assert!(!team.closed());
    assert!(backend.session("class-101/private").unwrap().closed());
    assert_eq!(
        backend.connect_count(),
        connects_after_setup + 1,
        "only the private session ever connected"
    );
}

#[tokio::test]
async fn test_toggles_and_sinks_flow_through_the_actor() {
    let backend = MockBackend::new();
    let (handle, _task, _broadcast_rx, _cancel) =
        spawn_classroom(&backend, User::new(UserId(1), Role::Teacher));

    join_with_students(&handle, &[2]).await;
    handle
        .bind_remote_video_sink(UserId(2), VideoSink::new("tile-2"))
        .await
        .unwrap();
    handle
        .bind_local_video_sink(VideoSink::new("self-view"))
        .await
        .unwrap();
    sync(&handle).await;

    let main = backend.session(TEST_ROOM).unwrap();
    assert_eq!(main.local_sink(), Some(VideoSink::new("self-view")));

    handle.set_local_video(false).await.unwrap();
    let snapshot = sync(&handle).await;
    assert!(!snapshot.video_on);
    assert!(!main.video_published());

    handle.set_local_video(true).await.unwrap();
    sync(&handle).await;
    assert!(main.video_published());

    handle.unsubscribe_user_audio_locally(UserId(2)).await.unwrap();
    sync(&handle).await;
    assert_eq!(main.subscribed(UserId(2)), Some(false));
}

#[tokio::test]
async fn test_leave_releases_sessions_but_keeps_actor_alive() {
    let backend = MockBackend::new();
    let (handle, _task, _broadcast_rx, _cancel) =
        spawn_classroom(&backend, User::new(UserId(1), Role::Teacher));

    join_with_students(&handle, &[2, 3]).await;
    assert!(!backend.live_rooms().is_empty());

    handle.leave().await.unwrap();

    assert!(backend.live_rooms().is_empty());
    let snapshot = sync(&handle).await;
    assert!(!snapshot.joined);
    assert!(snapshot.local_attendee_id.is_none());

    // A second join builds a fresh main session.
    handle.join().await.unwrap();
    let snapshot = sync(&handle).await;
    assert!(snapshot.joined);
    assert!(!backend.live_rooms().is_empty());
}

#[tokio::test]
async fn test_cancellation_tears_everything_down() {
    let backend = MockBackend::new();
    let (handle, task, _broadcast_rx, cancel_token) =
        spawn_classroom(&backend, User::new(UserId(1), Role::Teacher));

    join_with_students(&handle, &[2, 3]).await;
    assert!(!backend.live_rooms().is_empty());

    cancel_token.cancel();
    task.await.unwrap();

    assert!(backend.live_rooms().is_empty(), "cancellation releases all sessions");
}

#[tokio::test]
async fn test_membership_error_is_reported_to_caller() {
    let backend = MockBackend::new();
    let (handle, _task, _broadcast_rx, _cancel) =
        spawn_classroom(&backend, User::new(UserId(1), Role::Teacher));

    handle.join().await.unwrap();

    let result = handle.add_user_to_team(TeamId(9), UserId(2)).await;
    assert!(result.is_err(), "unknown team must be rejected");
}
