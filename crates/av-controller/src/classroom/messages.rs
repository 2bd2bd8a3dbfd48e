//! Message types for the classroom actor.
//!
//! All communication with the actor is strongly-typed message passing
//! over `tokio::sync::mpsc`; request-reply uses `tokio::sync::oneshot`.
//! Sink binds and per-user audio overrides are fire-and-forget: they
//! queue inside the provider until the owning session exists, so there
//! is no meaningful failure to report back.

use crate::contract::VideoSink;
use crate::errors::{AvError, ClassroomError};
use classroom_protocol::membership::ClassroomState;
use classroom_protocol::partition::Groups;
use classroom_protocol::wire::SignalingEvent;
use common::types::{TeamId, UserId};
use tokio::sync::oneshot;

/// Reply channel for roster commands.
pub type Responder = oneshot::Sender<Result<(), ClassroomError>>;

/// Messages sent to the `ClassroomActor`.
#[derive(Debug)]
pub enum ClassroomMessage {
    /// Initialize the provider and join the main session.
    Join {
        respond_to: oneshot::Sender<Result<String, AvError>>,
    },

    /// Release every provider session. The actor stays alive and can
    /// join again.
    Leave { respond_to: oneshot::Sender<()> },

    /// Inbound signaling event from another participant's client.
    Signal { event: SignalingEvent },

    /// Create a team (local command; broadcast on partition change).
    CreateTeam {
        team_id: TeamId,
        name: String,
        color: String,
        respond_to: Responder,
    },

    /// Delete a team.
    DeleteTeam {
        team_id: TeamId,
        respond_to: Responder,
    },

    /// Add a user to a team.
    AddUserToTeam {
        team_id: TeamId,
        user_id: UserId,
        respond_to: Responder,
    },

    /// Remove a user from a team.
    RemoveUserFromTeam {
        team_id: TeamId,
        user_id: UserId,
        respond_to: Responder,
    },

    /// Move a user between teams.
    MoveUserBetweenTeams {
        from: TeamId,
        to: TeamId,
        user_id: UserId,
        respond_to: Responder,
    },

    /// Merge one team into another.
    MergeTeams {
        from: TeamId,
        to: TeamId,
        respond_to: Responder,
    },

    /// Start or stop team talk.
    SetTeamTalkStarted { started: bool, respond_to: Responder },

    /// Start or stop the private talk.
    SetPrivateTalkStarted { started: bool, respond_to: Responder },

    /// Add a user to the private talk.
    AddUserToPrivateTalk {
        user_id: UserId,
        respond_to: Responder,
    },

    /// Remove a user from the private talk.
    RemoveUserFromPrivateTalk {
        user_id: UserId,
        respond_to: Responder,
    },

    /// Toggle the local microphone across every held session.
    SetLocalAudio {
        on: bool,
        respond_to: oneshot::Sender<Result<(), AvError>>,
    },

    /// Toggle the local camera across every held session.
    SetLocalVideo {
        on: bool,
        respond_to: oneshot::Sender<Result<(), AvError>>,
    },

    /// Attach the self-view render target.
    BindLocalVideoSink { sink: VideoSink },

    /// Detach the self-view render target.
    UnbindLocalVideoSink,

    /// Attach a remote user's render target.
    BindRemoteVideoSink { user_id: UserId, sink: VideoSink },

    /// Detach a remote user's render target.
    UnbindRemoteVideoSink { user_id: UserId },

    /// Re-enable hearing a specific user.
    SubscribeUserAudio { user_id: UserId },

    /// Stop hearing a specific user.
    UnsubscribeUserAudio { user_id: UserId },

    /// Get a point-in-time view of the classroom.
    GetState {
        respond_to: oneshot::Sender<ClassroomSnapshot>,
    },
}

/// Point-in-time view of the classroom for UI and debugging.
#[derive(Debug, Clone)]
pub struct ClassroomSnapshot {
    pub state: ClassroomState,
    /// Last partition successfully applied to the provider.
    pub groups: Option<Groups>,
    pub joined: bool,
    pub local_attendee_id: Option<String>,
    pub audio_on: bool,
    pub video_on: bool,
}
