//! `ClassroomActor` - owns membership state and drives reconciliation.
//!
//! The actor is the single caller of the provider. Every mailbox message
//! is handled to completion before the next one, so provider operations
//! never interleave. Before reconciling, the actor drains messages that
//! are already queued and applies their state effects first: a burst of
//! membership events coalesces into one reconcile carrying the latest
//! partition (latest-wins by coalescing).

use crate::contract::{AudioVideo, VideoSink};
use crate::errors::{AvError, ClassroomError};

use super::messages::{ClassroomMessage, ClassroomSnapshot, Responder};

use classroom_protocol::membership::{
    ClassroomState, MembershipError, PrivateTalk, Team, TeamTalk, User,
};
use classroom_protocol::partition::{compute_groups, Groups};
use classroom_protocol::wire::{GroupsSnapshot, SignalingEvent};
use common::config::Config;
use common::types::{TeamId, UserId};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Buffer size for the outbound groups broadcast channel.
const BROADCAST_BUFFER: usize = 32;

/// Handle to a `ClassroomActor`.
#[derive(Clone)]
pub struct ClassroomHandle {
    sender: mpsc::Sender<ClassroomMessage>,
    cancel_token: CancellationToken,
}

impl ClassroomHandle {
    async fn send(&self, message: ClassroomMessage) -> Result<(), ClassroomError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| ClassroomError::Internal(format!("channel send failed: {e}")))
    }

    async fn request<T>(
        &self,
        message: ClassroomMessage,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, ClassroomError> {
        self.send(message).await?;
        rx.await
            .map_err(|e| ClassroomError::Internal(format!("response receive failed: {e}")))
    }

    /// Initialize the provider and join the main session. Returns the
    /// local participant's provider-level identity.
    pub async fn join(&self) -> Result<String, ClassroomError> {
        let (tx, rx) = oneshot::channel();
        let result = self.request(ClassroomMessage::Join { respond_to: tx }, rx).await?;
        result.map_err(ClassroomError::Av)
    }

    /// Release every provider session without stopping the actor.
    pub async fn leave(&self) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(ClassroomMessage::Leave { respond_to: tx }, rx).await
    }

    /// Feed an inbound signaling event into the actor.
    pub async fn signal(&self, event: SignalingEvent) -> Result<(), ClassroomError> {
        self.send(ClassroomMessage::Signal { event }).await
    }

    /// Create a team.
    pub async fn create_team(
        &self,
        team_id: TeamId,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::CreateTeam {
                team_id,
                name: name.into(),
                color: color.into(),
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Delete a team.
    pub async fn delete_team(&self, team_id: TeamId) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::DeleteTeam {
                team_id,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Add a user to a team.
    pub async fn add_user_to_team(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::AddUserToTeam {
                team_id,
                user_id,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Remove a user from a team.
    pub async fn remove_user_from_team(
        &self,
        team_id: TeamId,
        user_id: UserId,
    ) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::RemoveUserFromTeam {
                team_id,
                user_id,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Move a user between teams.
    pub async fn move_user_between_teams(
        &self,
        from: TeamId,
        to: TeamId,
        user_id: UserId,
    ) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::MoveUserBetweenTeams {
                from,
                to,
                user_id,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Merge one team into another.
    pub async fn merge_teams(&self, from: TeamId, to: TeamId) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::MergeTeams {
                from,
                to,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Start or stop team talk.
    pub async fn set_team_talk_started(&self, started: bool) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::SetTeamTalkStarted {
                started,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Start or stop the private talk.
    pub async fn set_private_talk_started(&self, started: bool) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::SetPrivateTalkStarted {
                started,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Add a user to the private talk.
    pub async fn add_user_to_private_talk(&self, user_id: UserId) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::AddUserToPrivateTalk {
                user_id,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Remove a user from the private talk.
    pub async fn remove_user_from_private_talk(
        &self,
        user_id: UserId,
    ) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(
            ClassroomMessage::RemoveUserFromPrivateTalk {
                user_id,
                respond_to: tx,
            },
            rx,
        )
        .await?
    }

    /// Toggle the local microphone in every held session.
    pub async fn set_local_audio(&self, on: bool) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        let result = self
            .request(ClassroomMessage::SetLocalAudio { on, respond_to: tx }, rx)
            .await?;
        result.map_err(ClassroomError::Av)
    }

    /// Toggle the local camera in every held session.
    pub async fn set_local_video(&self, on: bool) -> Result<(), ClassroomError> {
        let (tx, rx) = oneshot::channel();
        let result = self
            .request(ClassroomMessage::SetLocalVideo { on, respond_to: tx }, rx)
            .await?;
        result.map_err(ClassroomError::Av)
    }

    /// Attach the self-view render target.
    pub async fn bind_local_video_sink(&self, sink: VideoSink) -> Result<(), ClassroomError> {
        self.send(ClassroomMessage::BindLocalVideoSink { sink }).await
    }

    /// Detach the self-view render target.
    pub async fn unbind_local_video_sink(&self) -> Result<(), ClassroomError> {
        self.send(ClassroomMessage::UnbindLocalVideoSink).await
    }

    /// Attach a remote user's render target.
    pub async fn bind_remote_video_sink(
        &self,
        user_id: UserId,
        sink: VideoSink,
    ) -> Result<(), ClassroomError> {
        self.send(ClassroomMessage::BindRemoteVideoSink { user_id, sink })
            .await
    }

    /// Detach a remote user's render target.
    pub async fn unbind_remote_video_sink(&self, user_id: UserId) -> Result<(), ClassroomError> {
        self.send(ClassroomMessage::UnbindRemoteVideoSink { user_id })
            .await
    }

    /// Re-enable hearing a specific user.
    pub async fn subscribe_user_audio_locally(
        &self,
        user_id: UserId,
    ) -> Result<(), ClassroomError> {
        self.send(ClassroomMessage::SubscribeUserAudio { user_id })
            .await
    }

    /// Stop hearing a specific user.
    pub async fn unsubscribe_user_audio_locally(
        &self,
        user_id: UserId,
    ) -> Result<(), ClassroomError> {
        self.send(ClassroomMessage::UnsubscribeUserAudio { user_id })
            .await
    }

    /// Get a point-in-time view of the classroom.
    pub async fn state(&self) -> Result<ClassroomSnapshot, ClassroomError> {
        let (tx, rx) = oneshot::channel();
        self.request(ClassroomMessage::GetState { respond_to: tx }, rx)
            .await
    }

    /// Cancel the actor; it releases every session and stops.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check whether the actor was cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

/// What a batch of handled messages changed.
#[derive(Default)]
struct BatchOutcome {
    /// Membership state changed; the partition must be recomputed.
    membership_changed: bool,
    /// At least one change was initiated locally; the resulting
    /// partition is broadcast for the other clients.
    local_origin: bool,
}

/// The `ClassroomActor` implementation.
pub struct ClassroomActor {
    state: ClassroomState,
    provider: Box<dyn AudioVideo>,
    receiver: mpsc::Receiver<ClassroomMessage>,
    cancel_token: CancellationToken,
    broadcast_tx: mpsc::Sender<GroupsSnapshot>,
    /// Last partition successfully applied to the provider. Cleared on a
    /// failed reconcile so the next membership change re-applies.
    last_groups: Option<Groups>,
    joined: bool,
    audio_on: bool,
    video_on: bool,
}

impl ClassroomActor {
    /// Spawn a classroom actor.
    ///
    /// Returns the handle, the task join handle, and the receiver for
    /// outbound partition broadcasts.
    pub fn spawn(
        local_user: User,
        provider: Box<dyn AudioVideo>,
        config: &Config,
        cancel_token: CancellationToken,
    ) -> (
        ClassroomHandle,
        JoinHandle<()>,
        mpsc::Receiver<GroupsSnapshot>,
    ) {
        let (sender, receiver) = mpsc::channel(config.mailbox_buffer);
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_BUFFER);

        let actor = Self {
            state: ClassroomState::new(local_user),
            provider,
            receiver,
            cancel_token: cancel_token.clone(),
            broadcast_tx,
            last_groups: None,
            joined: false,
            audio_on: config.default_audio_on,
            video_on: config.default_video_on,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = ClassroomHandle {
            sender,
            cancel_token,
        };

        (handle, task_handle, broadcast_rx)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "av.classroom", fields(user_id = %self.state.local_user.id))]
    async fn run(mut self) {
        info!(target: "av.classroom", "classroom actor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "av.classroom", "classroom actor cancelled");
                    self.provider.leave().await;
                    break;
                }

                message = self.receiver.recv() => {
                    match message {
                        Some(message) => self.handle_batch(message).await,
                        None => {
                            self.provider.leave().await;
                            break;
                        }
                    }
                }
            }
        }

        info!(target: "av.classroom", "classroom actor stopped");
    }

    /// Handle one message plus everything already queued behind it, then
    /// reconcile once if membership changed.
    ///
    /// State requests are answered after the batch's reconcile so callers
    /// always observe converged state.
    async fn handle_batch(&mut self, first: ClassroomMessage) {
        let mut outcome = BatchOutcome::default();
        let mut state_requests = Vec::new();
        self.handle_message(first, &mut outcome, &mut state_requests).await;

        while let Ok(message) = self.receiver.try_recv() {
            self.handle_message(message, &mut outcome, &mut state_requests)
                .await;
        }

        if outcome.membership_changed {
            self.reconcile_partition(outcome.local_origin).await;
        }

        for respond_to in state_requests {
            let _ = respond_to.send(self.snapshot());
        }
    }

    fn snapshot(&self) -> ClassroomSnapshot {
        ClassroomSnapshot {
            state: self.state.clone(),
            groups: self.last_groups.clone(),
            joined: self.joined,
            local_attendee_id: self.provider.local_attendee_id().map(str::to_string),
            audio_on: self.audio_on,
            video_on: self.video_on,
        }
    }

    async fn handle_message(
        &mut self,
        message: ClassroomMessage,
        outcome: &mut BatchOutcome,
        state_requests: &mut Vec<oneshot::Sender<ClassroomSnapshot>>,
    ) {
        match message {
            ClassroomMessage::Join { respond_to } => {
                let result = self.join_provider().await;
                if result.is_ok() {
                    // Converge onto the current membership right away.
                    outcome.membership_changed = true;
                }
                let _ = respond_to.send(result);
            }

            ClassroomMessage::Leave { respond_to } => {
                self.provider.leave().await;
                self.joined = false;
                self.last_groups = None;
                let _ = respond_to.send(());
            }

            ClassroomMessage::Signal { event } => {
                self.apply_signal(event, outcome);
            }

            ClassroomMessage::CreateTeam {
                team_id,
                name,
                color,
                respond_to,
            } => {
                let result = self.state.team_talk.with_team(Team::new(team_id, name, color));
                self.respond_team_talk(result, respond_to, outcome);
            }

            ClassroomMessage::DeleteTeam {
                team_id,
                respond_to,
            } => {
                let result = Ok(self.state.team_talk.without_team(team_id));
                self.respond_team_talk(result, respond_to, outcome);
            }

            ClassroomMessage::AddUserToTeam {
                team_id,
                user_id,
                respond_to,
            } => {
                let result = self.state.team_talk.with_team_member(team_id, user_id);
                self.respond_team_talk(result, respond_to, outcome);
            }

            ClassroomMessage::RemoveUserFromTeam {
                team_id,
                user_id,
                respond_to,
            } => {
                let result = self.state.team_talk.without_team_member(team_id, user_id);
                self.respond_team_talk(result, respond_to, outcome);
            }

            ClassroomMessage::MoveUserBetweenTeams {
                from,
                to,
                user_id,
                respond_to,
            } => {
                let result = self.state.team_talk.with_member_moved(from, to, user_id);
                self.respond_team_talk(result, respond_to, outcome);
            }

            ClassroomMessage::MergeTeams {
                from,
                to,
                respond_to,
            } => {
                let result = self.state.team_talk.with_teams_merged(from, to);
                self.respond_team_talk(result, respond_to, outcome);
            }

            ClassroomMessage::SetTeamTalkStarted {
                started,
                respond_to,
            } => {
                let team_talk = if started {
                    self.state.team_talk.started()
                } else {
                    self.state.team_talk.stopped()
                };
                self.respond_team_talk(Ok(team_talk), respond_to, outcome);
            }

            ClassroomMessage::SetPrivateTalkStarted {
                started,
                respond_to,
            } => {
                let private_talk = if started {
                    self.state.private_talk.started()
                } else {
                    self.state.private_talk.stopped()
                };
                self.respond_private_talk(private_talk, respond_to, outcome);
            }

            ClassroomMessage::AddUserToPrivateTalk {
                user_id,
                respond_to,
            } => {
                let private_talk = self.state.private_talk.with_member(user_id);
                self.respond_private_talk(private_talk, respond_to, outcome);
            }

            ClassroomMessage::RemoveUserFromPrivateTalk {
                user_id,
                respond_to,
            } => {
                let private_talk = self.state.private_talk.without_member(user_id);
                self.respond_private_talk(private_talk, respond_to, outcome);
            }

            ClassroomMessage::SetLocalAudio { on, respond_to } => {
                let result = self.provider.set_local_audio(on).await;
                if result.is_ok() {
                    self.audio_on = on;
                }
                let _ = respond_to.send(result);
            }

            ClassroomMessage::SetLocalVideo { on, respond_to } => {
                let result = self.provider.set_local_video(on).await;
                if result.is_ok() {
                    self.video_on = on;
                }
                let _ = respond_to.send(result);
            }

            ClassroomMessage::BindLocalVideoSink { sink } => {
                if let Err(err) = self.provider.bind_local_video_sink(sink).await {
                    warn!(target: "av.classroom", error = %err, "local sink bind failed");
                }
            }

            ClassroomMessage::UnbindLocalVideoSink => {
                if let Err(err) = self.provider.unbind_local_video_sink().await {
                    warn!(target: "av.classroom", error = %err, "local sink unbind failed");
                }
            }

            ClassroomMessage::BindRemoteVideoSink { user_id, sink } => {
                if let Err(err) = self.provider.bind_remote_video_sink(user_id, sink).await {
                    warn!(target: "av.classroom", user_id = %user_id, error = %err, "remote sink bind failed");
                }
            }

            ClassroomMessage::UnbindRemoteVideoSink { user_id } => {
                if let Err(err) = self.provider.unbind_remote_video_sink(user_id).await {
                    warn!(target: "av.classroom", user_id = %user_id, error = %err, "remote sink unbind failed");
                }
            }

            ClassroomMessage::SubscribeUserAudio { user_id } => {
                if let Err(err) = self.provider.subscribe_user_audio_locally(user_id).await {
                    warn!(target: "av.classroom", user_id = %user_id, error = %err, "audio subscribe failed");
                }
            }

            ClassroomMessage::UnsubscribeUserAudio { user_id } => {
                if let Err(err) = self.provider.unsubscribe_user_audio_locally(user_id).await {
                    warn!(target: "av.classroom", user_id = %user_id, error = %err, "audio unsubscribe failed");
                }
            }

            ClassroomMessage::GetState { respond_to } => {
                state_requests.push(respond_to);
            }
        }
    }

    async fn join_provider(&mut self) -> Result<String, AvError> {
        self.provider.init().await?;
        let attendee_id = self.provider.join().await?;
        self.joined = true;
        Ok(attendee_id)
    }

    /// Apply a local team-talk update and reply to the caller.
    fn respond_team_talk(
        &mut self,
        result: Result<TeamTalk, MembershipError>,
        respond_to: Responder,
        outcome: &mut BatchOutcome,
    ) {
        let reply = match result {
            Ok(team_talk) => {
                let mut state = self.state.clone();
                state.team_talk = team_talk;
                self.state = state;
                outcome.membership_changed = true;
                outcome.local_origin = true;
                Ok(())
            }
            Err(err) => Err(ClassroomError::Membership(err)),
        };
        let _ = respond_to.send(reply);
    }

    /// Apply a local private-talk update and reply to the caller.
    fn respond_private_talk(
        &mut self,
        private_talk: PrivateTalk,
        respond_to: Responder,
        outcome: &mut BatchOutcome,
    ) {
        let mut state = self.state.clone();
        state.private_talk = private_talk;
        self.state = state;
        outcome.membership_changed = true;
        outcome.local_origin = true;
        let _ = respond_to.send(Ok(()));
    }

    /// Apply an inbound signaling event. Signaling-applied changes are
    /// never re-broadcast.
    fn apply_signal(&mut self, event: SignalingEvent, outcome: &mut BatchOutcome) {
        match event {
            SignalingEvent::TeamTalkChanged { started, teams } => {
                let mut team_talk = self.state.team_talk.clone();
                if let Some(teams) = teams {
                    team_talk.teams = teams.into_iter().map(|team| (team.id, team)).collect();
                }
                team_talk.started = started;

                let mut state = self.state.clone();
                state.team_talk = team_talk;
                self.state = state;
                outcome.membership_changed = true;
            }

            SignalingEvent::PrivateTalkChanged { started } => {
                let private_talk = if started {
                    self.state.private_talk.started()
                } else {
                    self.state.private_talk.stopped()
                };
                let mut state = self.state.clone();
                state.private_talk = private_talk;
                self.state = state;
                outcome.membership_changed = true;
            }

            SignalingEvent::UserAddedToPrivateTalk { user_id } => {
                let mut state = self.state.clone();
                state.private_talk = state.private_talk.with_member(user_id);
                self.state = state;
                outcome.membership_changed = true;
            }

            SignalingEvent::UserRemovedFromPrivateTalk { user_id } => {
                let mut state = self.state.clone();
                state.private_talk = state.private_talk.without_member(user_id);
                self.state = state;
                outcome.membership_changed = true;
            }

            SignalingEvent::UserJoined { user } => {
                if user.id == self.state.local_user.id {
                    return;
                }
                self.state = self.state.with_remote_user(user);
                outcome.membership_changed = true;
            }

            SignalingEvent::UserLeft { user_id } => {
                self.state = self.state.without_remote_user(user_id);
                outcome.membership_changed = true;
            }

            SignalingEvent::UserConnectionStateChanged {
                user_id,
                connection,
            } => match self.state.with_remote_connection(user_id, connection) {
                Ok(state) => {
                    self.state = state;
                    outcome.membership_changed = true;
                }
                Err(err) => {
                    warn!(target: "av.classroom", error = %err, "connection state change for unknown user");
                }
            },
        }
    }

    /// Recompute the partition and converge the provider onto it.
    ///
    /// Equality-gated: an unchanged partition is not re-applied and not
    /// re-broadcast.
    async fn reconcile_partition(&mut self, broadcast: bool) {
        if !self.joined {
            return;
        }

        let groups = compute_groups(
            &self.state.local_user,
            &self.state.remote_users,
            &self.state.team_talk,
            &self.state.private_talk,
        );

        if self.last_groups.as_ref() == Some(&groups) {
            return;
        }

        match self.provider.reconcile(&groups).await {
            Ok(()) => {
                self.last_groups = Some(groups.clone());
            }
            Err(err) => {
                // Converged sessions are preserved; the failed groups are
                // retried on the next membership change.
                warn!(target: "av.classroom", error = %err, "reconcile failed");
                self.last_groups = None;
            }
        }

        if broadcast {
            if let Err(err) = self.broadcast_tx.try_send(GroupsSnapshot::from(&groups)) {
                warn!(target: "av.classroom", error = %err, "groups broadcast dropped");
            }
        }
    }
}
