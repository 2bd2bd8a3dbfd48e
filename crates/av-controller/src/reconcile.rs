//! The generic session reconciliation skeleton.
//!
//! [`Reconciler`] implements the full [`AudioVideo`] contract once,
//! generically over a [`MediaBackend`]. It owns every
//! [`ProviderSession`] exclusively and converges them onto each desired
//! partition:
//!
//! - a group with no session gets one created and joined,
//! - a group that persists has its session reconfigured in place (no
//!   reconnect, no visible glitch),
//! - a session whose group disappeared is destroyed.
//!
//! A partial failure never rolls back: sessions that converged stay
//! converged, and the error names exactly the groups that did not.
//!
//! Callers must not issue two `reconcile` calls concurrently; the
//! classroom actor guarantees this by issuing every call from its single
//! task. The reconciler itself holds `&mut self` across each pass, so
//! misuse fails to compile rather than interleaving.

use crate::backend::{MediaBackend, RoomCredentials};
use crate::contract::{AudioVideo, VideoSink};
use crate::errors::{AvError, GroupFailure};
use crate::session::{LocalMediaState, ProviderSession};
use async_trait::async_trait;
use classroom_protocol::partition::{Group, GroupKey, Groups};
use common::config::Config;
use common::types::UserId;
use metrics::{counter, gauge};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Generic reconciler over one vendor backend.
pub struct Reconciler<B: MediaBackend> {
    backend: B,
    /// Classroom room name; breakout room names derive from it.
    room: String,
    local_user: UserId,
    main_credentials: Option<RoomCredentials>,
    local_attendee: Option<String>,
    /// Live sessions by group identity. Exclusively owned; nothing else
    /// may create, mutate, or destroy a session.
    sessions: BTreeMap<GroupKey, ProviderSession<B::Session>>,
    local_audio_on: bool,
    local_video_on: bool,
    /// Desired self-view render target, queued until the main session
    /// exists.
    local_sink: Option<VideoSink>,
    /// Desired remote render targets, queued until the hosting session
    /// exists.
    remote_sinks: BTreeMap<UserId, VideoSink>,
    /// Per-user local audio overrides: members listed here stay silent
    /// even inside an audio-available group.
    muted_users: BTreeSet<UserId>,
}

impl<B: MediaBackend> Reconciler<B> {
    /// Create a reconciler for the configured classroom room.
    pub fn new(backend: B, config: &Config, local_user: UserId) -> Self {
        Self {
            backend,
            room: config.room.clone(),
            local_user,
            main_credentials: None,
            local_attendee: None,
            sessions: BTreeMap::new(),
            local_audio_on: config.default_audio_on,
            local_video_on: config.default_video_on,
            local_sink: None,
            remote_sinks: BTreeMap::new(),
            muted_users: BTreeSet::new(),
        }
    }

    /// Provider room name for a group.
    fn room_name(&self, key: GroupKey) -> String {
        match key {
            GroupKey::Main => self.room.clone(),
            GroupKey::Team(team_id) => format!("{}/team-{team_id}", self.room),
            GroupKey::Private => format!("{}/private", self.room),
        }
    }

    fn local_media(&self) -> LocalMediaState {
        LocalMediaState {
            audio_on: self.local_audio_on,
            video_on: self.local_video_on,
        }
    }

    fn is_joined(&self) -> bool {
        self.sessions.contains_key(&GroupKey::Main)
    }

    fn record_session_count(&self) {
        #[allow(clippy::cast_precision_loss)]
        gauge!("av_active_sessions", "provider" => self.backend.provider_name())
            .set(self.sessions.len() as f64);
    }

    /// Acquire credentials and open one fully configured session.
    ///
    /// Returns the failure as a string so the caller can fold it into a
    /// per-group report without caring which step broke.
    async fn create_session(
        &self,
        key: GroupKey,
        group: &Group,
        local_media: LocalMediaState,
    ) -> Result<ProviderSession<B::Session>, String> {
        let room = self.room_name(key);

        // The main room's credentials were acquired at init; every
        // breakout room mints its own.
        let credentials = match (&self.main_credentials, key) {
            (Some(credentials), GroupKey::Main) => credentials.clone(),
            _ => self
                .backend
                .acquire_credentials(&room)
                .await
                .map_err(|err| err.to_string())?,
        };

        let session = self
            .backend
            .connect(&credentials)
            .await
            .map_err(|err| err.to_string())?;

        let local_sink = match key {
            GroupKey::Main => self.local_sink.as_ref(),
            _ => None,
        };

        ProviderSession::connect_and_activate(
            key,
            session,
            group,
            self.local_user,
            local_media,
            local_sink,
            &self.remote_sinks,
            &self.muted_users,
        )
        .await
        .map_err(|err| err.to_string())
    }

    /// Apply the stored local toggles to every live session.
    async fn apply_toggles(&mut self) -> Result<(), AvError> {
        let media = self.local_media();
        let mut first_error = None;

        for session in self.sessions.values_mut() {
            if let Err(err) = session.apply_local_toggles(media).await {
                warn!(
                    target: "av.reconciler",
                    key = %session.key(),
                    error = %err,
                    "failed to apply local toggle"
                );
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            None => Ok(()),
            Some(err) => Err(AvError::Session(err)),
        }
    }
}

#[async_trait]
impl<B: MediaBackend> AudioVideo for Reconciler<B> {
    async fn init(&mut self) -> Result<(), AvError> {
        if self.main_credentials.is_some() {
            return Ok(());
        }

        let credentials = self.backend.acquire_credentials(&self.room).await?;
        info!(
            target: "av.reconciler",
            provider = self.backend.provider_name(),
            room = %self.room,
            "acquired main room credentials"
        );
        self.main_credentials = Some(credentials);
        Ok(())
    }

    async fn join(&mut self) -> Result<String, AvError> {
        let Some(credentials) = self.main_credentials.clone() else {
            return Err(AvError::InvalidState("join before init"));
        };

        if let Some(existing) = self.sessions.get(&GroupKey::Main) {
            return Ok(existing.attendee_id().to_string());
        }

        let session = self.backend.connect(&credentials).await?;

        // Before the first partition arrives the main session is the
        // whole class: full availability, membership not yet known.
        let whole_class = Group {
            member_ids: BTreeSet::new(),
            audio_available: true,
            video_available: true,
        };

        let record = ProviderSession::connect_and_activate(
            GroupKey::Main,
            session,
            &whole_class,
            self.local_user,
            self.local_media(),
            self.local_sink.as_ref(),
            &self.remote_sinks,
            &self.muted_users,
        )
        .await
        .map_err(AvError::Session)?;

        let attendee_id = record.attendee_id().to_string();
        self.local_attendee = Some(attendee_id.clone());
        self.sessions.insert(GroupKey::Main, record);
        counter!("av_sessions_created_total", "provider" => self.backend.provider_name())
            .increment(1);
        self.record_session_count();

        info!(
            target: "av.reconciler",
            provider = self.backend.provider_name(),
            attendee_id = %attendee_id,
            "joined main session"
        );
        Ok(attendee_id)
    }

    async fn leave(&mut self) {
        let provider = self.backend.provider_name();
        let had_sessions = !self.sessions.is_empty();

        for (_, mut session) in std::mem::take(&mut self.sessions) {
            session.close().await;
            counter!("av_sessions_destroyed_total", "provider" => provider).increment(1);
        }

        self.main_credentials = None;
        self.local_attendee = None;
        self.record_session_count();

        if had_sessions {
            info!(target: "av.reconciler", provider, "left classroom, all sessions released");
        }
    }

    async fn reconcile(&mut self, groups: &Groups) -> Result<(), AvError> {
        if !self.is_joined() {
            return Err(AvError::InvalidState("reconcile before join"));
        }

        let provider = self.backend.provider_name();
        let desired_keys: BTreeSet<GroupKey> = groups.entries().map(|(key, _)| key).collect();

        // Destroy pass: sessions whose group disappeared.
        let stale: Vec<GroupKey> = self
            .sessions
            .keys()
            .copied()
            .filter(|key| !desired_keys.contains(key))
            .collect();
        for key in stale {
            if let Some(mut session) = self.sessions.remove(&key) {
                session.close().await;
                counter!("av_sessions_destroyed_total", "provider" => provider).increment(1);
            }
        }

        // Create/update pass, in partition order. Failures are collected
        // per group; sessions that converged stay converged.
        let local_media = self.local_media();
        let mut failed: Vec<GroupFailure> = Vec::new();

        for (key, group) in groups.entries() {
            if let Some(session) = self.sessions.get_mut(&key) {
                match session
                    .reconfigure(
                        group,
                        self.local_user,
                        local_media,
                        &self.remote_sinks,
                        &self.muted_users,
                    )
                    .await
                {
                    Ok(()) => {
                        counter!("av_sessions_updated_total", "provider" => provider).increment(1);
                    }
                    Err(err) => {
                        warn!(target: "av.reconciler", key = %key, error = %err, "group update failed");
                        failed.push(GroupFailure {
                            key,
                            reason: err.to_string(),
                        });
                    }
                }
            } else {
                match self.create_session(key, group, local_media).await {
                    Ok(record) => {
                        self.sessions.insert(key, record);
                        counter!("av_sessions_created_total", "provider" => provider).increment(1);
                        debug!(target: "av.reconciler", key = %key, "group session created");
                    }
                    Err(reason) => {
                        warn!(target: "av.reconciler", key = %key, reason = %reason, "group session creation failed");
                        failed.push(GroupFailure { key, reason });
                    }
                }
            }
        }

        self.record_session_count();

        if failed.is_empty() {
            Ok(())
        } else {
            counter!("av_reconcile_failures_total", "provider" => provider).increment(1);
            Err(AvError::Reconcile { failed })
        }
    }

    async fn set_local_audio(&mut self, on: bool) -> Result<(), AvError> {
        if !self.is_joined() {
            return Err(AvError::InvalidState("audio toggle before join"));
        }
        self.local_audio_on = on;
        self.apply_toggles().await
    }

    async fn set_local_video(&mut self, on: bool) -> Result<(), AvError> {
        if !self.is_joined() {
            return Err(AvError::InvalidState("video toggle before join"));
        }
        self.local_video_on = on;
        self.apply_toggles().await
    }

    async fn bind_local_video_sink(&mut self, sink: VideoSink) -> Result<(), AvError> {
        self.local_sink = Some(sink.clone());
        if let Some(main) = self.sessions.get_mut(&GroupKey::Main) {
            main.bind_local(sink).await.map_err(AvError::Session)?;
        }
        Ok(())
    }

    async fn unbind_local_video_sink(&mut self) -> Result<(), AvError> {
        self.local_sink = None;
        if let Some(main) = self.sessions.get_mut(&GroupKey::Main) {
            main.unbind_local().await;
        }
        Ok(())
    }

    async fn bind_remote_video_sink(
        &mut self,
        user_id: UserId,
        sink: VideoSink,
    ) -> Result<(), AvError> {
        self.remote_sinks.insert(user_id, sink.clone());
        for session in self.sessions.values_mut() {
            session
                .bind_remote(user_id, sink.clone())
                .await
                .map_err(AvError::Session)?;
        }
        Ok(())
    }

    async fn unbind_remote_video_sink(&mut self, user_id: UserId) -> Result<(), AvError> {
        self.remote_sinks.remove(&user_id);
        for session in self.sessions.values_mut() {
            session.unbind_remote(user_id).await;
        }
        Ok(())
    }

    async fn subscribe_user_audio_locally(&mut self, user_id: UserId) -> Result<(), AvError> {
        self.muted_users.remove(&user_id);
        for session in self.sessions.values_mut() {
            session
                .set_user_subscription(user_id, true)
                .await
                .map_err(AvError::Session)?;
        }
        Ok(())
    }

    async fn unsubscribe_user_audio_locally(&mut self, user_id: UserId) -> Result<(), AvError> {
        self.muted_users.insert(user_id);
        for session in self.sessions.values_mut() {
            session
                .set_user_subscription(user_id, false)
                .await
                .map_err(AvError::Session)?;
        }
        Ok(())
    }

    fn local_attendee_id(&self) -> Option<&str> {
        self.local_attendee.as_deref()
    }
}
