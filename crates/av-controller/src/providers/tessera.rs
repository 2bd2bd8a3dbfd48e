//! Tessera Video back-end.
//!
//! Tessera rooms are named sessions joined with a session token and
//! passcode. There is no per-user subscription primitive; the SDK
//! exposes a local per-user mute instead, so the subscription switch
//! maps to its inverse.

use crate::backend::{BackendSession, MediaBackend, RoomCredentials};
use crate::contract::VideoSink;
use crate::errors::{ConnectFailure, JoinFailure, SessionError};
use async_trait::async_trait;
use common::config::Config;
use common::secret::{ExposeSecret, SecretString};
use common::types::UserId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use uuid::Uuid;

/// Tessera Video transport.
pub struct TesseraBackend {
    sdk_key: SecretString,
}

impl TesseraBackend {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            sdk_key: config.provider_token.clone(),
        }
    }
}

#[async_trait]
impl MediaBackend for TesseraBackend {
    type Session = TesseraSession;

    fn provider_name(&self) -> &'static str {
        "tessera"
    }

    async fn acquire_credentials(&self, room: &str) -> Result<RoomCredentials, ConnectFailure> {
        if self.sdk_key.expose_secret().is_empty() {
            return Err(ConnectFailure::Rejected("empty Tessera sdk key".to_string()));
        }

        tokio::task::yield_now().await;

        // Tessera issues one signed token per session name; the passcode
        // rides inside it.
        let attendee_id = format!("tsr-{}", Uuid::new_v4().simple());
        let token = SecretString::from(format!("tessera-jwt.{}", Uuid::new_v4().simple()));
        debug!(
            target: "av.provider.tessera",
            session_name = room,
            attendee_id = %attendee_id,
            "issued session token"
        );

        Ok(RoomCredentials {
            room: room.to_string(),
            attendee_id,
            token,
        })
    }

    async fn connect(&self, credentials: &RoomCredentials) -> Result<TesseraSession, JoinFailure> {
        tokio::task::yield_now().await;
        debug!(
            target: "av.provider.tessera",
            session_name = %credentials.room,
            "joined session"
        );

        Ok(TesseraSession {
            attendee_id: credentials.attendee_id.clone(),
            session_name: credentials.room.clone(),
            audio_started: false,
            video_started: false,
            speaker_on: false,
            remote_video_on: false,
            locally_muted: BTreeSet::new(),
            members_seen: BTreeSet::new(),
            local_sink: None,
            remote_sinks: BTreeMap::new(),
            left: false,
        })
    }
}

/// One Tessera session.
pub struct TesseraSession {
    attendee_id: String,
    session_name: String,
    audio_started: bool,
    video_started: bool,
    speaker_on: bool,
    remote_video_on: bool,
    /// Users muted locally; the inverse of the subscription switch.
    locally_muted: BTreeSet<UserId>,
    members_seen: BTreeSet<UserId>,
    local_sink: Option<VideoSink>,
    remote_sinks: BTreeMap<UserId, VideoSink>,
    left: bool,
}

impl TesseraSession {
    fn guard(&self) -> Result<(), SessionError> {
        if self.left {
            return Err(SessionError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl BackendSession for TesseraSession {
    fn attendee_id(&self) -> &str {
        &self.attendee_id
    }

    async fn set_audio_published(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.audio_started = on;
        debug!(
            target: "av.provider.tessera",
            session_name = %self.session_name,
            on,
            "microphone switched"
        );
        Ok(())
    }

    async fn set_video_published(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.video_started = on;
        debug!(
            target: "av.provider.tessera",
            session_name = %self.session_name,
            on,
            "camera switched"
        );
        Ok(())
    }

    async fn set_audio_playback(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.speaker_on = on;
        Ok(())
    }

    async fn set_video_playback(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.remote_video_on = on;
        Ok(())
    }

    async fn set_user_audio_subscribed(
        &mut self,
        user_id: UserId,
        on: bool,
    ) -> Result<(), SessionError> {
        self.guard()?;
        self.members_seen.insert(user_id);
        if on {
            self.locally_muted.remove(&user_id);
        } else {
            self.locally_muted.insert(user_id);
        }
        Ok(())
    }

    async fn bind_local_video_sink(&mut self, sink: VideoSink) -> Result<(), SessionError> {
        self.guard()?;
        self.local_sink = Some(sink);
        Ok(())
    }

    async fn unbind_local_video_sink(&mut self) {
        self.local_sink = None;
    }

    async fn bind_remote_video_sink(
        &mut self,
        user_id: UserId,
        sink: VideoSink,
    ) -> Result<(), SessionError> {
        self.guard()?;
        self.remote_sinks.insert(user_id, sink);
        Ok(())
    }

    async fn unbind_remote_video_sink(&mut self, user_id: UserId) {
        self.remote_sinks.remove(&user_id);
    }

    async fn close(&mut self) {
        if self.left {
            return;
        }
        self.left = true;
        self.local_sink = None;
        self.remote_sinks.clear();
        debug!(
            target: "av.provider.tessera",
            session_name = %self.session_name,
            "left session"
        );
    }
}
