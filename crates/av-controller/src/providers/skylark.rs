//! Skylark Meetings back-end.
//!
//! Skylark models a conference as one meeting per room. Every
//! acquisition mints a fresh attendee for the local user; the meeting
//! session then exposes device-level switches (audio input, video tile,
//! speaker output).

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

/// Skylark Meetings transport.
pub struct SkylarkBackend {
    api_token: SecretString,
}

impl SkylarkBackend {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            api_token: config.provider_token.clone(),
        }
    }
}

#[async_trait]
impl MediaBackend for SkylarkBackend {
    type Session = SkylarkSession;

    fn provider_name(&self) -> &'static str {
        "skylark"
    }

    async fn acquire_credentials(&self, room: &str) -> Result<RoomCredentials, ConnectFailure> {
        if self.api_token.expose_secret().is_empty() {
            return Err(ConnectFailure::Rejected("empty Skylark api token".to_string()));
        }

        tokio::task::yield_now().await;

        let attendee_id = format!("sky-{}", Uuid::new_v4());
        let token = SecretString::from(format!("slk-{}", Uuid::new_v4().simple()));
        debug!(
            target: "av.provider.skylark",
            room,
            attendee_id = %attendee_id,
            "minted meeting credentials"
        );

        Ok(RoomCredentials {
            room: room.to_string(),
            attendee_id,
            token,
        })
    }

    async fn connect(&self, credentials: &RoomCredentials) -> Result<SkylarkSession, JoinFailure> {
        tokio::task::yield_now().await;
        debug!(
            target: "av.provider.skylark",
            room = %credentials.room,
            attendee_id = %credentials.attendee_id,
            "meeting session started"
        );

        Ok(SkylarkSession {
            attendee_id: credentials.attendee_id.clone(),
            room: credentials.room.clone(),
            audio_input_on: false,
            video_tile_on: false,
            output_muted: true,
            video_hidden: true,
            subscribed: BTreeSet::new(),
            local_sink: None,
            remote_sinks: BTreeMap::new(),
            closed: false,
        })
    }
}

/// One Skylark meeting session.
pub struct SkylarkSession {
    attendee_id: String,
    room: String,
    audio_input_on: bool,
    video_tile_on: bool,
    /// Skylark mutes the room by silencing the output device.
    output_muted: bool,
    video_hidden: bool,
    subscribed: BTreeSet<UserId>,
    local_sink: Option<VideoSink>,
    remote_sinks: BTreeMap<UserId, VideoSink>,
    closed: bool,
}

impl SkylarkSession {
    fn guard(&self) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl BackendSession for SkylarkSession {
    fn attendee_id(&self) -> &str {
        &self.attendee_id
    }

    async fn set_audio_published(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.audio_input_on = on;
        debug!(target: "av.provider.skylark", room = %self.room, on, "audio input switched");
        Ok(())
    }

    async fn set_video_published(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.video_tile_on = on;
        debug!(target: "av.provider.skylark", room = %self.room, on, "local video tile switched");
        Ok(())
    }

    async fn set_audio_playback(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.output_muted = !on;
        Ok(())
    }

    async fn set_video_playback(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.video_hidden = !on;
        Ok(())
    }

    async fn set_user_audio_subscribed(
        &mut self,
        user_id: UserId,
        on: bool,
    ) -> Result<(), SessionError> {
        self.guard()?;
        if on {
            self.subscribed.insert(user_id);
        } else {
            self.subscribed.remove(&user_id);
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
        if self.closed {
            return;
        }
        self.closed = true;
        self.local_sink = None;
        self.remote_sinks.clear();
        debug!(target: "av.provider.skylark", room = %self.room, "meeting session stopped");
    }
}
