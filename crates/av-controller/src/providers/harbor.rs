//! Harbor RTC back-end.
//!
//! Harbor separates sessions from publishers: joining a session only
//! subscribes, and publishing audio or video means holding a publisher
//! handle minted from a publisher token. Dropping the handle unpublishes.

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

/// Harbor RTC transport.
pub struct HarborBackend {
    project_secret: SecretString,
}

impl HarborBackend {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            project_secret: config.provider_token.clone(),
        }
    }
}

#[async_trait]
impl MediaBackend for HarborBackend {
    type Session = HarborSession;

    fn provider_name(&self) -> &'static str {
        "harbor"
    }

    async fn acquire_credentials(&self, room: &str) -> Result<RoomCredentials, ConnectFailure> {
        if self.project_secret.expose_secret().is_empty() {
            return Err(ConnectFailure::Rejected(
                "empty Harbor project secret".to_string(),
            ));
        }

        tokio::task::yield_now().await;

        let attendee_id = format!("hbr-{}", Uuid::new_v4());
        // The publisher token doubles as the join token.
        let token = SecretString::from(format!("hpt-{}", Uuid::new_v4().simple()));
        debug!(
            target: "av.provider.harbor",
            room,
            attendee_id = %attendee_id,
            "minted publisher token"
        );

        Ok(RoomCredentials {
            room: room.to_string(),
            attendee_id,
            token,
        })
    }

    async fn connect(&self, credentials: &RoomCredentials) -> Result<HarborSession, JoinFailure> {
        tokio::task::yield_now().await;
        debug!(
            target: "av.provider.harbor",
            room = %credentials.room,
            "session connected"
        );

        Ok(HarborSession {
            attendee_id: credentials.attendee_id.clone(),
            room: credentials.room.clone(),
            audio_publisher: None,
            video_publisher: None,
            subscribe_audio: false,
            subscribe_video: false,
            excluded_streams: BTreeSet::new(),
            local_sink: None,
            remote_sinks: BTreeMap::new(),
            disconnected: false,
        })
    }
}

/// A held publisher handle.
struct Publisher {
    publisher_id: String,
}

/// One Harbor session.
pub struct HarborSession {
    attendee_id: String,
    room: String,
    /// Publishing is holding a publisher handle; `None` means unpublished.
    audio_publisher: Option<Publisher>,
    video_publisher: Option<Publisher>,
    subscribe_audio: bool,
    subscribe_video: bool,
    /// Streams excluded from the audio subscription.
    excluded_streams: BTreeSet<UserId>,
    local_sink: Option<VideoSink>,
    remote_sinks: BTreeMap<UserId, VideoSink>,
    disconnected: bool,
}

impl HarborSession {
    fn guard(&self) -> Result<(), SessionError> {
        if self.disconnected {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn mint_publisher(&self, kind: &str) -> Publisher {
        let publisher_id = format!("pub-{kind}-{}", Uuid::new_v4().simple());
        debug!(
            target: "av.provider.harbor",
            room = %self.room,
            publisher_id = %publisher_id,
            "publisher created"
        );
        Publisher { publisher_id }
    }
}

#[async_trait]
impl BackendSession for HarborSession {
    fn attendee_id(&self) -> &str {
        &self.attendee_id
    }

    async fn set_audio_published(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        match (on, self.audio_publisher.take()) {
            (true, None) => self.audio_publisher = Some(self.mint_publisher("audio")),
            (true, Some(existing)) => self.audio_publisher = Some(existing),
            (false, Some(dropped)) => {
                debug!(
                    target: "av.provider.harbor",
                    room = %self.room,
                    publisher_id = %dropped.publisher_id,
                    "publisher released"
                );
            }
            (false, None) => {}
        }
        Ok(())
    }

    async fn set_video_published(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        match (on, self.video_publisher.take()) {
            (true, None) => self.video_publisher = Some(self.mint_publisher("video")),
            (true, Some(existing)) => self.video_publisher = Some(existing),
            (false, Some(dropped)) => {
                debug!(
                    target: "av.provider.harbor",
                    room = %self.room,
                    publisher_id = %dropped.publisher_id,
                    "publisher released"
                );
            }
            (false, None) => {}
        }
        Ok(())
    }

    async fn set_audio_playback(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.subscribe_audio = on;
        Ok(())
    }

    async fn set_video_playback(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.subscribe_video = on;
        Ok(())
    }

    async fn set_user_audio_subscribed(
        &mut self,
        user_id: UserId,
        on: bool,
    ) -> Result<(), SessionError> {
        self.guard()?;
        if on {
            self.excluded_streams.remove(&user_id);
        } else {
            self.excluded_streams.insert(user_id);
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
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        self.audio_publisher = None;
        self.video_publisher = None;
        self.local_sink = None;
        self.remote_sinks.clear();
        debug!(target: "av.provider.harbor", room = %self.room, "session disconnected");
    }
}
