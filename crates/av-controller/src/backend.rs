//! The vendor transport boundary.
//!
//! [`MediaBackend`] and [`BackendSession`] are the only surface a
//! conferencing vendor's SDK glue has to cover. The reconciliation
//! skeleton drives these traits and owns all cross-session logic; a
//! backend only has to know how to mint credentials for a room, open one
//! connection per room, and flip media switches on that connection.

use crate::contract::VideoSink;
use crate::errors::{ConnectFailure, JoinFailure, SessionError};
use async_trait::async_trait;
use common::secret::SecretString;
use common::types::UserId;

/// Credentials for one provider room.
///
/// The token is vendor-specific material (JWT, passcode, publisher token)
/// and is redacted in Debug output.
#[derive(Debug, Clone)]
pub struct RoomCredentials {
    /// Room these credentials are valid for.
    pub room: String,
    /// Provider-level identity of the local participant in this room.
    pub attendee_id: String,
    /// Vendor join token.
    pub token: SecretString,
}

/// A conferencing vendor back-end.
#[async_trait]
pub trait MediaBackend: Send + Sync + 'static {
    /// The live-connection type this backend produces.
    type Session: BackendSession;

    /// Stable lowercase vendor name, used in logs and metric labels.
    fn provider_name(&self) -> &'static str;

    /// Mint credentials for the named room.
    async fn acquire_credentials(&self, room: &str) -> Result<RoomCredentials, ConnectFailure>;

    /// Open a live connection to the room the credentials name.
    async fn connect(&self, credentials: &RoomCredentials) -> Result<Self::Session, JoinFailure>;
}

/// One live vendor connection.
///
/// All switches are absolute ("set", not "toggle") so the caller can
/// re-apply desired state without tracking the vendor's current state.
#[async_trait]
pub trait BackendSession: Send + Sync + 'static {
    /// Provider-level identity of the local participant.
    fn attendee_id(&self) -> &str;

    /// Publish or unpublish the local microphone.
    async fn set_audio_published(&mut self, on: bool) -> Result<(), SessionError>;

    /// Publish or unpublish the local camera.
    async fn set_video_published(&mut self, on: bool) -> Result<(), SessionError>;

    /// Enable or disable hearing this room.
    async fn set_audio_playback(&mut self, on: bool) -> Result<(), SessionError>;

    /// Enable or disable seeing this room.
    async fn set_video_playback(&mut self, on: bool) -> Result<(), SessionError>;

    /// Subscribe or unsubscribe one remote user's audio.
    async fn set_user_audio_subscribed(
        &mut self,
        user_id: UserId,
        on: bool,
    ) -> Result<(), SessionError>;

    /// Attach the local self-view render target.
    async fn bind_local_video_sink(&mut self, sink: VideoSink) -> Result<(), SessionError>;

    /// Detach the local self-view render target.
    async fn unbind_local_video_sink(&mut self);

    /// Attach a remote user's render target.
    async fn bind_remote_video_sink(
        &mut self,
        user_id: UserId,
        sink: VideoSink,
    ) -> Result<(), SessionError>;

    /// Detach a remote user's render target.
    async fn unbind_remote_video_sink(&mut self, user_id: UserId);

    /// Stop media and release the transport connection.
    async fn close(&mut self);
}
