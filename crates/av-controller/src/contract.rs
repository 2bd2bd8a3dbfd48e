//! The audio/video capability contract.
//!
//! Every conferencing back-end implements [`AudioVideo`]; the rest of the
//! client holds a `Box<dyn AudioVideo>` and never sees vendor specifics.
//! The provider is selected at startup from configuration via
//! [`create_provider`].

use crate::errors::AvError;
use crate::providers::{HarborBackend, SkylarkBackend, TesseraBackend};
use crate::reconcile::Reconciler;
use async_trait::async_trait;
use classroom_protocol::partition::Groups;
use common::config::{Config, ProviderKind};
use common::types::UserId;

/// Opaque handle to a platform render surface.
///
/// The controller only routes sinks to sessions; producing pixels on the
/// surface is the embedder's concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSink {
    surface: String,
}

impl VideoSink {
    /// Create a sink handle for the named render surface.
    #[must_use]
    pub fn new(surface: impl Into<String>) -> Self {
        Self {
            surface: surface.into(),
        }
    }

    /// Identifier of the render surface this sink points at.
    #[must_use]
    pub fn surface(&self) -> &str {
        &self.surface
    }
}

/// Capability contract for a conferencing back-end.
///
/// # Session lifecycle
///
/// `init` acquires credentials, `join` attaches to the main session, and
/// `reconcile` converges the set of live sessions onto a new group
/// partition. `leave` releases everything and is safe at any point.
///
/// # State rules
///
/// - `join` requires a prior successful `init`.
/// - `reconcile` and the local toggles require a prior successful `join`.
/// - Sink binds and per-user audio overrides are accepted at any time and
///   queue until the owning session exists.
#[async_trait]
pub trait AudioVideo: Send {
    /// Acquire the credentials needed to join the main group.
    ///
    /// Idempotent on retry; a failure leaves no partial state behind.
    async fn init(&mut self) -> Result<(), AvError>;

    /// Attach to the main session and return the local participant's
    /// provider-level identity.
    async fn join(&mut self) -> Result<String, AvError>;

    /// Tear down every session this provider holds. Safe to call when
    /// never joined.
    async fn leave(&mut self);

    /// Converge live sessions to the given partition.
    ///
    /// Groups present in both the old and new partition are reconfigured
    /// in place; a partial failure preserves the sessions that succeeded
    /// and reports the groups that did not.
    async fn reconcile(&mut self, groups: &Groups) -> Result<(), AvError>;

    /// Toggle the local audio publish state in every held session.
    async fn set_local_audio(&mut self, on: bool) -> Result<(), AvError>;

    /// Toggle the local video publish state in every held session.
    async fn set_local_video(&mut self, on: bool) -> Result<(), AvError>;

    /// Attach a render target for the local self-view.
    async fn bind_local_video_sink(&mut self, sink: VideoSink) -> Result<(), AvError>;

    /// Detach the local self-view render target.
    async fn unbind_local_video_sink(&mut self) -> Result<(), AvError>;

    /// Attach a render target for a remote user's video.
    async fn bind_remote_video_sink(
        &mut self,
        user_id: UserId,
        sink: VideoSink,
    ) -> Result<(), AvError>;

    /// Detach a remote user's render target.
    async fn unbind_remote_video_sink(&mut self, user_id: UserId) -> Result<(), AvError>;

    /// Re-enable hearing a specific user inside an audio-available group.
    async fn subscribe_user_audio_locally(&mut self, user_id: UserId) -> Result<(), AvError>;

    /// Stop hearing a specific user even while their group is
    /// audio-available.
    async fn unsubscribe_user_audio_locally(&mut self, user_id: UserId) -> Result<(), AvError>;

    /// The local provider-level identity, once joined.
    fn local_attendee_id(&self) -> Option<&str>;
}

/// Build the configured provider for the given local user.
#[must_use]
pub fn create_provider(config: &Config, local_user: UserId) -> Box<dyn AudioVideo> {
    match config.provider {
        ProviderKind::Skylark => Box::new(Reconciler::new(
            SkylarkBackend::new(config),
            config,
            local_user,
        )),
        ProviderKind::Tessera => Box::new(Reconciler::new(
            TesseraBackend::new(config),
            config,
            local_user,
        )),
        ProviderKind::Harbor => Box::new(Reconciler::new(
            HarborBackend::new(config),
            config,
            local_user,
        )),
    }
}
