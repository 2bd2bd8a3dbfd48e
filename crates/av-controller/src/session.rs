//! Per-group provider session records.
//!
//! A [`ProviderSession`] pairs one live backend connection with the
//! bookkeeping the reconciler needs: the group it serves, the local
//! user's availability in that group, the currently applied media
//! switches, and per-remote-user subscription and sink state.
//!
//! Lifecycle: `Connecting -> Active -> Reconfiguring -> Active` until the
//! group disappears from the partition, then `Destroyed`. Reconfiguring
//! only flips media switches on the existing connection; it is never
//! observable as a disconnect from the remote side. A failure while
//! connecting closes the backend connection immediately so nothing is
//! left dangling.

use crate::backend::BackendSession;
use crate::contract::VideoSink;
use crate::errors::SessionError;
use chrono::{DateTime, Utc};
use classroom_protocol::partition::{Group, GroupKey};
use common::types::UserId;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Lifecycle phase of one provider session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    Active,
    Reconfiguring,
    Destroyed,
}

/// Everything the local user wants from a session, independent of what
/// the vendor currently has applied.
#[derive(Debug, Clone, Copy)]
pub struct LocalMediaState {
    pub audio_on: bool,
    pub video_on: bool,
}

/// One live session serving one group.
pub struct ProviderSession<S: BackendSession> {
    key: GroupKey,
    session: S,
    phase: SessionPhase,
    audio_available: bool,
    video_available: bool,
    member_ids: BTreeSet<UserId>,
    /// Applied media switches, tracked so re-applying desired state only
    /// touches the vendor when something actually changed.
    audio_published: bool,
    video_published: bool,
    audio_playback: bool,
    video_playback: bool,
    /// Applied per-user audio subscriptions.
    subscribed: BTreeMap<UserId, bool>,
    /// Remote users with a bound render target in this session.
    bound_remote: BTreeSet<UserId>,
    local_sink_bound: bool,
    created_at: DateTime<Utc>,
}

impl<S: BackendSession> ProviderSession<S> {
    /// Take a freshly connected backend session through `Connecting` into
    /// `Active`, applying the group's availability, the local toggles,
    /// subscriptions, and any pending sinks.
    ///
    /// On failure the backend connection is closed before returning, so a
    /// failed connect can never leave a half-configured session behind.
    #[allow(clippy::too_many_arguments)]
    pub async fn connect_and_activate(
        key: GroupKey,
        session: S,
        group: &Group,
        local_user: UserId,
        local_media: LocalMediaState,
        local_sink: Option<&VideoSink>,
        remote_sinks: &BTreeMap<UserId, VideoSink>,
        muted_users: &BTreeSet<UserId>,
    ) -> Result<Self, SessionError> {
        let mut record = Self {
            key,
            session,
            phase: SessionPhase::Connecting,
            audio_available: group.audio_available,
            video_available: group.video_available,
            member_ids: BTreeSet::new(),
            audio_published: false,
            video_published: false,
            audio_playback: false,
            video_playback: false,
            subscribed: BTreeMap::new(),
            bound_remote: BTreeSet::new(),
            local_sink_bound: false,
            created_at: Utc::now(),
        };

        let setup = record.setup(group, local_user, local_media, local_sink, remote_sinks, muted_users);
        if let Err(err) = setup.await {
            record.session.close().await;
            record.phase = SessionPhase::Destroyed;
            return Err(err);
        }

        record.phase = SessionPhase::Active;
        debug!(target: "av.session", key = %record.key, "session active");
        Ok(record)
    }

    async fn setup(
        &mut self,
        group: &Group,
        local_user: UserId,
        local_media: LocalMediaState,
        local_sink: Option<&VideoSink>,
        remote_sinks: &BTreeMap<UserId, VideoSink>,
        muted_users: &BTreeSet<UserId>,
    ) -> Result<(), SessionError> {
        self.apply_media(local_media).await?;
        self.sync_members(&group.member_ids, local_user, remote_sinks, muted_users)
            .await?;
        if let Some(sink) = local_sink {
            self.bind_local(sink.clone()).await?;
        }
        Ok(())
    }

    /// Update this session in place for a new version of its group.
    ///
    /// Entered as `Reconfiguring`; never reconnects. On failure the
    /// session stays alive with whatever state was applied, and the
    /// caller reports the group as failed.
    pub async fn reconfigure(
        &mut self,
        group: &Group,
        local_user: UserId,
        local_media: LocalMediaState,
        remote_sinks: &BTreeMap<UserId, VideoSink>,
        muted_users: &BTreeSet<UserId>,
    ) -> Result<(), SessionError> {
        self.phase = SessionPhase::Reconfiguring;
        self.audio_available = group.audio_available;
        self.video_available = group.video_available;

        let result = {
            let media = self.apply_media(local_media).await;
            match media {
                Ok(()) => {
                    self.sync_members(&group.member_ids, local_user, remote_sinks, muted_users)
                        .await
                }
                Err(err) => Err(err),
            }
        };

        self.phase = SessionPhase::Active;
        result
    }

    /// Re-apply the local publish toggles against the stored availability.
    pub async fn apply_local_toggles(
        &mut self,
        local_media: LocalMediaState,
    ) -> Result<(), SessionError> {
        self.apply_media(local_media).await
    }

    async fn apply_media(&mut self, local_media: LocalMediaState) -> Result<(), SessionError> {
        let playback_audio = self.audio_available;
        let playback_video = self.video_available;
        // Audio publish is gated by availability: a private-talk
        // participant must not leak speech into groups whose audio is
        // forced off. Video publish follows the local toggle alone, so
        // the camera stays visible in every room the user is part of.
        let publish_audio = self.audio_available && local_media.audio_on;
        let publish_video = local_media.video_on;

        if self.audio_playback != playback_audio {
            self.session.set_audio_playback(playback_audio).await?;
            self.audio_playback = playback_audio;
        }
        if self.video_playback != playback_video {
            self.session.set_video_playback(playback_video).await?;
            self.video_playback = playback_video;
        }
        if self.audio_published != publish_audio {
            self.session.set_audio_published(publish_audio).await?;
            self.audio_published = publish_audio;
        }
        if self.video_published != publish_video {
            self.session.set_video_published(publish_video).await?;
            self.video_published = publish_video;
        }
        Ok(())
    }

    /// Converge membership-derived state: per-user subscriptions and
    /// remote render targets follow the group's member set.
    async fn sync_members(
        &mut self,
        members: &BTreeSet<UserId>,
        local_user: UserId,
        remote_sinks: &BTreeMap<UserId, VideoSink>,
        muted_users: &BTreeSet<UserId>,
    ) -> Result<(), SessionError> {
        // Drop state for users that left the group.
        let gone: Vec<UserId> = self
            .member_ids
            .iter()
            .copied()
            .filter(|id| !members.contains(id))
            .collect();
        for user_id in gone {
            self.subscribed.remove(&user_id);
            if self.bound_remote.remove(&user_id) {
                self.session.unbind_remote_video_sink(user_id).await;
            }
        }

        self.member_ids = members.clone();

        for user_id in members {
            let user_id = *user_id;
            if user_id == local_user {
                continue;
            }

            let desired = !muted_users.contains(&user_id);
            if self.subscribed.get(&user_id) != Some(&desired) {
                self.session.set_user_audio_subscribed(user_id, desired).await?;
                self.subscribed.insert(user_id, desired);
            }

            if let Some(sink) = remote_sinks.get(&user_id) {
                if !self.bound_remote.contains(&user_id) {
                    self.session
                        .bind_remote_video_sink(user_id, sink.clone())
                        .await?;
                    self.bound_remote.insert(user_id);
                }
            }
        }
        Ok(())
    }

    /// Apply a per-user audio override immediately.
    pub async fn set_user_subscription(
        &mut self,
        user_id: UserId,
        on: bool,
    ) -> Result<(), SessionError> {
        if !self.member_ids.contains(&user_id) {
            return Ok(());
        }
        if self.subscribed.get(&user_id) != Some(&on) {
            self.session.set_user_audio_subscribed(user_id, on).await?;
            self.subscribed.insert(user_id, on);
        }
        Ok(())
    }

    /// Bind a remote user's render target if they are a member here.
    pub async fn bind_remote(
        &mut self,
        user_id: UserId,
        sink: VideoSink,
    ) -> Result<(), SessionError> {
        if !self.member_ids.contains(&user_id) {
            return Ok(());
        }
        self.session.bind_remote_video_sink(user_id, sink).await?;
        self.bound_remote.insert(user_id);
        Ok(())
    }

    /// Unbind a remote user's render target.
    pub async fn unbind_remote(&mut self, user_id: UserId) {
        if self.bound_remote.remove(&user_id) {
            self.session.unbind_remote_video_sink(user_id).await;
        }
    }

    /// Bind the local self-view render target.
    pub async fn bind_local(&mut self, sink: VideoSink) -> Result<(), SessionError> {
        self.session.bind_local_video_sink(sink).await?;
        self.local_sink_bound = true;
        Ok(())
    }

    /// Unbind the local self-view render target.
    pub async fn unbind_local(&mut self) {
        if self.local_sink_bound {
            self.session.unbind_local_video_sink().await;
            self.local_sink_bound = false;
        }
    }

    /// Stop media and release the connection.
    pub async fn close(&mut self) {
        if self.phase == SessionPhase::Destroyed {
            return;
        }
        self.session.close().await;
        self.phase = SessionPhase::Destroyed;
        let lifetime = Utc::now() - self.created_at;
        debug!(
            target: "av.session",
            key = %self.key,
            lifetime_ms = lifetime.num_milliseconds(),
            "session destroyed"
        );
    }

    #[must_use]
    pub fn key(&self) -> GroupKey {
        self.key
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn attendee_id(&self) -> &str {
        self.session.attendee_id()
    }

    #[must_use]
    pub fn member_ids(&self) -> &BTreeSet<UserId> {
        &self.member_ids
    }
}
