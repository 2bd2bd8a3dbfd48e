//! Scriptable mock conferencing backend.
//!
//! [`MockBackend`] implements `MediaBackend` entirely in memory. Clones
//! share state, so a test can keep one clone for scripting and
//! inspection while the reconciler owns the other.
//!
//! - Script failures per room with [`MockBackend::fail_acquire_for`],
//!   [`MockBackend::fail_connect_for`], and
//!   [`MockBackend::fail_media_for`].
//! - Count backend calls with [`MockBackend::acquire_count`],
//!   [`MockBackend::connect_count`], and [`MockBackend::close_count`].
//! - Inspect live session state through the [`SessionProbe`] returned by
//!   [`MockBackend::session`].

use async_trait::async_trait;
use av_controller::backend::{BackendSession, MediaBackend, RoomCredentials};
use av_controller::contract::VideoSink;
use av_controller::errors::{ConnectFailure, JoinFailure, SessionError};
use common::secret::SecretString;
use common::types::UserId;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Default)]
struct MockState {
    acquire_count: usize,
    connect_count: usize,
    close_count: usize,
    fail_acquire: HashSet<String>,
    fail_connect: HashSet<String>,
    fail_media: HashSet<String>,
    /// Latest session probe per room.
    sessions: HashMap<String, SessionProbe>,
}

/// Shared-state mock backend.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state poisoned")
    }

    /// Make credential acquisition fail for the given room.
    pub fn fail_acquire_for(&self, room: &str) {
        self.lock().fail_acquire.insert(room.to_string());
    }

    /// Clear a scripted acquisition failure.
    pub fn clear_acquire_failure(&self, room: &str) {
        self.lock().fail_acquire.remove(room);
    }

    /// Make connects fail for the given room.
    pub fn fail_connect_for(&self, room: &str) {
        self.lock().fail_connect.insert(room.to_string());
    }

    /// Clear a scripted connect failure.
    pub fn clear_connect_failure(&self, room: &str) {
        self.lock().fail_connect.remove(room);
    }

    /// Make media operations fail for sessions of the given room.
    pub fn fail_media_for(&self, room: &str) {
        self.lock().fail_media.insert(room.to_string());
    }

    /// Clear a scripted media failure.
    pub fn clear_media_failure(&self, room: &str) {
        self.lock().fail_media.remove(room);
    }

    /// How many credential acquisitions were attempted.
    #[must_use]
    pub fn acquire_count(&self) -> usize {
        self.lock().acquire_count
    }

    /// How many connects were attempted.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.lock().connect_count
    }

    /// How many sessions were closed.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.lock().close_count
    }

    /// Probe for the latest session opened in the given room.
    #[must_use]
    pub fn session(&self, room: &str) -> Option<SessionProbe> {
        self.lock().sessions.get(room).cloned()
    }

    /// Rooms with a live (not closed) session.
    #[must_use]
    pub fn live_rooms(&self) -> Vec<String> {
        let state = self.lock();
        let mut rooms: Vec<String> = state
            .sessions
            .iter()
            .filter(|(_, probe)| !probe.closed())
            .map(|(room, _)| room.clone())
            .collect();
        rooms.sort();
        rooms
    }
}

#[async_trait]
impl MediaBackend for MockBackend {
    type Session = MockSession;

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    async fn acquire_credentials(&self, room: &str) -> Result<RoomCredentials, ConnectFailure> {
        let mut state = self.lock();
        state.acquire_count += 1;
        if state.fail_acquire.contains(room) {
            return Err(ConnectFailure::Unreachable(format!(
                "scripted acquire failure for {room}"
            )));
        }

        Ok(RoomCredentials {
            room: room.to_string(),
            attendee_id: format!("mock-{}", Uuid::new_v4().simple()),
            token: SecretString::from("mock-token"),
        })
    }

    async fn connect(&self, credentials: &RoomCredentials) -> Result<MockSession, JoinFailure> {
        let mut state = self.lock();
        state.connect_count += 1;
        if state.fail_connect.contains(&credentials.room) {
            return Err(JoinFailure::Rejected(format!(
                "scripted join failure for {}",
                credentials.room
            )));
        }

        let probe = SessionProbe::new(&credentials.attendee_id);
        state
            .sessions
            .insert(credentials.room.clone(), probe.clone());

        Ok(MockSession {
            attendee_id: credentials.attendee_id.clone(),
            room: credentials.room.clone(),
            probe,
            backend: Arc::clone(&self.state),
        })
    }
}

#[derive(Default)]
struct ProbeState {
    audio_published: bool,
    video_published: bool,
    audio_playback: bool,
    video_playback: bool,
    subscribed: BTreeMap<UserId, bool>,
    local_sink: Option<VideoSink>,
    remote_sinks: BTreeMap<UserId, VideoSink>,
    closed: bool,
}

/// Inspection handle into one mock session's state.
#[derive(Clone)]
pub struct SessionProbe {
    attendee_id: String,
    state: Arc<Mutex<ProbeState>>,
}

impl SessionProbe {
    fn new(attendee_id: &str) -> Self {
        Self {
            attendee_id: attendee_id.to_string(),
            state: Arc::new(Mutex::new(ProbeState::default())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProbeState> {
        self.state.lock().expect("probe state poisoned")
    }

    #[must_use]
    pub fn attendee_id(&self) -> String {
        self.attendee_id.clone()
    }

    #[must_use]
    pub fn audio_published(&self) -> bool {
        self.lock().audio_published
    }

    #[must_use]
    pub fn video_published(&self) -> bool {
        self.lock().video_published
    }

    #[must_use]
    pub fn audio_playback(&self) -> bool {
        self.lock().audio_playback
    }

    #[must_use]
    pub fn video_playback(&self) -> bool {
        self.lock().video_playback
    }

    /// Last subscription state applied for a user, if any.
    #[must_use]
    pub fn subscribed(&self, user_id: UserId) -> Option<bool> {
        self.lock().subscribed.get(&user_id).copied()
    }

    #[must_use]
    pub fn local_sink(&self) -> Option<VideoSink> {
        self.lock().local_sink.clone()
    }

    #[must_use]
    pub fn remote_sink(&self, user_id: UserId) -> Option<VideoSink> {
        self.lock().remote_sinks.get(&user_id).cloned()
    }

    #[must_use]
    pub fn closed(&self) -> bool {
        self.lock().closed
    }
}

/// One live mock session owned by the reconciler.
pub struct MockSession {
    attendee_id: String,
    room: String,
    probe: SessionProbe,
    backend: Arc<Mutex<MockState>>,
}

impl MockSession {
    fn guard(&self) -> Result<(), SessionError> {
        if self.probe.closed() {
            return Err(SessionError::Closed);
        }
        let backend = self.backend.lock().expect("mock state poisoned");
        if backend.fail_media.contains(&self.room) {
            return Err(SessionError::Media(format!(
                "scripted media failure for {}",
                self.room
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BackendSession for MockSession {
    fn attendee_id(&self) -> &str {
        &self.attendee_id
    }

    async fn set_audio_published(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.probe.lock().audio_published = on;
        Ok(())
    }

    async fn set_video_published(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.probe.lock().video_published = on;
        Ok(())
    }

    async fn set_audio_playback(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.probe.lock().audio_playback = on;
        Ok(())
    }

    async fn set_video_playback(&mut self, on: bool) -> Result<(), SessionError> {
        self.guard()?;
        self.probe.lock().video_playback = on;
        Ok(())
    }

    async fn set_user_audio_subscribed(
        &mut self,
        user_id: UserId,
        on: bool,
    ) -> Result<(), SessionError> {
        self.guard()?;
        self.probe.lock().subscribed.insert(user_id, on);
        Ok(())
    }

    async fn bind_local_video_sink(&mut self, sink: VideoSink) -> Result<(), SessionError> {
        self.guard()?;
        self.probe.lock().local_sink = Some(sink);
        Ok(())
    }

    async fn unbind_local_video_sink(&mut self) {
        self.probe.lock().local_sink = None;
    }

    async fn bind_remote_video_sink(
        &mut self,
        user_id: UserId,
        sink: VideoSink,
    ) -> Result<(), SessionError> {
        self.guard()?;
        self.probe.lock().remote_sinks.insert(user_id, sink);
        Ok(())
    }

    async fn unbind_remote_video_sink(&mut self, user_id: UserId) {
        self.probe.lock().remote_sinks.remove(&user_id);
    }

    async fn close(&mut self) {
        let mut probe = self.probe.lock();
        if probe.closed {
            return;
        }
        probe.closed = true;
        drop(probe);

        let mut backend = self.backend.lock().expect("mock state poisoned");
        backend.close_count += 1;
    }
}
