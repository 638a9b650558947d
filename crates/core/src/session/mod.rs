//! Record/upload/playback lifecycle.
//!
//! [`SessionController`] is the only place that decides which collaborator
//! calls are legal. Every event either moves the state forward or is refused
//! with [`MaskCamError::Session`] without side effects.

use std::sync::Arc;

use bytes::Bytes;

use crate::{
    capture::{CaptureConstraints, CaptureDevice, StreamHandle},
    playback::{PlayableMedia, PlaybackSlot, PreviewSurface},
    record::{Recorder, RecordingSession, RecordingSettings},
    MaskCamError, Result, UploadError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Streaming,
    Recording,
    Stopped,
    Uploading,
    Playing,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    StreamAcquired,
    StartRecording,
    ChunkAvailable,
    StopRecording,
    RecorderStopped,
    UploadFinished,
    AcknowledgeFailure,
    StopStream,
}

/// Which user controls are enabled. Derived from the state, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub start_stream: bool,
    pub stop_stream: bool,
    pub start_recording: bool,
    pub stop_recording: bool,
    pub acknowledge_failure: bool,
    /// Spinner while the recording is being finalized or uploaded.
    pub busy: bool,
}

impl SessionState {
    pub fn controls(self) -> Controls {
        let live = Controls {
            stop_stream: true,
            ..Controls::default()
        };
        match self {
            SessionState::Idle => Controls {
                start_stream: true,
                ..Controls::default()
            },
            SessionState::Streaming | SessionState::Playing => Controls {
                start_recording: true,
                ..live
            },
            SessionState::Recording => Controls {
                stop_recording: true,
                ..live
            },
            SessionState::Stopped | SessionState::Uploading => Controls { busy: true, ..live },
            SessionState::Failed => Controls {
                acknowledge_failure: true,
                ..live
            },
        }
    }
}

/// Why the last session ended in [`SessionState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionFailure {
    Upload(UploadError),
    /// The preview surface refused the returned media.
    Playback(String),
}

/// Issued when a recording is sealed for upload. The id ties the eventual
/// result back to this recording.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    id: u64,
    session: Arc<RecordingSession>,
}

impl UploadTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn session(&self) -> Arc<RecordingSession> {
        self.session.clone()
    }
}

/// The single recording buffer. Open while chunks may still arrive, sealed
/// (read-only, shared with the upload) afterwards.
#[derive(Debug, Default)]
enum Buffer {
    #[default]
    Empty,
    Open(RecordingSession),
    Sealed {
        ticket: u64,
        session: Arc<RecordingSession>,
    },
}

pub struct SessionController {
    state: SessionState,
    stream: Option<Box<dyn StreamHandle>>,
    recorder: Box<dyn Recorder>,
    surface: Box<dyn PreviewSurface>,
    playback: PlaybackSlot,
    settings: RecordingSettings,
    buffer: Buffer,
    recording_id: u64,
    next_ticket: u64,
    failure: Option<SessionFailure>,
}

impl SessionController {
    pub fn new(
        recorder: Box<dyn Recorder>,
        surface: Box<dyn PreviewSurface>,
        settings: RecordingSettings,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            stream: None,
            recorder,
            surface,
            playback: PlaybackSlot::default(),
            settings,
            buffer: Buffer::Empty,
            recording_id: 0,
            next_ticket: 1,
            failure: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn controls(&self) -> Controls {
        self.state.controls()
    }

    pub fn failure(&self) -> Option<&SessionFailure> {
        self.failure.as_ref()
    }

    pub fn has_playback(&self) -> bool {
        self.playback.is_loaded()
    }

    /// The recording currently held, open or sealed.
    pub fn recording(&self) -> Option<&RecordingSession> {
        match &self.buffer {
            Buffer::Empty => None,
            Buffer::Open(session) => Some(session),
            Buffer::Sealed { session, .. } => Some(session),
        }
    }

    /// Opens the capture device and attaches the stream.
    ///
    /// A device failure is returned once and leaves the controller `Idle`.
    pub async fn acquire_stream(
        &mut self,
        device: &dyn CaptureDevice,
        constraints: &CaptureConstraints,
    ) -> Result<()> {
        self.ensure(SessionEvent::StreamAcquired, &[SessionState::Idle])?;
        let stream = device.acquire(constraints).await.inspect_err(|err| {
            tracing::warn!(error = %err, "could not acquire capture stream");
        })?;
        self.stream_acquired(stream)
    }

    pub fn stream_acquired(&mut self, mut stream: Box<dyn StreamHandle>) -> Result<()> {
        if let Err(err) = self.ensure(SessionEvent::StreamAcquired, &[SessionState::Idle]) {
            stream.release();
            return Err(err);
        }
        self.stream = Some(stream);
        self.transition(SessionState::Streaming);
        Ok(())
    }

    /// Starts a new recording tagged with the active overlay and returns its
    /// id. The recorder must label every chunk it delivers with that id.
    pub fn start_recording(&mut self, overlay_key: Option<String>) -> Result<u64> {
        self.ensure(
            SessionEvent::StartRecording,
            &[SessionState::Streaming, SessionState::Playing],
        )?;
        self.recorder.start(&self.settings)?;
        if self.state == SessionState::Playing {
            self.playback.clear(self.surface.as_mut());
            self.surface.show_live();
        }

        self.recording_id += 1;
        tracing::info!(
            recording = self.recording_id,
            overlay = overlay_key.as_deref(),
            "recording started"
        );
        self.buffer = Buffer::Open(RecordingSession::new(overlay_key));
        self.transition(SessionState::Recording);
        Ok(self.recording_id)
    }

    /// Appends a recorder chunk. Chunks keep arriving until the recorder
    /// acknowledges the stop. Chunks labelled with an earlier recording are
    /// dropped. Returns whether the chunk was kept.
    pub fn chunk_available(&mut self, recording: u64, chunk: Bytes) -> Result<bool> {
        self.ensure(
            SessionEvent::ChunkAvailable,
            &[SessionState::Recording, SessionState::Stopped],
        )?;
        if recording != self.recording_id {
            tracing::debug!(
                recording,
                current = self.recording_id,
                "dropping chunk from an earlier recording"
            );
            return Ok(false);
        }
        match &mut self.buffer {
            Buffer::Open(session) => Ok(session.push_chunk(chunk)),
            _ => Err(self.refuse(SessionEvent::ChunkAvailable)),
        }
    }

    /// Asks the recorder to stop. The buffer stays open until
    /// [`Self::recorder_stopped`].
    pub fn stop_recording(&mut self) -> Result<()> {
        self.ensure(SessionEvent::StopRecording, &[SessionState::Recording])?;
        self.recorder.request_stop()?;
        self.transition(SessionState::Stopped);
        Ok(())
    }

    /// The recorder has flushed its last chunk. Seals the buffer and hands
    /// out the only ticket for uploading it.
    pub fn recorder_stopped(&mut self) -> Result<UploadTicket> {
        self.ensure(SessionEvent::RecorderStopped, &[SessionState::Stopped])?;
        let mut session = match std::mem::take(&mut self.buffer) {
            Buffer::Open(session) => session,
            other => {
                self.buffer = other;
                return Err(self.refuse(SessionEvent::RecorderStopped));
            }
        };

        session.finalize();
        let ticket = UploadTicket {
            id: self.next_ticket,
            session: Arc::new(session),
        };
        self.next_ticket += 1;
        tracing::info!(
            ticket = ticket.id,
            bytes = ticket.session.len(),
            chunks = ticket.session.chunk_count(),
            "recording sealed for upload"
        );
        self.buffer = Buffer::Sealed {
            ticket: ticket.id,
            session: ticket.session.clone(),
        };
        self.transition(SessionState::Uploading);
        Ok(ticket)
    }

    /// Applies an upload result. Results for a recording the controller is
    /// no longer waiting on are discarded; returns whether it was applied.
    pub fn upload_finished(
        &mut self,
        ticket: u64,
        result: std::result::Result<PlayableMedia, UploadError>,
    ) -> bool {
        let waiting = matches!(
            (&self.state, &self.buffer),
            (SessionState::Uploading, Buffer::Sealed { ticket: t, .. }) if *t == ticket
        );
        if !waiting {
            tracing::debug!(ticket, state = ?self.state, "discarding stale upload result");
            return false;
        }

        match result {
            Ok(media) => match self.playback.replace(self.surface.as_mut(), media) {
                Ok(()) => {
                    self.buffer = Buffer::Empty;
                    self.transition(SessionState::Playing);
                }
                Err(err) => self.fail(SessionFailure::Playback(err.to_string())),
            },
            Err(err) => self.fail(SessionFailure::Upload(err)),
        }
        true
    }

    /// Clears a failure and drops the retained recording.
    pub fn acknowledge_failure(&mut self) -> Result<()> {
        self.ensure(SessionEvent::AcknowledgeFailure, &[SessionState::Failed])?;
        self.failure = None;
        self.buffer = Buffer::Empty;
        self.transition(SessionState::Streaming);
        Ok(())
    }

    /// Releases the device and everything tied to it. An upload still in
    /// flight will have its result discarded.
    pub fn stop_stream(&mut self) -> Result<()> {
        if self.state == SessionState::Idle {
            return Err(self.refuse(SessionEvent::StopStream));
        }
        if self.state == SessionState::Recording {
            if let Err(err) = self.recorder.request_stop() {
                tracing::warn!(error = %err, "recorder did not stop cleanly");
            }
        }
        if let Some(mut stream) = self.stream.take() {
            stream.release();
        }
        self.buffer = Buffer::Empty;
        self.failure = None;
        self.playback.clear(self.surface.as_mut());
        self.surface.show_live();
        self.transition(SessionState::Idle);
        Ok(())
    }

    fn fail(&mut self, failure: SessionFailure) {
        tracing::warn!(?failure, "session failed");
        self.failure = Some(failure);
        self.transition(SessionState::Failed);
    }

    fn ensure(&self, event: SessionEvent, allowed: &[SessionState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.refuse(event))
        }
    }

    fn refuse(&self, event: SessionEvent) -> MaskCamError {
        tracing::warn!(state = ?self.state, ?event, "event refused");
        MaskCamError::Session {
            state: self.state,
            event,
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::info!(from = ?self.state, to = ?next, "session state changed");
        self.state = next;
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.state)
            .field("buffer", &self.buffer)
            .field("failure", &self.failure)
            .finish()
    }
}
