//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Media stream ownership and mutable call controls.
//!
//! The manager wraps the opaque transport provider: it owns the
//! local/remote stream handles and the mute/speaker/camera state, and
//! serializes its own operations so that concurrent control requests
//! cannot interleave into an inconsistent device state.

use std::fmt;

use crate::common::{CallId, CallMediaType, CameraFacing, Result};
use crate::core::call_mutex::CallMutex;
use crate::error::CallError;

/// Liveness of the track backing a stream handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackState {
    Live,
    Ended,
}

/// An opaque reference to a media stream owned by the transport. The
/// controller only ever sees availability, never media data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamHandle {
    pub id: u64,
    pub track: TrackState,
}

impl StreamHandle {
    pub fn new(id: u64, track: TrackState) -> Self {
        Self { id, track }
    }

    /// A handle is only worth holding while its underlying track is
    /// live; transient unavailability during renegotiation is expected
    /// and treated as "no stream", not an error.
    pub fn is_live(&self) -> bool {
        self.track == TrackState::Live
    }
}

/// Injected transport capability. The provider performs the actual
/// device work; the manager keeps the authoritative control state.
pub trait MediaProvider: Send + 'static {
    /// Open (or return) the local capture stream for the given media
    /// type.
    fn create_local_stream(&self, media_type: CallMediaType) -> Result<StreamHandle>;

    /// The remote stream for the given call, if the transport has one.
    fn remote_stream(&self, call_id: CallId) -> Option<StreamHandle>;

    fn set_audio_enabled(&self, enabled: bool) -> Result<()>;
    fn set_video_enabled(&self, enabled: bool) -> Result<()>;
    fn set_camera_facing(&self, facing: CameraFacing) -> Result<()>;
    fn set_speaker(&self, on: bool) -> Result<()>;

    /// Drop every stream belonging to this device.
    fn release(&self);
}

/// Mutable call controls. Only meaningful while the session is in
/// connecting/connected/reconnecting; the controller enforces that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallControls {
    pub audio_muted: bool,
    pub video_muted: bool,
    pub speaker_on: bool,
    pub camera_facing: CameraFacing,
}

impl CallControls {
    fn for_media_type(media_type: CallMediaType) -> Self {
        Self {
            audio_muted: false,
            // An audio call starts with video muted; the speaker starts
            // on for video calls so the preview is usable at arm's
            // length.
            video_muted: media_type == CallMediaType::Audio,
            speaker_on: media_type == CallMediaType::Video,
            camera_facing: CameraFacing::Front,
        }
    }
}

impl fmt::Display for CallControls {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "audio_muted: {}, video_muted: {}, speaker_on: {}, camera: {}",
            self.audio_muted, self.video_muted, self.speaker_on, self.camera_facing
        )
    }
}

struct Inner {
    local: Option<StreamHandle>,
    remote: Option<StreamHandle>,
    controls: CallControls,
}

pub struct MediaStreamManager {
    provider: Box<dyn MediaProvider>,
    inner: CallMutex<Inner>,
}

impl MediaStreamManager {
    pub fn new(provider: Box<dyn MediaProvider>) -> Self {
        Self {
            provider,
            inner: CallMutex::new(
                Inner {
                    local: None,
                    remote: None,
                    controls: CallControls::for_media_type(CallMediaType::Audio),
                },
                "media_inner",
            ),
        }
    }

    /// Resets the control state for a fresh session.
    pub fn prepare(&self, media_type: CallMediaType) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.controls = CallControls::for_media_type(media_type);
        Ok(())
    }

    /// Idempotent: returns the current live local handle, opening one
    /// only when there is none.
    pub fn attach_local(&self, media_type: CallMediaType) -> Result<StreamHandle> {
        let mut inner = self.inner.lock()?;
        if let Some(handle) = inner.local.as_ref().filter(|h| h.is_live()) {
            return Ok(handle.clone());
        }
        let handle = self
            .provider
            .create_local_stream(media_type)
            .map_err(|e| {
                warn!("attach_local(): provider failed: {}", e);
                CallError::CreateLocalStream
            })?;
        inner.local = Some(handle.clone());
        Ok(handle)
    }

    /// Idempotent: returns the current live remote handle, asking the
    /// transport only when there is none.
    pub fn attach_remote(&self, call_id: CallId) -> Result<Option<StreamHandle>> {
        let mut inner = self.inner.lock()?;
        if let Some(handle) = inner.remote.as_ref().filter(|h| h.is_live()) {
            return Ok(Some(handle.clone()));
        }
        let handle = self
            .provider
            .remote_stream(call_id)
            .filter(|h| h.is_live());
        inner.remote = handle.clone();
        Ok(handle)
    }

    pub fn local_stream(&self) -> Result<Option<StreamHandle>> {
        let inner = self.inner.lock()?;
        Ok(inner.local.clone().filter(|h| h.is_live()))
    }

    pub fn remote_stream(&self) -> Result<Option<StreamHandle>> {
        let inner = self.inner.lock()?;
        Ok(inner.remote.clone().filter(|h| h.is_live()))
    }

    /// Returns the new muted state.
    pub fn toggle_audio(&self) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.controls.audio_muted = !inner.controls.audio_muted;
        let muted = inner.controls.audio_muted;
        self.provider.set_audio_enabled(!muted)?;
        Ok(muted)
    }

    /// Returns the new muted state.
    pub fn toggle_video(&self) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.controls.video_muted = !inner.controls.video_muted;
        let muted = inner.controls.video_muted;
        self.provider.set_video_enabled(!muted)?;
        Ok(muted)
    }

    /// Returns the new speaker state.
    pub fn toggle_speaker(&self) -> Result<bool> {
        let mut inner = self.inner.lock()?;
        inner.controls.speaker_on = !inner.controls.speaker_on;
        let on = inner.controls.speaker_on;
        self.provider.set_speaker(on)?;
        Ok(on)
    }

    /// Flips the camera and returns the new facing. While video is
    /// muted there is no active camera track to switch, so this is a
    /// no-op that reports the current facing.
    pub fn switch_camera(&self) -> Result<CameraFacing> {
        let mut inner = self.inner.lock()?;
        if inner.controls.video_muted {
            return Ok(inner.controls.camera_facing);
        }
        inner.controls.camera_facing = inner.controls.camera_facing.flipped();
        let facing = inner.controls.camera_facing;
        self.provider.set_camera_facing(facing)?;
        Ok(facing)
    }

    pub fn controls(&self) -> Result<CallControls> {
        let inner = self.inner.lock()?;
        Ok(inner.controls)
    }

    /// Drops both handles. Called exactly once, on the transition into
    /// a terminal state; a reconnect blip keeps streams and controls.
    pub fn release(&self) -> Result<()> {
        let mut inner = self.inner.lock()?;
        inner.local = None;
        inner.remote = None;
        self.provider.release();
        Ok(())
    }
}
