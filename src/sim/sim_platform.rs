//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Simulation Platform, PermissionDevices and MediaProvider.
//!
//! Each collaborator records what the controller asked of it behind an
//! `Arc<Mutex<..>>`, so tests keep a clone and assert on the counters
//! after a `synchronize()`.

use std::{
    collections::HashSet,
    fmt,
    sync::{Arc, Mutex},
};

use crate::common::{
    ApplicationEvent, CallDirection, CallId, CallMediaType, CameraFacing, DeviceKind,
    RemoteParticipant, Result,
};
use crate::core::outcome::ChatEvent;
use crate::core::permission::{PermissionDenial, PermissionDevices, PermissionRequestId};
use crate::core::platform::Platform;
use crate::media::{MediaProvider, StreamHandle, TrackState};

#[derive(Default)]
struct SimPlatformState {
    should_fail_start: bool,
    start_outgoing_count: usize,
    start_incoming_count: usize,
    events: Vec<ApplicationEvent>,
    rings_sent: usize,
    accepts_sent: usize,
    declines_sent: usize,
    hangups_sent: usize,
    busys_sent: usize,
    permission_denials: Vec<PermissionDenial>,
    chat_events: Vec<ChatEvent>,
    concluded_count: usize,
}

/// Simulation implementation of core::Platform.
#[derive(Clone, Default)]
pub struct SimPlatform {
    state: Arc<Mutex<SimPlatformState>>,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `on_start_call` fail, simulating an application shell that
    /// cannot bring up the call screen.
    pub fn set_should_fail_start(&self, should_fail: bool) {
        self.state.lock().unwrap().should_fail_start = should_fail;
    }

    pub fn start_outgoing_count(&self) -> usize {
        self.state.lock().unwrap().start_outgoing_count
    }

    pub fn start_incoming_count(&self) -> usize {
        self.state.lock().unwrap().start_incoming_count
    }

    pub fn event_count(&self, event: ApplicationEvent) -> usize {
        self.state
            .lock()
            .unwrap()
            .events
            .iter()
            .filter(|e| **e == event)
            .count()
    }

    pub fn rings_sent(&self) -> usize {
        self.state.lock().unwrap().rings_sent
    }

    pub fn accepts_sent(&self) -> usize {
        self.state.lock().unwrap().accepts_sent
    }

    pub fn declines_sent(&self) -> usize {
        self.state.lock().unwrap().declines_sent
    }

    pub fn hangups_sent(&self) -> usize {
        self.state.lock().unwrap().hangups_sent
    }

    pub fn busys_sent(&self) -> usize {
        self.state.lock().unwrap().busys_sent
    }

    pub fn permission_denials(&self) -> Vec<PermissionDenial> {
        self.state.lock().unwrap().permission_denials.clone()
    }

    pub fn chat_events(&self) -> Vec<ChatEvent> {
        self.state.lock().unwrap().chat_events.clone()
    }

    pub fn concluded_count(&self) -> usize {
        self.state.lock().unwrap().concluded_count
    }
}

impl fmt::Debug for SimPlatform {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SimPlatform")
    }
}

impl Platform for SimPlatform {
    fn on_start_call(
        &self,
        remote_participant: &RemoteParticipant,
        call_id: CallId,
        direction: CallDirection,
        media_type: CallMediaType,
    ) -> Result<()> {
        info!(
            "sim: on_start_call(): {} {} {} {}",
            remote_participant, call_id, direction, media_type
        );
        let mut state = self.state.lock().unwrap();
        if state.should_fail_start {
            return Err(anyhow::anyhow!("sim: injected on_start_call failure"));
        }
        match direction {
            CallDirection::Outgoing => state.start_outgoing_count += 1,
            CallDirection::Incoming => state.start_incoming_count += 1,
        }
        Ok(())
    }

    fn on_event(
        &self,
        remote_participant: &RemoteParticipant,
        event: ApplicationEvent,
    ) -> Result<()> {
        info!("sim: on_event(): {} {}", remote_participant, event);
        self.state.lock().unwrap().events.push(event);
        Ok(())
    }

    fn on_send_ring(
        &self,
        _remote_participant: &RemoteParticipant,
        _call_id: CallId,
        _media_type: CallMediaType,
    ) -> Result<()> {
        self.state.lock().unwrap().rings_sent += 1;
        Ok(())
    }

    fn on_send_accept(
        &self,
        _remote_participant: &RemoteParticipant,
        _call_id: CallId,
    ) -> Result<()> {
        self.state.lock().unwrap().accepts_sent += 1;
        Ok(())
    }

    fn on_send_decline(
        &self,
        _remote_participant: &RemoteParticipant,
        _call_id: CallId,
    ) -> Result<()> {
        self.state.lock().unwrap().declines_sent += 1;
        Ok(())
    }

    fn on_send_hangup(
        &self,
        _remote_participant: &RemoteParticipant,
        _call_id: CallId,
    ) -> Result<()> {
        self.state.lock().unwrap().hangups_sent += 1;
        Ok(())
    }

    fn on_send_busy(&self, _remote_participant: &RemoteParticipant, _call_id: CallId) -> Result<()> {
        self.state.lock().unwrap().busys_sent += 1;
        Ok(())
    }

    fn on_permission_denied(
        &self,
        remote_participant: &RemoteParticipant,
        denial: PermissionDenial,
    ) -> Result<()> {
        info!(
            "sim: on_permission_denied(): {} {}",
            remote_participant, denial
        );
        self.state.lock().unwrap().permission_denials.push(denial);
        Ok(())
    }

    fn on_chat_event(
        &self,
        remote_participant: &RemoteParticipant,
        event: ChatEvent,
    ) -> Result<()> {
        info!("sim: on_chat_event(): {} {:?}", remote_participant, event);
        self.state.lock().unwrap().chat_events.push(event);
        Ok(())
    }

    fn on_call_concluded(&self, remote_participant: &RemoteParticipant) -> Result<()> {
        info!("sim: on_call_concluded(): {}", remote_participant);
        self.state.lock().unwrap().concluded_count += 1;
        Ok(())
    }
}

#[derive(Default)]
struct SimDevicesState {
    granted: HashSet<DeviceKind>,
    requests: Vec<(PermissionRequestId, Vec<DeviceKind>)>,
}

/// Simulation permission prompt. Grants are scripted up front; prompt
/// requests are recorded and answered by the test through
/// `CallManager::permission_result`.
#[derive(Clone, Default)]
pub struct SimDevices {
    state: Arc<Mutex<SimDevicesState>>,
}

impl SimDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_granted(devices: &[DeviceKind]) -> Self {
        let sim = Self::default();
        for device in devices {
            sim.grant(*device);
        }
        sim
    }

    pub fn grant(&self, device: DeviceKind) {
        self.state.lock().unwrap().granted.insert(device);
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().unwrap().requests.len()
    }

    pub fn last_request(&self) -> Option<(PermissionRequestId, Vec<DeviceKind>)> {
        self.state.lock().unwrap().requests.last().cloned()
    }
}

impl PermissionDevices for SimDevices {
    fn is_granted(&self, device: DeviceKind) -> bool {
        self.state.lock().unwrap().granted.contains(&device)
    }

    fn request(&self, request_id: PermissionRequestId, devices: &[DeviceKind]) {
        info!("sim: permission request {}: {:?}", request_id, devices);
        self.state
            .lock()
            .unwrap()
            .requests
            .push((request_id, devices.to_vec()));
    }
}

struct SimMediaState {
    next_stream_id: u64,
    local_should_fail: bool,
    remote_available: bool,
    release_count: usize,
    audio_enabled: bool,
    video_enabled: bool,
    speaker_on: bool,
    camera_facing: CameraFacing,
}

impl Default for SimMediaState {
    fn default() -> Self {
        Self {
            next_stream_id: 0,
            local_should_fail: false,
            remote_available: true,
            release_count: 0,
            audio_enabled: true,
            video_enabled: true,
            speaker_on: false,
            camera_facing: CameraFacing::Front,
        }
    }
}

/// Simulation transport provider.
#[derive(Clone, Default)]
pub struct SimMedia {
    state: Arc<Mutex<SimMediaState>>,
}

impl SimMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_local_should_fail(&self, should_fail: bool) {
        self.state.lock().unwrap().local_should_fail = should_fail;
    }

    pub fn set_remote_available(&self, available: bool) {
        self.state.lock().unwrap().remote_available = available;
    }

    pub fn release_count(&self) -> usize {
        self.state.lock().unwrap().release_count
    }

    pub fn audio_enabled(&self) -> bool {
        self.state.lock().unwrap().audio_enabled
    }

    pub fn video_enabled(&self) -> bool {
        self.state.lock().unwrap().video_enabled
    }

    pub fn speaker_on(&self) -> bool {
        self.state.lock().unwrap().speaker_on
    }

    pub fn camera_facing(&self) -> CameraFacing {
        self.state.lock().unwrap().camera_facing
    }
}

impl MediaProvider for SimMedia {
    fn create_local_stream(&self, media_type: CallMediaType) -> Result<StreamHandle> {
        let mut state = self.state.lock().unwrap();
        if state.local_should_fail {
            return Err(anyhow::anyhow!("sim: local stream unavailable"));
        }
        state.next_stream_id += 1;
        info!(
            "sim: create_local_stream({}): id {}",
            media_type, state.next_stream_id
        );
        Ok(StreamHandle::new(state.next_stream_id, TrackState::Live))
    }

    fn remote_stream(&self, call_id: CallId) -> Option<StreamHandle> {
        let mut state = self.state.lock().unwrap();
        if !state.remote_available {
            return None;
        }
        state.next_stream_id += 1;
        info!(
            "sim: remote_stream({}): id {}",
            call_id, state.next_stream_id
        );
        Some(StreamHandle::new(state.next_stream_id, TrackState::Live))
    }

    fn set_audio_enabled(&self, enabled: bool) -> Result<()> {
        self.state.lock().unwrap().audio_enabled = enabled;
        Ok(())
    }

    fn set_video_enabled(&self, enabled: bool) -> Result<()> {
        self.state.lock().unwrap().video_enabled = enabled;
        Ok(())
    }

    fn set_camera_facing(&self, facing: CameraFacing) -> Result<()> {
        self.state.lock().unwrap().camera_facing = facing;
        Ok(())
    }

    fn set_speaker(&self, on: bool) -> Result<()> {
        self.state.lock().unwrap().speaker_on = on;
        Ok(())
    }

    fn release(&self) {
        self.state.lock().unwrap().release_count += 1;
    }
}
