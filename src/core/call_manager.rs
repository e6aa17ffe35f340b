//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The main Call Manager object definitions.
//!
//! `CallManager` is the handle the UI and the signaling transport talk
//! to. It owns the actor running the [`CallStateMachine`] and injects
//! every input into that one queue. Commands whose result the caller
//! needs synchronously (typed rejections, new control states) make a
//! request/reply round-trip through the same queue, so they stay
//! ordered with respect to everything else.

use std::{
    fmt,
    sync::mpsc::{channel, RecvTimeoutError},
    time::Duration,
};

use crate::common::{
    actor::{Actor, Stopper},
    CallConfig, CallId, CallMediaType, CameraFacing, RemoteParticipant, Result,
};
use crate::core::call_fsm::CallStateMachine;
use crate::core::permission::{PermissionDevices, PermissionRequestId, PermissionStatus};
use crate::core::platform::Platform;
use crate::core::session::SessionSnapshot;
use crate::core::signaling::SignalingEvent;
use crate::error::CallError;
use crate::media::{CallControls, MediaProvider};

use crate::common::DeviceKind;

/// How long a synchronous command may wait on the FSM queue before we
/// assume the worker is wedged.
const FSM_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CallManager<T>
where
    T: Platform,
{
    fsm: Actor<CallStateMachine<T>>,
}

impl<T> Clone for CallManager<T>
where
    T: Platform,
{
    fn clone(&self) -> Self {
        Self {
            fsm: self.fsm.clone(),
        }
    }
}

impl<T> fmt::Debug for CallManager<T>
where
    T: Platform,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CallManager")
    }
}

impl<T> CallManager<T>
where
    T: Platform,
{
    pub fn new(
        platform: T,
        devices: Box<dyn PermissionDevices>,
        provider: Box<dyn MediaProvider>,
        config: CallConfig,
    ) -> Self {
        let stopper = Stopper::new();
        let fsm = Actor::new(stopper, move |actor| {
            CallStateMachine::new(actor, platform, devices, provider, config)
        });
        Self { fsm }
    }

    /// Runs a closure on the FSM thread and waits for its result,
    /// keeping it ordered with every queued input.
    fn run_sync<R>(
        &self,
        f: impl FnOnce(&mut CallStateMachine<T>) -> R + Send + 'static,
    ) -> Result<R>
    where
        R: Send + 'static,
    {
        let (sender, receiver) = channel();
        self.fsm.send(move |fsm| {
            let _ = sender.send(f(fsm));
        });
        match receiver.recv_timeout(FSM_REPLY_TIMEOUT) {
            Ok(result) => Ok(result),
            Err(RecvTimeoutError::Timeout) => Err(CallError::FsmTimeout.into()),
            Err(RecvTimeoutError::Disconnected) => Err(CallError::FsmGone.into()),
        }
    }

    // ------------------------------------------------------------------
    // UI commands

    /// Starts an outgoing call. Fails with `CallAlreadyInProgress` when
    /// a session exists -- the existing session is left untouched, and
    /// the caller must end it explicitly first.
    ///
    /// The returned id identifies the call, but the session itself is
    /// only created once the permission gate resolves; on denial the
    /// controller stays idle and the UI gets `on_permission_denied`.
    pub fn create_outgoing_call(
        &self,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) -> Result<CallId> {
        info!("API: create_outgoing_call()");
        self.run_sync(move |fsm| fsm.handle_create_outgoing_call(remote_participant, media_type))?
    }

    /// Answers the ringing incoming call.
    pub fn accept_call(&self) -> Result<()> {
        info!("API: accept_call()");
        self.run_sync(|fsm| fsm.handle_accept())?
    }

    /// Declines the ringing incoming call and tells the caller.
    pub fn decline_call(&self) -> Result<()> {
        info!("API: decline_call()");
        self.run_sync(|fsm| fsm.handle_decline())?
    }

    /// Ends the call in any non-terminal state. Idempotent: a repeat
    /// hangup (or one with no session) is a no-op, not an error.
    pub fn hangup(&self) -> Result<()> {
        info!("API: hangup()");
        self.run_sync(|fsm| fsm.handle_hangup())?
    }

    /// The UI consumed the terminal state and navigated away.
    pub fn call_concluded(&self) -> Result<()> {
        info!("API: call_concluded()");
        self.run_sync(|fsm| fsm.handle_call_concluded())?
    }

    // ------------------------------------------------------------------
    // Call controls

    /// Returns the new muted state.
    pub fn toggle_audio(&self) -> Result<bool> {
        self.run_sync(|fsm| fsm.handle_toggle_audio())?
    }

    /// Returns the new muted state.
    pub fn toggle_video(&self) -> Result<bool> {
        self.run_sync(|fsm| fsm.handle_toggle_video())?
    }

    /// Returns the new speaker state.
    pub fn toggle_speaker(&self) -> Result<bool> {
        self.run_sync(|fsm| fsm.handle_toggle_speaker())?
    }

    /// Returns the new (or, while video is muted, current) facing.
    pub fn switch_camera(&self) -> Result<CameraFacing> {
        self.run_sync(|fsm| fsm.handle_switch_camera())?
    }

    pub fn controls(&self) -> Result<CallControls> {
        self.run_sync(|fsm| fsm.controls())?
    }

    // ------------------------------------------------------------------
    // Transport inputs

    /// An incoming ring from the signaling push. Creates the session,
    /// or answers busy when one already exists.
    pub fn received_ring(
        &self,
        call_id: CallId,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) {
        self.fsm
            .send(move |fsm| fsm.handle_received_ring(call_id, remote_participant, media_type));
    }

    /// A signaling event for an in-progress call. Events tagged with an
    /// unrecognized or already-terminal call id are dropped.
    pub fn received_signaling_event(&self, call_id: CallId, event: SignalingEvent) {
        self.fsm
            .send(move |fsm| fsm.handle_signaling_event(call_id, event));
    }

    /// The platform permission prompt resolved. Results for a prompt
    /// that was cancelled or superseded are discarded.
    pub fn permission_result(
        &self,
        request_id: PermissionRequestId,
        results: Vec<(DeviceKind, PermissionStatus)>,
    ) {
        self.fsm
            .send(move |fsm| fsm.handle_permission_result(request_id, results));
    }

    // ------------------------------------------------------------------
    // Queries and lifecycle

    /// A consistent copy of the current session, if any.
    pub fn snapshot(&self) -> Result<Option<SessionSnapshot>> {
        self.run_sync(|fsm| fsm.snapshot())
    }

    pub fn active_call_id(&self) -> Result<Option<CallId>> {
        Ok(self.snapshot()?.map(|s| s.call_id))
    }

    /// Flushes the event queue: returns once everything injected before
    /// this call has been processed. Tests lean on this.
    pub fn synchronize(&self) -> Result<()> {
        self.run_sync(|_fsm| ())
    }

    /// Stops the FSM thread and joins it.
    pub fn close(&self) {
        info!("API: close()");
        self.fsm.stopper().stop_all_and_join();
    }
}
