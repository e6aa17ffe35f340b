//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Call Finite State Machine
//!
//! The single authority for the call session lifecycle. Every input --
//! user commands from the UI, signaling events from the transport,
//! permission prompt results, and timer firings -- is serialized
//! through one actor, so no two inputs are ever processed concurrently
//! against the same session.
//!
//! # Asynchronous inputs
//!
//! ## Control events from the client application
//! - CreateOutgoingCall
//! - Accept
//! - Decline
//! - Hangup
//! - control toggles (audio/video/speaker/camera)
//! - CallConcluded
//!
//! ## Signaling events from the transport
//! - ReceivedRing
//! - RingingAck / Accepted / Declined / Busy / Hangup
//! - IceFailure / ReconnectRestored / MediaConnected
//!
//! ## From the platform permission prompt
//! - PermissionResult
//!
//! ## Internally generated
//! - RingTimeout
//! - ReconnectTimeout
//!
//! Timers are delayed tasks on the same actor, stamped with a
//! generation id. The transition function bumps the generation whenever
//! it leaves the state a timer guards, so a stale firing against a
//! superseded state is discarded instead of applied.

use crate::common::{
    actor::Actor, ApplicationEvent, CallConfig, CallDirection, CallId, CallMediaType, CallState,
    CameraFacing, DeviceKind, EndReason, RemoteParticipant, Result,
};
use crate::core::outcome;
use crate::core::permission::{
    Acquire, PermissionDevices, PermissionGate, PermissionRequestId, PermissionStatus,
};
use crate::core::platform::Platform;
use crate::core::session::{CallSession, SessionSnapshot};
use crate::core::signaling::{MessageType, SignalingEvent};
use crate::error::CallError;
use crate::media::{MediaProvider, MediaStreamManager};

/// What an outstanding permission prompt will unlock once it resolves.
enum PermissionPurpose {
    /// Start an outgoing call. No session exists yet; on denial none is
    /// ever created.
    StartOutgoing {
        call_id: CallId,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    },

    /// Answer the ringing incoming call. On denial the session ends as
    /// declined and the remote side is told.
    Answer { call_id: CallId },
}

struct PendingPermission {
    request_id: PermissionRequestId,
    purpose: PermissionPurpose,
}

pub struct CallStateMachine<T>
where
    T: Platform,
{
    /// Handle back to the actor this state machine runs on, used to
    /// schedule the delayed timer tasks.
    actor: Actor<CallStateMachine<T>>,
    platform: T,
    permission_gate: PermissionGate,
    media: MediaStreamManager,
    config: CallConfig,
    /// Exactly zero or one session per device.
    session: Option<CallSession>,
    /// The one suspended operation, folded into the state machine as an
    /// explicit guard instead of a side-channel boolean.
    pending_permission: Option<PendingPermission>,
    ring_timer_generation: u64,
    reconnect_timer_generation: u64,
}

impl<T> CallStateMachine<T>
where
    T: Platform,
{
    pub fn new(
        actor: Actor<CallStateMachine<T>>,
        platform: T,
        devices: Box<dyn PermissionDevices>,
        provider: Box<dyn MediaProvider>,
        config: CallConfig,
    ) -> Self {
        Self {
            actor,
            platform,
            permission_gate: PermissionGate::new(devices),
            media: MediaStreamManager::new(provider),
            config,
            session: None,
            pending_permission: None,
            ring_timer_generation: 0,
            reconnect_timer_generation: 0,
        }
    }

    fn state(&self) -> CallState {
        self.session
            .as_ref()
            .map(|s| s.state())
            .unwrap_or(CallState::Idle)
    }

    /// The transition function. Timer cancellation is attached here:
    /// leaving a guarded state invalidates that state's timer
    /// generation, so an already-queued firing becomes a no-op.
    fn set_state(&mut self, new_state: CallState) {
        let old_state = self.state();
        if old_state == new_state {
            return;
        }
        if let Some(session) = &mut self.session {
            info!("call {}: state: {} -> {}", session.call_id(), old_state, new_state);
            session.set_state(new_state);
        }
        if old_state.is_ring_phase() && !new_state.is_ring_phase() {
            self.ring_timer_generation += 1;
        }
        if old_state == CallState::Reconnecting && new_state != CallState::Reconnecting {
            self.reconnect_timer_generation += 1;
        }
    }

    fn start_ring_timer(&mut self) {
        self.ring_timer_generation += 1;
        let generation = self.ring_timer_generation;
        self.actor
            .send_delayed(self.config.ring_timeout, move |fsm| {
                fsm.handle_ring_timeout(generation)
            });
    }

    fn start_reconnect_timer(&mut self) {
        self.reconnect_timer_generation += 1;
        let generation = self.reconnect_timer_generation;
        self.actor
            .send_delayed(self.config.reconnect_timeout, move |fsm| {
                fsm.handle_reconnect_timeout(generation)
            });
    }

    // Platform notification failures must not corrupt the lifecycle;
    // they are logged and dropped.
    fn notify_application(&self, event: ApplicationEvent) {
        if let Some(session) = &self.session {
            if let Err(e) = self.platform.on_event(session.remote_participant(), event) {
                error!("on_event({}) failed: {}", event, e);
            }
        }
    }

    fn send_message(&self, remote_participant: &RemoteParticipant, call_id: CallId, message: MessageType) {
        info!("call {}: sending {}", call_id, message);
        let result = match message {
            MessageType::Ring(media_type) => {
                self.platform
                    .on_send_ring(remote_participant, call_id, media_type)
            }
            MessageType::Accept => self.platform.on_send_accept(remote_participant, call_id),
            MessageType::Decline => self.platform.on_send_decline(remote_participant, call_id),
            MessageType::Hangup => self.platform.on_send_hangup(remote_participant, call_id),
            MessageType::Busy => self.platform.on_send_busy(remote_participant, call_id),
        };
        if let Err(e) = result {
            error!("sending {} failed: {}", message, e);
        }
    }

    // ------------------------------------------------------------------
    // Control events from the client application

    pub(crate) fn handle_create_outgoing_call(
        &mut self,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) -> Result<CallId> {
        info!("handle_create_outgoing_call():");

        if let Some(session) = &self.session {
            return Err(CallError::CallAlreadyInProgress(session.call_id()).into());
        }
        if let Some(pending) = &self.pending_permission {
            if let PermissionPurpose::StartOutgoing { call_id, .. } = pending.purpose {
                return Err(CallError::CallAlreadyInProgress(call_id).into());
            }
        }

        let call_id = CallId::random();
        match self.permission_gate.acquire(media_type) {
            Acquire::Granted => {
                if let Err(e) = self.proceed_outgoing(call_id, remote_participant, media_type) {
                    // Recoverable: the half-built session is dropped so
                    // the controller is idle again and a retry can run.
                    self.abort_failed_start();
                    return Err(e);
                }
            }
            Acquire::Pending(request_id) => {
                // No session yet. If the prompt is denied the state
                // stays Idle and no session is ever created.
                self.pending_permission = Some(PendingPermission {
                    request_id,
                    purpose: PermissionPurpose::StartOutgoing {
                        call_id,
                        remote_participant,
                        media_type,
                    },
                });
            }
        }
        Ok(call_id)
    }

    /// Unwinds a session whose start path failed partway, so the
    /// controller is idle again and a retry is possible.
    fn abort_failed_start(&mut self) {
        self.session = None;
        if let Err(e) = self.media.release() {
            error!("media release failed: {}", e);
        }
    }

    fn proceed_outgoing(
        &mut self,
        call_id: CallId,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) -> Result<()> {
        self.media.prepare(media_type)?;
        let mut session = CallSession::outgoing(call_id, remote_participant.clone(), media_type);
        session.local_stream_available = self.media.attach_local(media_type)?.is_live();
        self.session = Some(session);

        self.platform.on_start_call(
            &remote_participant,
            call_id,
            CallDirection::Outgoing,
            media_type,
        )?;
        self.send_message(&remote_participant, call_id, MessageType::Ring(media_type));
        self.start_ring_timer();
        Ok(())
    }

    pub(crate) fn handle_received_ring(
        &mut self,
        call_id: CallId,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) {
        info!("handle_received_ring(): call_id: {}", call_id);

        if let Some(session) = &self.session {
            // The push service may redeliver the ring for the call we
            // are already ringing for; answering it busy would make the
            // caller give up.
            if session.call_id() == call_id {
                info!("call {}: dropping retransmitted ring", call_id);
                return;
            }
            info!("call {}: busy, rejecting ring", call_id);
            self.send_message(&remote_participant, call_id, MessageType::Busy);
            return;
        }
        if self.pending_permission.is_some() {
            info!("call {}: busy, rejecting ring", call_id);
            self.send_message(&remote_participant, call_id, MessageType::Busy);
            return;
        }

        if let Err(e) = self.proceed_incoming(call_id, remote_participant, media_type) {
            error!("handle_received_ring() failed: {}", e);
            self.abort_failed_start();
        }
    }

    fn proceed_incoming(
        &mut self,
        call_id: CallId,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) -> Result<()> {
        self.media.prepare(media_type)?;
        self.session = Some(CallSession::incoming(
            call_id,
            remote_participant.clone(),
            media_type,
        ));
        self.platform.on_start_call(
            &remote_participant,
            call_id,
            CallDirection::Incoming,
            media_type,
        )?;
        self.start_ring_timer();
        self.notify_application(ApplicationEvent::LocalRinging);
        Ok(())
    }

    /// Accepting is only valid while ringing on an incoming call; any
    /// other combination fails without mutating state.
    pub(crate) fn handle_accept(&mut self) -> Result<()> {
        info!("handle_accept():");

        let (call_id, media_type) = match &self.session {
            Some(session)
                if session.state() == CallState::Ringing
                    && session.direction() == CallDirection::Incoming =>
            {
                (session.call_id(), session.media_type())
            }
            _ => {
                return Err(CallError::InvalidTransition {
                    state: self.state(),
                    event: "accept",
                }
                .into());
            }
        };

        match self.permission_gate.acquire(media_type) {
            Acquire::Granted => self.proceed_accept(),
            Acquire::Pending(request_id) => {
                // Stay ringing; re-entrant accepts coalesce onto the
                // same prompt inside the gate.
                self.pending_permission = Some(PendingPermission {
                    request_id,
                    purpose: PermissionPurpose::Answer { call_id },
                });
                Ok(())
            }
        }
    }

    fn proceed_accept(&mut self) -> Result<()> {
        let Some(session) = &self.session else {
            return Ok(());
        };
        let call_id = session.call_id();
        let media_type = session.media_type();
        let remote_participant = session.remote_participant().clone();

        self.set_state(CallState::Connecting);
        self.send_message(&remote_participant, call_id, MessageType::Accept);
        let local_live = self.media.attach_local(media_type)?.is_live();
        if let Some(session) = &mut self.session {
            session.local_stream_available = local_live;
        }
        Ok(())
    }

    pub(crate) fn handle_decline(&mut self) -> Result<()> {
        info!("handle_decline():");

        match &self.session {
            Some(session)
                if session.state() == CallState::Ringing
                    && session.direction() == CallDirection::Incoming =>
            {
                self.terminate(
                    CallState::Ended,
                    EndReason::Declined,
                    ApplicationEvent::EndedLocalDeclined,
                    Some(MessageType::Decline),
                );
                Ok(())
            }
            _ => Err(CallError::InvalidTransition {
                state: self.state(),
                event: "decline",
            }
            .into()),
        }
    }

    /// User "end call". A no-op once the session is terminal or gone;
    /// a second hangup never produces a second chat event.
    pub(crate) fn handle_hangup(&mut self) -> Result<()> {
        info!("handle_hangup():");

        let Some(session) = &self.session else {
            // Backing out of an outgoing call while its permission
            // prompt is still outstanding: discard the prompt, stay
            // idle. A later prompt result is discarded, not applied.
            if self.pending_permission.take().is_some() {
                self.permission_gate.cancel();
            }
            return Ok(());
        };
        if session.state().is_terminal() {
            debug!("handle_hangup(): already terminal, dropping");
            return Ok(());
        }

        let reason = if session.ever_connected() {
            EndReason::Completed
        } else {
            EndReason::Cancelled
        };
        self.terminate(
            CallState::Ended,
            reason,
            ApplicationEvent::EndedLocalHangup,
            Some(MessageType::Hangup),
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Signaling events from the transport

    pub(crate) fn handle_signaling_event(&mut self, call_id: CallId, event: SignalingEvent) {
        let Some(session) = &self.session else {
            info!(
                "call {}: dropping {} with no session",
                call_id, event
            );
            return;
        };
        if session.call_id() != call_id {
            info!(
                "call {}: dropping {} for unrecognized call",
                call_id, event
            );
            return;
        }
        if session.state().is_terminal() {
            info!("call {}: dropping {} after termination", call_id, event);
            return;
        }

        let state = session.state();
        let direction = session.direction();
        info!("call {}: state: {}, event: {}", call_id, state, event);

        match event {
            SignalingEvent::RingingAck => {
                if direction == CallDirection::Outgoing && state == CallState::Initiating {
                    self.set_state(CallState::Ringing);
                    self.notify_application(ApplicationEvent::RemoteRinging);
                } else {
                    self.ignore_event(state, "RingingAck");
                }
            }
            SignalingEvent::Accepted => {
                if direction == CallDirection::Outgoing && state.is_ring_phase() {
                    self.set_state(CallState::Connecting);
                } else {
                    self.ignore_event(state, "Accepted");
                }
            }
            SignalingEvent::Declined => {
                if direction == CallDirection::Outgoing && state.is_ring_phase() {
                    self.terminate(
                        CallState::Ended,
                        EndReason::Declined,
                        ApplicationEvent::EndedRemoteDeclined,
                        None,
                    );
                } else {
                    self.ignore_event(state, "Declined");
                }
            }
            SignalingEvent::Busy => {
                if direction == CallDirection::Outgoing && state.is_ring_phase() {
                    self.terminate(
                        CallState::Ended,
                        EndReason::Busy,
                        ApplicationEvent::EndedRemoteBusy,
                        None,
                    );
                } else {
                    self.ignore_event(state, "Busy");
                }
            }
            SignalingEvent::Hangup { legacy_status } => {
                self.handle_remote_hangup(legacy_status);
            }
            SignalingEvent::IceFailure => match state {
                CallState::Connecting => {
                    self.terminate(
                        CallState::Failed,
                        EndReason::NegotiationFailed,
                        ApplicationEvent::EndedConnectionFailure,
                        None,
                    );
                }
                CallState::Connected => {
                    // Controls freeze implicitly: toggles stay legal in
                    // Reconnecting, but the transport is gone and the
                    // state machine guards everything else.
                    self.set_state(CallState::Reconnecting);
                    self.notify_application(ApplicationEvent::Reconnecting);
                    self.start_reconnect_timer();
                }
                // Already inside the reconnect window; the timer is
                // armed.
                CallState::Reconnecting => {}
                _ => self.ignore_event(state, "IceFailure"),
            },
            SignalingEvent::ReconnectRestored => {
                if state == CallState::Reconnecting {
                    self.set_state(CallState::Connected);
                    self.notify_application(ApplicationEvent::Reconnected);
                } else {
                    self.ignore_event(state, "ReconnectRestored");
                }
            }
            SignalingEvent::MediaConnected => {
                if state == CallState::Connecting {
                    self.set_state(CallState::Connected);
                    let remote_live = self
                        .media
                        .attach_remote(call_id)
                        .ok()
                        .flatten()
                        .is_some();
                    if let Some(session) = &mut self.session {
                        session.mark_connected();
                        session.remote_stream_available = remote_live;
                    }
                    self.notify_application(ApplicationEvent::Connected);
                } else {
                    self.ignore_event(state, "MediaConnected");
                }
            }
        }
    }

    fn handle_remote_hangup(&mut self, legacy_status: Option<String>) {
        let Some(session) = &self.session else {
            return;
        };

        let reason = if session.ever_connected() {
            EndReason::Completed
        } else if let Some(status) = legacy_status.as_deref() {
            // Old clients describe the end in prose; classify it, and
            // flag anything ambiguous as cancelled rather than guessing.
            EndReason::from_legacy_status(status)
        } else {
            match session.direction() {
                // The caller gave up before we answered.
                CallDirection::Incoming => EndReason::Missed,
                // The callee hung up a not-yet-accepted call: a decline.
                CallDirection::Outgoing => EndReason::Declined,
            }
        };
        self.terminate(
            CallState::Ended,
            reason,
            ApplicationEvent::EndedRemoteHangup,
            None,
        );
    }

    // ------------------------------------------------------------------
    // Permission prompt results

    pub(crate) fn handle_permission_result(
        &mut self,
        request_id: PermissionRequestId,
        results: Vec<(DeviceKind, PermissionStatus)>,
    ) {
        let Some(outcome) = self.permission_gate.resolve(request_id, &results) else {
            // Cancelled or superseded prompt; nothing to apply.
            return;
        };
        let Some(pending) = self.pending_permission.take() else {
            warn!("permission result {} with nothing pending", request_id);
            return;
        };
        if pending.request_id != request_id {
            warn!("permission result {} does not match pending request", request_id);
            return;
        }

        match pending.purpose {
            PermissionPurpose::StartOutgoing {
                call_id,
                remote_participant,
                media_type,
            } => match outcome {
                Ok(()) => {
                    if self.session.is_some() {
                        warn!("call {}: session appeared while prompting, dropping start", call_id);
                        return;
                    }
                    if let Err(e) = self.proceed_outgoing(call_id, remote_participant, media_type) {
                        error!("proceed_outgoing() failed: {}", e);
                        self.abort_failed_start();
                    }
                }
                Err(denial) => {
                    // Recoverable: no session was created, state stays
                    // idle, the UI gets an actionable error.
                    info!("call {}: not started, {}", call_id, denial);
                    if let Err(e) = self
                        .platform
                        .on_permission_denied(&remote_participant, denial)
                    {
                        error!("on_permission_denied() failed: {}", e);
                    }
                }
            },
            PermissionPurpose::Answer { call_id } => {
                match &self.session {
                    Some(session)
                        if session.call_id() == call_id
                            && session.state() == CallState::Ringing => {}
                    _ => {
                        info!("call {}: answer permission resolved too late", call_id);
                        return;
                    }
                }
                match outcome {
                    Ok(()) => {
                        if let Err(e) = self.proceed_accept() {
                            error!("proceed_accept() failed: {}", e);
                        }
                    }
                    Err(denial) => {
                        let remote_participant = self
                            .session
                            .as_ref()
                            .map(|s| s.remote_participant().clone());
                        self.terminate(
                            CallState::Ended,
                            EndReason::Declined,
                            ApplicationEvent::EndedLocalDeclined,
                            Some(MessageType::Decline),
                        );
                        if let Some(remote_participant) = remote_participant {
                            if let Err(e) = self
                                .platform
                                .on_permission_denied(&remote_participant, denial)
                            {
                                error!("on_permission_denied() failed: {}", e);
                            }
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Timers

    fn handle_ring_timeout(&mut self, generation: u64) {
        if generation != self.ring_timer_generation {
            debug!("stale ring timer, ignoring");
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        if !session.state().is_ring_phase() {
            return;
        }
        info!("call {}: ring timeout", session.call_id());

        let (reason, hangup) = match session.direction() {
            CallDirection::Incoming => (EndReason::Missed, None),
            // Stop ringing the remote devices.
            CallDirection::Outgoing => (EndReason::NoAnswer, Some(MessageType::Hangup)),
        };
        self.terminate(
            CallState::Ended,
            reason,
            ApplicationEvent::EndedTimeout,
            hangup,
        );
    }

    fn handle_reconnect_timeout(&mut self, generation: u64) {
        if generation != self.reconnect_timer_generation {
            debug!("stale reconnect timer, ignoring");
            return;
        }
        let Some(session) = &self.session else {
            return;
        };
        if session.state() != CallState::Reconnecting {
            return;
        }
        info!("call {}: reconnect window expired", session.call_id());

        self.terminate(
            CallState::Failed,
            EndReason::ConnectionLost,
            ApplicationEvent::EndedConnectionLost,
            None,
        );
    }

    // ------------------------------------------------------------------
    // Controls

    fn check_controls(&self) -> Result<()> {
        let state = self.state();
        if state.can_toggle_controls() {
            Ok(())
        } else {
            Err(CallError::NotConnected(state).into())
        }
    }

    pub(crate) fn handle_toggle_audio(&mut self) -> Result<bool> {
        self.check_controls()?;
        self.media.toggle_audio()
    }

    pub(crate) fn handle_toggle_video(&mut self) -> Result<bool> {
        self.check_controls()?;
        self.media.toggle_video()
    }

    pub(crate) fn handle_toggle_speaker(&mut self) -> Result<bool> {
        self.check_controls()?;
        self.media.toggle_speaker()
    }

    pub(crate) fn handle_switch_camera(&mut self) -> Result<CameraFacing> {
        self.check_controls()?;
        self.media.switch_camera()
    }

    pub(crate) fn controls(&self) -> Result<crate::media::CallControls> {
        self.media.controls()
    }

    // ------------------------------------------------------------------
    // Termination and conclusion

    /// Every path into `Ended`/`Failed` goes through here. Seals the
    /// end reason exactly once, releases media, tells the remote side
    /// when asked to, and emits the one chat event. Idempotent.
    fn terminate(
        &mut self,
        terminal: CallState,
        reason: EndReason,
        event: ApplicationEvent,
        message: Option<MessageType>,
    ) {
        // An in-flight answer prompt dies with the session; its late
        // result will be discarded.
        if self.pending_permission.take().is_some() {
            self.permission_gate.cancel();
        }

        let sealed = match &mut self.session {
            None => return,
            Some(session) if session.state().is_terminal() => {
                debug!("terminate(): already terminal, dropping");
                return;
            }
            Some(session) => session.seal(reason),
        };
        if !sealed {
            return;
        }

        self.set_state(terminal);
        if let Err(e) = self.media.release() {
            error!("media release failed: {}", e);
        }
        if let Some(session) = &mut self.session {
            session.local_stream_available = false;
            session.remote_stream_available = false;
        }

        let Some(session) = &self.session else {
            return;
        };
        let remote_participant = session.remote_participant().clone();
        let call_id = session.call_id();
        if let Some(message) = message {
            self.send_message(&remote_participant, call_id, message);
        }
        self.notify_application(event);

        let chat_event = outcome::report(session);
        info!(
            "call {}: reason: {}, outcome: {}",
            call_id, reason, chat_event.outcome
        );
        if let Err(e) = self.platform.on_chat_event(&remote_participant, chat_event) {
            error!("on_chat_event() failed: {}", e);
        }
    }

    /// The UI acknowledged the terminal state and navigated away; drop
    /// the session reference and return to idle.
    pub(crate) fn handle_call_concluded(&mut self) -> Result<()> {
        match &self.session {
            Some(session) if session.state().is_terminal() => {}
            Some(session) => {
                return Err(CallError::InvalidTransition {
                    state: session.state(),
                    event: "conclude",
                }
                .into());
            }
            None => return Ok(()),
        }
        if let Some(session) = self.session.take() {
            info!("call {}: concluded", session.call_id());
            self.platform
                .on_call_concluded(session.remote_participant())?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries

    pub(crate) fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session.as_ref().map(CallSession::snapshot)
    }

    fn ignore_event(&self, state: CallState, event: &str) {
        info!("ignoring event: {}, while in state: {}", event, state);
    }
}
