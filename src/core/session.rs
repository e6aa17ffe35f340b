//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! The call session data model.
//!
//! Exactly zero or one `CallSession` exists per device at any instant,
//! and it is owned exclusively by the controller's state machine; every
//! mutation happens on the FSM thread.

use std::{fmt, time::Duration};

use crate::common::{
    CallDirection, CallId, CallMediaType, CallState, EndReason, RemoteParticipant, Timestamp,
};

/// One end-to-end call attempt, from creation to terminal state.
pub struct CallSession {
    /// Opaque identifier correlating local state with remote signaling.
    call_id: CallId,
    /// The call direction, inbound or outbound.
    direction: CallDirection,
    /// The call media type at time of origination.
    media_type: CallMediaType,
    /// The remote participant of this call.
    remote_participant: RemoteParticipant,
    /// The current state of the session.
    state: CallState,
    created_at: Timestamp,
    connected_at: Option<Timestamp>,
    ended_at: Option<Timestamp>,
    /// Set exactly once, at the transition into a terminal state.
    end_reason: Option<EndReason>,
    /// Availability flags for the opaque stream handles owned by the
    /// media stream manager. The session never holds media data.
    pub local_stream_available: bool,
    pub remote_stream_available: bool,
}

impl CallSession {
    pub fn outgoing(
        call_id: CallId,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) -> Self {
        Self::new(
            call_id,
            CallDirection::Outgoing,
            CallState::Initiating,
            remote_participant,
            media_type,
        )
    }

    pub fn incoming(
        call_id: CallId,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) -> Self {
        Self::new(
            call_id,
            CallDirection::Incoming,
            CallState::Ringing,
            remote_participant,
            media_type,
        )
    }

    fn new(
        call_id: CallId,
        direction: CallDirection,
        state: CallState,
        remote_participant: RemoteParticipant,
        media_type: CallMediaType,
    ) -> Self {
        Self {
            call_id,
            direction,
            media_type,
            remote_participant,
            state,
            created_at: Timestamp::now(),
            connected_at: None,
            ended_at: None,
            end_reason: None,
            local_stream_available: false,
            remote_stream_available: false,
        }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn direction(&self) -> CallDirection {
        self.direction
    }

    pub fn media_type(&self) -> CallMediaType {
        self.media_type
    }

    pub fn remote_participant(&self) -> &RemoteParticipant {
        &self.remote_participant
    }

    pub fn state(&self) -> CallState {
        self.state
    }

    /// Only the FSM transition function may call this; it does not do
    /// timer bookkeeping on its own.
    pub(crate) fn set_state(&mut self, state: CallState) {
        self.state = state;
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn connected_at(&self) -> Option<Timestamp> {
        self.connected_at
    }

    pub fn ended_at(&self) -> Option<Timestamp> {
        self.ended_at
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn ever_connected(&self) -> bool {
        self.connected_at.is_some()
    }

    /// Records the moment the session first reached `Connected`.
    /// Reconnect blips do not move it.
    pub(crate) fn mark_connected(&mut self) {
        if self.connected_at.is_none() {
            self.connected_at = Some(Timestamp::now());
        }
    }

    /// Seals the session with its end reason. Returns false if already
    /// sealed; the first reason is stable thereafter.
    pub(crate) fn seal(&mut self, reason: EndReason) -> bool {
        if self.end_reason.is_some() {
            return false;
        }
        self.end_reason = Some(reason);
        self.ended_at = Some(Timestamp::now());
        true
    }

    /// Talk time, from first connection to termination. None if the
    /// call never connected.
    pub fn duration(&self) -> Option<Duration> {
        let connected_at = self.connected_at?;
        let ended_at = self.ended_at.unwrap_or_else(Timestamp::now);
        Some(ended_at.saturating_duration_since(connected_at))
    }
}

/// A point-in-time copy of the session for the UI and for tests. Taken
/// on the FSM thread, so it is internally consistent.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub call_id: CallId,
    pub direction: CallDirection,
    pub media_type: CallMediaType,
    pub state: CallState,
    pub remote_participant: RemoteParticipant,
    pub ever_connected: bool,
    pub end_reason: Option<EndReason>,
    pub local_stream_available: bool,
    pub remote_stream_available: bool,
}

impl CallSession {
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            call_id: self.call_id,
            direction: self.direction,
            media_type: self.media_type,
            state: self.state,
            remote_participant: self.remote_participant.clone(),
            ever_connected: self.ever_connected(),
            end_reason: self.end_reason,
            local_stream_available: self.local_stream_available,
            remote_stream_available: self.remote_stream_available,
        }
    }
}

impl fmt::Display for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "call_id: {}, direction: {}, media: {}, state: {}",
            self.call_id, self.direction, self.media_type, self.state
        )
    }
}

impl fmt::Debug for CallSession {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
