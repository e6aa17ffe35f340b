//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Platform trait describing the interface the application shell must
//! implement for calling: UI notifications, outbound signaling, and the
//! chat collaborator hand-off.
//!
//! Everything here is a notification out of the controller; inputs come
//! back in through [`crate::core::call_manager::CallManager`] methods.

use std::fmt;

use crate::common::{
    ApplicationEvent, CallDirection, CallId, CallMediaType, RemoteParticipant, Result,
};
use crate::core::outcome::ChatEvent;
use crate::core::permission::PermissionDenial;

pub trait Platform: fmt::Debug + Send + 'static {
    /// Inform the client application that a call session exists and the
    /// call screen should be shown.
    fn on_start_call(
        &self,
        remote_participant: &RemoteParticipant,
        call_id: CallId,
        direction: CallDirection,
        media_type: CallMediaType,
    ) -> Result<()>;

    /// Notify the client application about a lifecycle event.
    fn on_event(
        &self,
        remote_participant: &RemoteParticipant,
        event: ApplicationEvent,
    ) -> Result<()>;

    /// Ring a remote participant over the signaling channel.
    fn on_send_ring(
        &self,
        remote_participant: &RemoteParticipant,
        call_id: CallId,
        media_type: CallMediaType,
    ) -> Result<()>;

    /// Tell the caller we accepted their ring.
    fn on_send_accept(&self, remote_participant: &RemoteParticipant, call_id: CallId)
        -> Result<()>;

    /// Tell the caller we declined their ring.
    fn on_send_decline(
        &self,
        remote_participant: &RemoteParticipant,
        call_id: CallId,
    ) -> Result<()>;

    /// Hang up an in-progress call.
    fn on_send_hangup(&self, remote_participant: &RemoteParticipant, call_id: CallId)
        -> Result<()>;

    /// Tell a second caller that this device is busy. This is the only
    /// outbound message not tied to the active session.
    fn on_send_busy(&self, remote_participant: &RemoteParticipant, call_id: CallId) -> Result<()>;

    /// Surface an actionable permission error to the user. The session,
    /// if any, is unaffected or already terminated when this fires.
    fn on_permission_denied(
        &self,
        remote_participant: &RemoteParticipant,
        denial: PermissionDenial,
    ) -> Result<()>;

    /// Hand the classified call outcome to the chat collaborator.
    /// Emitted exactly once per session, on the transition into a
    /// terminal state.
    fn on_chat_event(
        &self,
        remote_participant: &RemoteParticipant,
        event: ChatEvent,
    ) -> Result<()>;

    /// The terminal session has been consumed and the UI navigated
    /// away; the controller is back to idle.
    fn on_call_concluded(&self, remote_participant: &RemoteParticipant) -> Result<()>;
}
