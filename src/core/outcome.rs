//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Call outcome classification.
//!
//! The single artifact this subsystem hands to the chat collaborator:
//! one [`ChatEvent`] per terminated session, describing how the call
//! ended. The call subsystem itself never writes chat storage.

use std::fmt;

use serde::Serialize;

use crate::common::{CallDirection, CallMediaType, EndReason};
use crate::core::session::CallSession;

/// The classified result of a call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallOutcome {
    Completed,
    Missed,
    Declined,
    Cancelled,
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The event inserted into the conversation by the chat collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatEvent {
    #[serde(rename = "callKind")]
    pub call_kind: CallMediaType,
    pub outcome: CallOutcome,
    /// Talk time in whole seconds; present only for completed calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u64>,
    pub direction: CallDirection,
}

/// Maps the sealed end reason, plus whether the call ever connected,
/// into an outcome.
///
/// `Completed` requires the call to have connected, regardless of how
/// briefly. A terminal state without a connection is reported with the
/// most specific available reason rather than collapsing to a generic
/// failure; genuine negotiation/network failures report as `Cancelled`
/// to avoid alarming the user, even when the call had briefly been up.
pub fn classify(reason: EndReason, ever_connected: bool) -> CallOutcome {
    match reason {
        EndReason::Completed if ever_connected => CallOutcome::Completed,
        // A Completed reason is only ever sealed after connecting; if it
        // shows up without a connection, fall through to Cancelled.
        EndReason::Completed => CallOutcome::Cancelled,
        EndReason::Declined | EndReason::Busy => CallOutcome::Declined,
        EndReason::Missed | EndReason::NoAnswer => CallOutcome::Missed,
        EndReason::Cancelled => CallOutcome::Cancelled,
        EndReason::NegotiationFailed | EndReason::ConnectionLost => CallOutcome::Cancelled,
    }
}

/// Classifies a sealed session into the event handed to the chat
/// collaborator.
pub fn report(session: &CallSession) -> ChatEvent {
    let reason = session.end_reason().unwrap_or(EndReason::Cancelled);
    let outcome = classify(reason, session.ever_connected());
    let duration_secs = match outcome {
        CallOutcome::Completed => session.duration().map(|d| d.as_secs()),
        _ => None,
    };
    ChatEvent {
        call_kind: session.media_type(),
        outcome,
        duration_secs,
        direction: session.direction(),
    }
}
