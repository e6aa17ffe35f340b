//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Common error codes.

use thiserror::Error;

use crate::common::{CallId, CallState};

/// Platform independent error conditions.
#[derive(Error, Debug)]
pub enum CallError {
    // Project wide common error codes
    #[error("Mutex poisoned: {0}")]
    MutexPoisoned(String),
    #[error("The call state machine is gone")]
    FsmGone,
    #[error("Timed out waiting on the call state machine")]
    FsmTimeout,

    // Controller error codes
    #[error("A call is already in progress, id: {0}")]
    CallAlreadyInProgress(CallId),
    #[error("No active call found")]
    NoActiveCall,
    #[error("Invalid transition: {event} while in state {state}")]
    InvalidTransition {
        state: CallState,
        event: &'static str,
    },
    #[error("Controls are unavailable in state {0}")]
    NotConnected(CallState),

    // Media error codes
    #[error("Unable to open the local media stream")]
    CreateLocalStream,
}
