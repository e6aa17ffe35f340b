//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Abstract signaling events, decoupled from their wire encoding.
//!
//! The transport collaborator decodes whatever is on the wire and feeds
//! the controller one of these; the controller never sees wire bytes.

use std::fmt;

use crate::common::CallMediaType;

/// Remote call progress, delivered by the signaling transport. Each
/// event is tagged (at the `CallManager` API) with the `CallId` it
/// applies to; events for an unrecognized or already-terminal call are
/// dropped.
///
/// An incoming ring is not represented here because it creates the
/// session; it arrives through `CallManager::received_ring` instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignalingEvent {
    /// Outgoing only: the remote device acknowledged the ring and is
    /// now audibly ringing.
    RingingAck,

    /// Outgoing only: the remote callee accepted the call.
    Accepted,

    /// Outgoing only: the remote callee declined the call.
    Declined,

    /// Outgoing only: the remote device is busy with another call.
    Busy,

    /// Either side hung up. Old clients attach a human readable status
    /// string instead of a structured reason; it is used as a
    /// classification fallback only.
    Hangup { legacy_status: Option<String> },

    /// The transport failed. During negotiation this is fatal; while
    /// connected it opens the bounded reconnect window.
    IceFailure,

    /// The transport recovered within the reconnect window.
    ReconnectRestored,

    /// Media negotiation finished; audio (and video) are flowing.
    MediaConnected,
}

impl fmt::Display for SignalingEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let display = match self {
            Self::Hangup { legacy_status: Some(_) } => "Hangup(legacy status)",
            Self::Hangup { legacy_status: None } => "Hangup",
            Self::RingingAck => "RingingAck",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
            Self::Busy => "Busy",
            Self::IceFailure => "IceFailure",
            Self::ReconnectRestored => "ReconnectRestored",
            Self::MediaConnected => "MediaConnected",
        };
        write!(f, "({})", display)
    }
}

/// The messages the controller asks the platform to put on the wire.
/// Carried here for logging; the platform sends them through the
/// per-message `Platform::on_send_*` methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageType {
    Ring(CallMediaType),
    Accept,
    Decline,
    Hangup,
    Busy,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Ring(media_type) => write!(f, "Ring({})", media_type),
            other => write!(f, "{:?}", other),
        }
    }
}
