//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Common types used throughout the library.

use std::{
    fmt,
    time::{Duration, SystemTime},
};

pub mod actor;

/// Common Result type, using `anyhow::Error` for Error.
pub type Result<T> = anyhow::Result<T>;

/// Unique call identification number, correlating local state with
/// remote signaling. Shared with the remote side as the room id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallId {
    id: u64,
}

impl CallId {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn random() -> Self {
        Self::new(rand::random())
    }

    pub fn as_u64(self) -> u64 {
        self.id
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:x}", self.id)
    }
}

impl From<u64> for CallId {
    fn from(item: u64) -> Self {
        CallId::new(item)
    }
}

impl From<CallId> for u64 {
    fn from(item: CallId) -> Self {
        item.id
    }
}

/// The remote participant of a call, as supplied by the UI for outgoing
/// calls or by the signaling push for incoming ones. Immutable for the
/// lifetime of the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteParticipant {
    pub user_id: String,
    pub display_name: String,
    pub photo_url: Option<String>,
}

impl RemoteParticipant {
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        photo_url: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            photo_url,
        }
    }
}

impl fmt::Display for RemoteParticipant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.user_id)
    }
}

/// Tracks the state of a call session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    /// No call session exists.
    Idle,

    /// Outgoing only: the local side is ringing the remote.
    Initiating,

    /// Incoming: the local device is ringing.
    /// Outgoing: the remote device acknowledged the ring.
    Ringing,

    /// The call was accepted and media is being negotiated.
    Connecting,

    /// Media is flowing; the call is established.
    Connected,

    /// The transport dropped while connected; a bounded reconnect
    /// window is open.
    Reconnecting,

    /// Terminal: the call ended normally (hangup, decline, missed, ...).
    Ended,

    /// Terminal: the call died of a negotiation failure or an expired
    /// reconnect window.
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Ended | CallState::Failed)
    }

    /// Controls (mute, camera, speaker) are only meaningful while media
    /// is being set up or flowing.
    pub fn can_toggle_controls(self) -> bool {
        matches!(
            self,
            CallState::Connecting | CallState::Connected | CallState::Reconnecting
        )
    }

    /// States bounded by the ring timer.
    pub fn is_ring_phase(self) -> bool {
        matches!(self, CallState::Initiating | CallState::Ringing)
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The call direction. Immutable after session creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Incoming,
    Outgoing,
}

impl fmt::Display for CallDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Type of media for a call at time of origination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallMediaType {
    /// Call should start as audio only.
    Audio,

    /// Call should start as audio/video.
    Video,
}

impl fmt::Display for CallMediaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A capture device whose permission must be granted before a call can
/// use it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Microphone,
    Camera,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Which camera the local video track captures from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraFacing {
    #[default]
    Front,
    Back,
}

impl CameraFacing {
    pub fn flipped(self) -> Self {
        match self {
            CameraFacing::Front => CameraFacing::Back,
            CameraFacing::Back => CameraFacing::Front,
        }
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Why a session reached a terminal state. Set exactly once, at the
/// transition into `Ended` or `Failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EndReason {
    /// The call connected and was hung up by either side.
    Completed,

    /// The local user declined an incoming ring, the remote callee
    /// declined an outgoing one, or answering was abandoned because the
    /// required permissions were denied.
    Declined,

    /// Incoming: the ring went unanswered, or the caller gave up.
    Missed,

    /// Outgoing: the remote never answered before the ring timeout.
    NoAnswer,

    /// The caller abandoned the call before it connected.
    Cancelled,

    /// The remote device reported itself busy.
    Busy,

    /// Media negotiation failed before the call ever connected.
    NegotiationFailed,

    /// The reconnect window expired without the transport recovering.
    ConnectionLost,
}

impl EndReason {
    /// Legacy-compatibility fallback: old clients attach a human readable
    /// status string to their hangup instead of a structured reason.
    /// Anything we cannot confidently classify is `Cancelled` rather than
    /// a guess.
    pub fn from_legacy_status(status: &str) -> Self {
        let status = status.trim().to_ascii_lowercase();
        if status.contains("missed") || status.contains("no answer") {
            EndReason::Missed
        } else if status.contains("declin") || status.contains("reject") {
            EndReason::Declined
        } else if status.contains("busy") {
            EndReason::Busy
        } else {
            EndReason::Cancelled
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// An enum representing the status notification types sent to the
/// client application.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApplicationEvent {
    /// Inbound call only: the local device is ringing.
    LocalRinging,

    /// Outbound call only: the remote device acknowledged the ring.
    RemoteRinging,

    /// The call is established and media is flowing.
    Connected,

    /// The call dropped while connected and is now reconnecting.
    Reconnecting,

    /// The call dropped while connected and is now reconnected.
    Reconnected,

    /// The call ended because of a local hangup.
    EndedLocalHangup,

    /// The call ended because of a remote hangup.
    EndedRemoteHangup,

    /// The call ended because the local user declined it (or the
    /// permissions needed to answer were denied).
    EndedLocalDeclined,

    /// The call ended because the remote callee declined it.
    EndedRemoteDeclined,

    /// The call ended because the remote device is busy.
    EndedRemoteBusy,

    /// The call ended because nobody answered in time.
    EndedTimeout,

    /// The call ended because media negotiation failed.
    EndedConnectionFailure,

    /// The call ended because the reconnect window expired.
    EndedConnectionLost,
}

impl fmt::Display for ApplicationEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A timestamp in milliseconds since January 1, 1970 0:0:0 UTC.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        Self(
            time.duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }

    pub fn as_millis(self) -> u64 {
        self.0
    }

    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl From<Timestamp> for u64 {
    fn from(timestamp: Timestamp) -> Self {
        timestamp.0
    }
}

/// Timer bounds owned by the controller.
#[derive(Clone, Copy, Debug)]
pub struct CallConfig {
    /// How long an unanswered call rings before it is marked
    /// missed (incoming) or no-answer (outgoing).
    pub ring_timeout: Duration,

    /// How long a connected call may stay in `Reconnecting` before it is
    /// failed with `ConnectionLost`.
    pub reconnect_timeout: Duration,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Duration::from_secs(60),
            reconnect_timeout: Duration::from_secs(10),
        }
    }
}
