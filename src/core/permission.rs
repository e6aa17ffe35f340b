//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Permission gating for microphone and camera access.
//!
//! The platform prompt is asynchronous and may be abandoned by the
//! user, so the gate hands out a request id per prompt and discards any
//! result whose id is no longer the in-flight one. Re-entrant acquires
//! while a prompt is outstanding coalesce onto it instead of issuing a
//! second prompt.

use std::fmt;

use crate::common::{CallMediaType, DeviceKind};

/// Identifies one platform permission prompt.
pub type PermissionRequestId = u64;

/// Per-device outcome reported by the platform prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied(DenialReason),
}

/// Why a device permission is missing. Enough detail for the UI to show
/// a remediation prompt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialReason {
    /// The user dismissed or rejected the prompt; asking again is
    /// allowed.
    PromptDismissed,

    /// The platform will not prompt again; the user must open the
    /// system settings.
    OpenSettings,
}

/// A permission failure surfaced to the caller. When both devices are
/// missing for a video call, the microphone is reported, since voice is
/// the minimum viable fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PermissionDenial {
    pub device: DeviceKind,
    pub reason: DenialReason,
}

impl fmt::Display for PermissionDenial {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} denied ({:?})", self.device, self.reason)
    }
}

/// Injected platform capability for checking and prompting device
/// permissions. `request` must never block: the platform shows its
/// prompt and later delivers the per-device results back through
/// `CallManager::permission_result` with the same request id.
pub trait PermissionDevices: Send + 'static {
    fn is_granted(&self, device: DeviceKind) -> bool;
    fn request(&self, request_id: PermissionRequestId, devices: &[DeviceKind]);
}

/// Result of asking the gate for a media type's devices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    /// Everything needed is already granted; no prompt was shown.
    Granted,

    /// A prompt is outstanding (freshly issued or coalesced onto).
    Pending(PermissionRequestId),
}

struct InFlight {
    id: PermissionRequestId,
    needed: Vec<DeviceKind>,
}

pub struct PermissionGate {
    devices: Box<dyn PermissionDevices>,
    next_request_id: PermissionRequestId,
    in_flight: Option<InFlight>,
}

impl PermissionGate {
    pub fn new(devices: Box<dyn PermissionDevices>) -> Self {
        Self {
            devices,
            next_request_id: 1,
            in_flight: None,
        }
    }

    fn needed_devices(media_type: CallMediaType) -> &'static [DeviceKind] {
        match media_type {
            CallMediaType::Audio => &[DeviceKind::Microphone],
            CallMediaType::Video => &[DeviceKind::Microphone, DeviceKind::Camera],
        }
    }

    /// Checks already-granted state first; only prompts for what is
    /// missing.
    pub fn acquire(&mut self, media_type: CallMediaType) -> Acquire {
        if let Some(in_flight) = &self.in_flight {
            info!(
                "permission: coalescing acquire onto in-flight request {}",
                in_flight.id
            );
            return Acquire::Pending(in_flight.id);
        }

        let missing: Vec<DeviceKind> = Self::needed_devices(media_type)
            .iter()
            .copied()
            .filter(|device| !self.devices.is_granted(*device))
            .collect();
        if missing.is_empty() {
            return Acquire::Granted;
        }

        let id = self.next_request_id;
        self.next_request_id += 1;
        info!("permission: requesting {:?}, request id {}", missing, id);
        self.devices.request(id, &missing);
        self.in_flight = Some(InFlight { id, needed: missing });
        Acquire::Pending(id)
    }

    /// Consumes a prompt result. Returns None when the result belongs
    /// to a superseded or cancelled prompt and must be discarded.
    /// A device the platform did not report on is treated as dismissed.
    pub fn resolve(
        &mut self,
        id: PermissionRequestId,
        results: &[(DeviceKind, PermissionStatus)],
    ) -> Option<Result<(), PermissionDenial>> {
        match self.in_flight.as_ref() {
            Some(in_flight) if in_flight.id == id => {}
            _ => {
                info!("permission: discarding stale result for request {}", id);
                return None;
            }
        }
        let in_flight = self.in_flight.take()?;

        // Microphone failure reports before camera failure.
        let mut ordered = in_flight.needed;
        ordered.sort_by_key(|device| match device {
            DeviceKind::Microphone => 0,
            DeviceKind::Camera => 1,
        });
        for device in ordered {
            let status = results
                .iter()
                .find(|(reported, _)| *reported == device)
                .map(|(_, status)| *status)
                .unwrap_or(PermissionStatus::Denied(DenialReason::PromptDismissed));
            if let PermissionStatus::Denied(reason) = status {
                return Some(Err(PermissionDenial { device, reason }));
            }
        }
        Some(Ok(()))
    }

    /// Abandons the in-flight prompt, if any. A result that arrives
    /// later is discarded by `resolve`.
    pub fn cancel(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            info!("permission: cancelling in-flight request {}", in_flight.id);
        }
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    struct FakeDevices {
        granted: Vec<DeviceKind>,
        requests: Arc<Mutex<Vec<(PermissionRequestId, Vec<DeviceKind>)>>>,
    }

    impl PermissionDevices for FakeDevices {
        fn is_granted(&self, device: DeviceKind) -> bool {
            self.granted.contains(&device)
        }

        fn request(&self, request_id: PermissionRequestId, devices: &[DeviceKind]) {
            self.requests
                .lock()
                .unwrap()
                .push((request_id, devices.to_vec()));
        }
    }

    fn gate_with(
        granted: Vec<DeviceKind>,
    ) -> (
        PermissionGate,
        Arc<Mutex<Vec<(PermissionRequestId, Vec<DeviceKind>)>>>,
    ) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let gate = PermissionGate::new(Box::new(FakeDevices {
            granted,
            requests: requests.clone(),
        }));
        (gate, requests)
    }

    #[test]
    fn already_granted_needs_no_prompt() {
        let (mut gate, requests) = gate_with(vec![DeviceKind::Microphone, DeviceKind::Camera]);
        assert_eq!(gate.acquire(CallMediaType::Video), Acquire::Granted);
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn prompts_only_for_missing_devices() {
        let (mut gate, requests) = gate_with(vec![DeviceKind::Microphone]);
        let Acquire::Pending(id) = gate.acquire(CallMediaType::Video) else {
            panic!("expected a prompt");
        };
        assert_eq!(
            requests.lock().unwrap().as_slice(),
            &[(id, vec![DeviceKind::Camera])]
        );
    }

    #[test]
    fn reentrant_acquire_coalesces() {
        let (mut gate, requests) = gate_with(vec![]);
        let first = gate.acquire(CallMediaType::Audio);
        let second = gate.acquire(CallMediaType::Audio);
        assert_eq!(first, second);
        assert_eq!(requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn microphone_denial_reported_before_camera() {
        let (mut gate, _) = gate_with(vec![]);
        let Acquire::Pending(id) = gate.acquire(CallMediaType::Video) else {
            panic!("expected a prompt");
        };
        let denial = gate
            .resolve(
                id,
                &[
                    (
                        DeviceKind::Camera,
                        PermissionStatus::Denied(DenialReason::PromptDismissed),
                    ),
                    (
                        DeviceKind::Microphone,
                        PermissionStatus::Denied(DenialReason::OpenSettings),
                    ),
                ],
            )
            .unwrap()
            .unwrap_err();
        assert_eq!(denial.device, DeviceKind::Microphone);
        assert_eq!(denial.reason, DenialReason::OpenSettings);
    }

    #[test]
    fn late_result_after_cancel_is_discarded() {
        let (mut gate, _) = gate_with(vec![]);
        let Acquire::Pending(id) = gate.acquire(CallMediaType::Audio) else {
            panic!("expected a prompt");
        };
        gate.cancel();
        assert!(gate
            .resolve(id, &[(DeviceKind::Microphone, PermissionStatus::Granted)])
            .is_none());
    }

    #[test]
    fn unreported_device_counts_as_dismissed() {
        let (mut gate, _) = gate_with(vec![]);
        let Acquire::Pending(id) = gate.acquire(CallMediaType::Video) else {
            panic!("expected a prompt");
        };
        let denial = gate
            .resolve(id, &[(DeviceKind::Microphone, PermissionStatus::Granted)])
            .unwrap()
            .unwrap_err();
        assert_eq!(denial.device, DeviceKind::Camera);
        assert_eq!(denial.reason, DenialReason::PromptDismissed);
    }
}
