//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! # chatrtc -- call session lifecycle management
//!
//! This crate drives one voice/video call session from initiation or
//! incoming ring through media negotiation, live connection, degradation,
//! and termination. It reconciles signaling events arriving from the
//! network with user commands arriving from the UI by serializing both
//! through a single event queue, so no two inputs ever race against the
//! same session.
//!
//! The UI, the signaling transport, and the device permission prompts are
//! injected capabilities (see [`core::platform::Platform`],
//! [`core::permission::PermissionDevices`] and [`media::MediaProvider`]),
//! which keeps the controller testable without any platform glue.

#[macro_use]
extern crate log;

pub mod common;

pub mod error;

/// Core, platform independent functionality.
pub mod core {
    pub mod call_fsm;
    pub mod call_manager;
    pub mod call_mutex;
    pub mod outcome;
    pub mod permission;
    pub mod platform;
    pub mod session;
    pub mod signaling;
}

/// Media stream ownership and call controls.
pub mod media;

/// Simulation collaborators, used by the integration tests.
pub mod sim;
