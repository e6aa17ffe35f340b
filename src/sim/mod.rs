//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Simulation implementations of the injected capabilities, so the
//! state machine can be driven without any platform glue.

pub mod sim_platform;
