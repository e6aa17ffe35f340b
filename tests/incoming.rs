//
// Copyright 2026 chatrtc authors
// SPDX-License-Identifier: AGPL-3.0-only
//

//! Test the incoming call lifecycle using the Simulation platform

extern crate chatrtc;

#[macro_use]
extern crate log;

use std::time::Duration;

use chatrtc::common::{
    ApplicationEvent, CallConfig, CallId, CallMediaType, CallState, DeviceKind, EndReason,
};
use chatrtc::core::outcome::CallOutcome;
use chatrtc::core::permission::{DenialReason, PermissionStatus};
use chatrtc::core::signaling::SignalingEvent;
use chatrtc::error::CallError;
use chatrtc::sim::sim_platform::SimDevices;

#[macro_use]
mod common;
use common::{random_remote, test_init, TestContext, PRNG};

// Create an inbound call session up to the Ringing state.
//
// - create call manager
// - receive a ring
// - check start incoming event happened
// - check the local device is ringing
//
// Now in the Ringing state.
fn start_inbound_call(context: &TestContext, media_type: CallMediaType) -> CallId {
    let cm = context.cm();

    let call_id = CallId::new(PRNG.gen::<u64>());
    cm.received_ring(call_id, random_remote(), media_type);
    cm.synchronize().expect(error_line!());

    assert_eq!(context.platform().start_incoming_count(), 1);
    assert_eq!(context.platform().start_outgoing_count(), 0);
    assert_eq!(
        context.platform().event_count(ApplicationEvent::LocalRinging),
        1
    );

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.call_id, call_id);
    assert_eq!(snapshot.state, CallState::Ringing);
    assert!(!snapshot.ever_connected);

    call_id
}

// Drive the inbound call to the Connected state.
//
// - local user accepts
// - check accept sent and local stream attached
// - media comes up
//
// Now in the Connected state.
fn connect_inbound_call(context: &TestContext, media_type: CallMediaType) -> CallId {
    let cm = context.cm();
    let call_id = start_inbound_call(context, media_type);

    info!("test: accepting call");
    cm.accept_call().expect(error_line!());
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Connecting);
    assert!(snapshot.local_stream_available);
    assert_eq!(context.platform().accepts_sent(), 1);

    info!("test: injecting media connected");
    cm.received_signaling_event(call_id, SignalingEvent::MediaConnected);
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Connected);
    assert!(snapshot.ever_connected);
    assert!(snapshot.remote_stream_available);
    assert_eq!(context.platform().event_count(ApplicationEvent::Connected), 1);

    call_id
}

#[test]
fn inbound_local_ringing() {
    test_init();

    let context = TestContext::new();
    let _ = start_inbound_call(&context, CallMediaType::Audio);
}

#[test]
fn inbound_video_answer() {
    test_init();

    let context = TestContext::new();
    let _ = connect_inbound_call(&context, CallMediaType::Video);

    // A video call starts with video unmuted and the speaker on.
    let cm = context.cm();
    let controls = cm.controls().expect(error_line!());
    assert!(!controls.audio_muted);
    assert!(!controls.video_muted);
    assert!(controls.speaker_on);
}

#[test]
fn inbound_decline() {
    test_init();

    let context = TestContext::new();
    let cm = context.cm();
    let _ = start_inbound_call(&context, CallMediaType::Audio);

    cm.decline_call().expect(error_line!());
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ended);
    assert_eq!(snapshot.end_reason, Some(EndReason::Declined));
    assert_eq!(context.platform().declines_sent(), 1);
    assert_eq!(
        context
            .platform()
            .event_count(ApplicationEvent::EndedLocalDeclined),
        1
    );
    assert_eq!(
        context.platform().chat_events()[0].outcome,
        CallOutcome::Declined
    );
}

#[test]
fn inbound_caller_gives_up() {
    test_init();

    let context = TestContext::new();
    let cm = context.cm();
    let call_id = start_inbound_call(&context, CallMediaType::Audio);

    cm.received_signaling_event(call_id, SignalingEvent::Hangup {
        legacy_status: None,
    });
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ended);
    assert_eq!(snapshot.end_reason, Some(EndReason::Missed));
    assert_eq!(
        context.platform().chat_events()[0].outcome,
        CallOutcome::Missed
    );
}

#[test]
fn inbound_ring_timeout() {
    test_init();

    let context = TestContext::with_config(CallConfig {
        ring_timeout: Duration::from_millis(50),
        ..CallConfig::default()
    });
    let cm = context.cm();
    let _ = start_inbound_call(&context, CallMediaType::Audio);

    std::thread::sleep(Duration::from_millis(200));
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ended);
    assert_eq!(snapshot.end_reason, Some(EndReason::Missed));
    // Unlike the outgoing case there is nothing to hang up remotely.
    assert_eq!(context.platform().hangups_sent(), 0);
    assert_eq!(
        context.platform().event_count(ApplicationEvent::EndedTimeout),
        1
    );
    assert_eq!(
        context.platform().chat_events()[0].outcome,
        CallOutcome::Missed
    );
}

#[test]
fn inbound_second_ring_answered_busy() {
    test_init();

    let context = TestContext::new();
    let cm = context.cm();
    let call_id = start_inbound_call(&context, CallMediaType::Audio);

    let second_call_id = CallId::new(PRNG.gen::<u64>());
    cm.received_ring(second_call_id, random_remote(), CallMediaType::Audio);
    cm.synchronize().expect(error_line!());

    assert_eq!(context.platform().busys_sent(), 1);
    // The first session is untouched.
    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.call_id, call_id);
    assert_eq!(snapshot.state, CallState::Ringing);
    assert_eq!(context.platform().start_incoming_count(), 1);
}

#[test]
fn inbound_retransmitted_ring_dropped() {
    test_init();

    let context = TestContext::new();
    let cm = context.cm();
    let call_id = start_inbound_call(&context, CallMediaType::Audio);

    // The push service redelivers the ring for the call we are already
    // ringing for; it must not be answered busy.
    cm.received_ring(call_id, random_remote(), CallMediaType::Audio);
    cm.synchronize().expect(error_line!());

    assert_eq!(context.platform().busys_sent(), 0);
    assert_eq!(context.platform().start_incoming_count(), 1);
    assert_eq!(
        context.platform().event_count(ApplicationEvent::LocalRinging),
        1
    );
    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.call_id, call_id);
    assert_eq!(snapshot.state, CallState::Ringing);
}

#[test]
fn inbound_accept_invalid_when_idle() {
    test_init();

    let context = TestContext::new();
    let cm = context.cm();

    let err = cm.accept_call().expect_err(error_line!());
    assert!(matches!(
        err.downcast_ref::<CallError>(),
        Some(CallError::InvalidTransition {
            state: CallState::Idle,
            ..
        })
    ));
}

#[test]
fn inbound_accept_invalid_once_connected() {
    test_init();

    let context = TestContext::new();
    let cm = context.cm();
    let _ = connect_inbound_call(&context, CallMediaType::Audio);

    let err = cm.accept_call().expect_err(error_line!());
    assert!(matches!(
        err.downcast_ref::<CallError>(),
        Some(CallError::InvalidTransition {
            state: CallState::Connected,
            ..
        })
    ));
    assert_eq!(context.platform().accepts_sent(), 1);
}

#[test]
fn inbound_answer_waits_for_permission() {
    test_init();

    let context =
        TestContext::with_devices(SimDevices::with_granted(&[DeviceKind::Microphone]));
    let cm = context.cm();
    let call_id = start_inbound_call(&context, CallMediaType::Video);

    cm.accept_call().expect(error_line!());
    cm.synchronize().expect(error_line!());

    // Still ringing while the camera prompt is up; accepting again
    // coalesces onto the same prompt.
    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ringing);
    assert_eq!(context.platform().accepts_sent(), 0);
    cm.accept_call().expect(error_line!());
    cm.synchronize().expect(error_line!());
    assert_eq!(context.devices().request_count(), 1);

    let (request_id, requested) = context.devices().last_request().expect(error_line!());
    assert_eq!(requested, vec![DeviceKind::Camera]);
    cm.permission_result(
        request_id,
        vec![(DeviceKind::Camera, PermissionStatus::Granted)],
    );
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.call_id, call_id);
    assert_eq!(snapshot.state, CallState::Connecting);
    assert_eq!(context.platform().accepts_sent(), 1);
}

#[test]
fn inbound_answer_permission_denied_declines() {
    test_init();

    let context = TestContext::with_devices(SimDevices::new());
    let cm = context.cm();
    let _ = start_inbound_call(&context, CallMediaType::Audio);

    cm.accept_call().expect(error_line!());
    cm.synchronize().expect(error_line!());
    let (request_id, _) = context.devices().last_request().expect(error_line!());

    cm.permission_result(
        request_id,
        vec![(
            DeviceKind::Microphone,
            PermissionStatus::Denied(DenialReason::PromptDismissed),
        )],
    );
    cm.synchronize().expect(error_line!());

    // Answering was abandoned: the caller is told, the session ends as
    // declined, and the UI gets the denial.
    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ended);
    assert_eq!(snapshot.end_reason, Some(EndReason::Declined));
    assert_eq!(context.platform().declines_sent(), 1);
    let denials = context.platform().permission_denials();
    assert_eq!(denials.len(), 1);
    assert_eq!(denials[0].device, DeviceKind::Microphone);
    assert_eq!(
        context.platform().chat_events()[0].outcome,
        CallOutcome::Declined
    );
}

#[test]
fn inbound_stale_permission_result_ignored() {
    test_init();

    let context = TestContext::with_devices(SimDevices::new());
    let cm = context.cm();
    let _ = start_inbound_call(&context, CallMediaType::Audio);

    cm.accept_call().expect(error_line!());
    cm.synchronize().expect(error_line!());
    let (request_id, _) = context.devices().last_request().expect(error_line!());

    // A result for a prompt we never issued.
    cm.permission_result(
        request_id + 17,
        vec![(DeviceKind::Microphone, PermissionStatus::Granted)],
    );
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ringing);
    assert_eq!(context.platform().accepts_sent(), 0);
}

#[test]
fn inbound_caller_cancels_during_permission_prompt() {
    test_init();

    let context = TestContext::with_devices(SimDevices::new());
    let cm = context.cm();
    let call_id = start_inbound_call(&context, CallMediaType::Audio);

    cm.accept_call().expect(error_line!());
    cm.synchronize().expect(error_line!());
    let (request_id, _) = context.devices().last_request().expect(error_line!());

    // The caller hangs up while the prompt is still showing.
    cm.received_signaling_event(call_id, SignalingEvent::Hangup {
        legacy_status: None,
    });
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ended);
    assert_eq!(snapshot.end_reason, Some(EndReason::Missed));

    // The prompt result arrives too late and changes nothing.
    cm.permission_result(
        request_id,
        vec![(DeviceKind::Microphone, PermissionStatus::Granted)],
    );
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ended);
    assert_eq!(context.platform().accepts_sent(), 0);
    assert_eq!(context.platform().chat_events().len(), 1);
}

#[test]
fn inbound_completed_call() {
    test_init();

    let context = TestContext::new();
    let cm = context.cm();
    let call_id = connect_inbound_call(&context, CallMediaType::Audio);

    cm.received_signaling_event(call_id, SignalingEvent::Hangup {
        legacy_status: None,
    });
    cm.synchronize().expect(error_line!());

    let snapshot = cm.snapshot().expect(error_line!()).expect(error_line!());
    assert_eq!(snapshot.state, CallState::Ended);
    assert_eq!(snapshot.end_reason, Some(EndReason::Completed));
    assert_eq!(
        context
            .platform()
            .event_count(ApplicationEvent::EndedRemoteHangup),
        1
    );

    let chat_events = context.platform().chat_events();
    assert_eq!(chat_events.len(), 1);
    assert_eq!(chat_events[0].outcome, CallOutcome::Completed);
    assert!(chat_events[0].duration_secs.is_some());
}
