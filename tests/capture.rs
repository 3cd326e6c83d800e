// Copyright (c) SimpleStaking and Tezedge Contributors
// SPDX-License-Identifier: MIT

use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};
use pxmonitor::{
    capture::{CaptureCommand, CaptureSession, CaptureStatus, StartOutcome, StopOutcome},
    store::RetainedStore,
};

const PSEUDO_TSHARK: &str = env!("CARGO_BIN_EXE_pseudo-tshark");

fn session(args: &[&str]) -> (CaptureSession, Arc<RetainedStore>) {
    let store = Arc::new(RetainedStore::default());
    let command = CaptureCommand::new(PSEUDO_TSHARK, args.iter().copied());
    (CaptureSession::new(command, store.clone(), 100), store)
}

fn wait_for<F>(condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    false
}

#[test]
fn complete_capture() {
    let (session, store) = session(&["--count", "250"]);
    assert_eq!(session.start(), StartOutcome::Started);
    session.join();

    assert_eq!(session.status(), CaptureStatus::Idle);
    assert_eq!(store.record_count(), 250);
    assert_eq!(store.snapshot_count(), 2);
    assert!(store.recent_snapshots(10).iter().all(|s| s.packet_count == 100));
}

#[test]
fn malformed_lines_are_skipped() {
    let (session, store) = session(&["--count", "300", "--malformed-every", "3"]);
    assert_eq!(session.start(), StartOutcome::Started);
    session.join();

    assert_eq!(store.record_count(), 200);
    assert_eq!(store.snapshot_count(), 2);
}

#[test]
fn crash_leaves_idle() {
    let (session, store) = session(&["--count", "120", "--exit-code", "3"]);
    assert_eq!(session.start(), StartOutcome::Started);
    session.join();

    // everything printed before the crash is kept
    assert_eq!(session.status(), CaptureStatus::Idle);
    assert_eq!(store.record_count(), 120);
    assert_eq!(store.snapshot_count(), 1);
    assert_eq!(session.stop(), StopOutcome::NotCapturing);
}

#[test]
fn second_start_is_rejected() {
    let (session, store) = session(&["--count", "0", "--follow", "--interval-ms", "1"]);
    assert_eq!(session.start(), StartOutcome::Started);
    assert_eq!(session.start(), StartOutcome::AlreadyCapturing);
    assert_eq!(session.status(), CaptureStatus::Capturing);

    assert!(wait_for(|| store.snapshot_count() >= 1));
    assert_eq!(session.stop(), StopOutcome::Stopped);
    assert_eq!(session.status(), CaptureStatus::Stopped);
    session.join();

    assert_eq!(session.status(), CaptureStatus::Stopped);
    assert!(store.record_count() >= 100);
    assert_eq!(session.stop(), StopOutcome::NotCapturing);
}

#[test]
fn restart_after_stop() {
    let (session, store) = session(&["--count", "0", "--follow", "--interval-ms", "1"]);
    assert_eq!(session.start(), StartOutcome::Started);
    assert!(wait_for(|| store.snapshot_count() >= 1));
    assert_eq!(session.stop(), StopOutcome::Stopped);

    let before = store.snapshot_count();
    assert_eq!(session.start(), StartOutcome::Started);
    assert!(wait_for(|| store.snapshot_count() > before));
    assert_eq!(session.stop(), StopOutcome::Stopped);
    session.join();
    assert_eq!(session.status(), CaptureStatus::Stopped);
}

#[test]
fn stop_while_idle() {
    let (session, _) = session(&["--count", "1"]);
    assert_eq!(session.stop(), StopOutcome::NotCapturing);
    assert_eq!(session.status(), CaptureStatus::Idle);
}

#[test]
fn spawn_failure() {
    let store = Arc::new(RetainedStore::default());
    let command = CaptureCommand::tshark("/nonexistent/tshark", "eth0");
    let session = CaptureSession::new(command, store, 100);

    match session.start() {
        StartOutcome::Failed { reason } => assert!(reason.contains("/nonexistent/tshark")),
        outcome => panic!("unexpected outcome {:?}", outcome),
    }
    assert_eq!(session.status(), CaptureStatus::Idle);
    session.join();
}

#[test]
fn restart_while_old_output_is_open() {
    // killing the shell leaves the background sleep holding the pipe
    let store = Arc::new(RetainedStore::default());
    let command = CaptureCommand::new("sh", vec!["-c", "sleep 3 & wait"]);
    let session = CaptureSession::new(command, store.clone(), 100);
    assert_eq!(session.start(), StartOutcome::Started);
    thread::sleep(Duration::from_millis(200));
    assert_eq!(session.stop(), StopOutcome::Stopped);

    let begin = Instant::now();
    assert_eq!(session.start(), StartOutcome::Started);
    assert_eq!(session.status(), CaptureStatus::Capturing);
    assert_eq!(session.stop(), StopOutcome::Stopped);
    assert!(begin.elapsed() < Duration::from_secs(2));

    session.join();
    assert_eq!(store.record_count(), 0);
}
