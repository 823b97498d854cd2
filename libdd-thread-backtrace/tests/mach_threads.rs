// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg(target_vendor = "apple")]

use libdd_thread_backtrace::{
    capture, current_thread, try_capture, CaptureError, SuspendedThread, ThreadPort,
};
use std::os::unix::thread::JoinHandleExt;
use std::sync::mpsc;

/// Runs `test` against a spawned thread blocked in a channel receive, then lets it exit.
fn with_parked_thread(test: impl FnOnce(&ThreadPort)) {
    let (ready_tx, ready_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let handle = std::thread::spawn(move || {
        ready_tx.send(()).unwrap();
        release_rx.recv().unwrap();
    });
    ready_rx.recv().unwrap();

    // SAFETY: the thread is released and joined only after `port` is dropped.
    let port = unsafe { ThreadPort::from_pthread(handle.as_pthread_t()) };
    test(&port);
    drop(port);

    release_tx.send(()).unwrap();
    handle.join().unwrap();
}

#[test]
#[cfg_attr(miri, ignore)]
fn suspended_thread_captures_are_repeatable() {
    with_parked_thread(|port| {
        let suspended = SuspendedThread::new(port).unwrap();
        let mut first = [0usize; 64];
        let mut second = [0usize; 64];
        // SAFETY: the thread stays suspended for both walks.
        let first_count = unsafe { capture(suspended.as_raw(), &mut first) };
        let second_count = unsafe { capture(suspended.as_raw(), &mut second) };
        drop(suspended);

        assert!(first_count >= 2);
        assert_eq!(first_count, second_count);
        assert_eq!(first[..first_count], second[..second_count]);
        assert!(first[..first_count].iter().all(|&address| address != 0));
    });
}

#[test]
#[cfg_attr(miri, ignore)]
fn single_slot_holds_the_program_counter() {
    with_parked_thread(|port| {
        let suspended = SuspendedThread::new(port).unwrap();
        let mut full = [0usize; 64];
        let mut single = [0usize; 1];
        // SAFETY: the thread stays suspended for both walks.
        let full_count = unsafe { capture(suspended.as_raw(), &mut full) };
        let single_count = unsafe { capture(suspended.as_raw(), &mut single) };
        drop(suspended);

        assert!(full_count >= 1);
        assert_eq!(single_count, 1);
        assert_eq!(single[0], full[0]);
    });
}

#[test]
#[cfg_attr(miri, ignore)]
fn empty_buffer_is_rejected_before_the_query() {
    with_parked_thread(|port| {
        let mut frames: [usize; 0] = [];
        // SAFETY: an empty buffer is never written and no memory is read.
        assert_eq!(unsafe { capture(port.as_raw(), &mut frames) }, 0);
        assert_eq!(
            unsafe { try_capture(port.as_raw(), &mut frames) },
            Err(CaptureError::ZeroCapacity)
        );
    });
}

#[test]
#[cfg_attr(miri, ignore)]
fn terminated_thread_yields_nothing() {
    // The spawned thread hands back its own port, keeping a send right past its exit.
    let port = std::thread::spawn(current_thread).join().unwrap();
    let mut frames = [0usize; 16];
    // SAFETY: the state query fails before any memory is read.
    assert_eq!(unsafe { capture(port.as_raw(), &mut frames) }, 0);
    assert!(matches!(
        unsafe { try_capture(port.as_raw(), &mut frames) },
        Err(CaptureError::StateQuery(_))
    ));
    assert!(frames.iter().all(|&slot| slot == 0));
}

#[test]
#[cfg_attr(miri, ignore)]
fn invalid_port_yields_nothing() {
    let mut frames = [0usize; 16];
    // SAFETY: the state query fails before any memory is read.
    assert_eq!(unsafe { capture(0x7fff_fff0, &mut frames) }, 0);
}
