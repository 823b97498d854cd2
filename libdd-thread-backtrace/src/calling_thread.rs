// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Backtraces of the calling thread.
//!
//! A thread cannot usefully read its own registers from the kernel: the saved state describes the
//! frames of the query itself, which are gone (and overwritten) by the time the chain is walked.
//! The calling thread is therefore unwound from its live frames instead.

/// Fills `frames` with the return addresses of the calling thread, innermost first, starting
/// with the caller of this function. Returns the number of addresses written.
///
/// The frames of this function and of the unwinder are skipped. If this function's own frame
/// cannot be identified (no unwind information), nothing is skipped.
///
/// Unlike the register-based captures, this takes the unwinder's global lock, so it must not be
/// called from a signal handler.
#[inline(never)]
pub fn capture_current_thread(frames: &mut [usize]) -> usize {
    let capacity = frames.len();
    if capacity == 0 {
        return 0;
    }
    let own_address = capture_current_thread as usize;
    // Frames called from here have their canonical frame address below this local, this
    // function's own frame has it above.
    let marker = 0u8;
    let own_stack = std::hint::black_box(&marker) as *const u8 as usize;

    let mut count = 0;
    let mut own_frame_found = false;
    backtrace::trace(|frame| {
        if !own_frame_found {
            let cfa = frame.sp() as usize;
            own_frame_found = frame.symbol_address() as usize == own_address
                || (cfa != 0 && cfa > own_stack);
            return true;
        }
        frames[count] = frame.ip() as usize;
        count += 1;
        count < capacity
    });

    if !own_frame_found {
        backtrace::trace(|frame| {
            frames[count] = frame.ip() as usize;
            count += 1;
            count < capacity
        });
    }
    count
}
