// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Reading a thread's saved registers.

use crate::{CaptureError, FrameRegisters};

/// A kernel thread-state layout: which flavor to request and how many 32-bit elements it spans.
/// How it maps onto the frame-walking registers, link register included, is up to its
/// [`FrameRegisters`] implementation.
pub trait ThreadState: FrameRegisters + Copy + Default {
    /// Mach `thread_state_flavor_t` selecting this layout.
    const FLAVOR: i32;
    /// Size of the layout in `natural_t` units, as passed to `thread_get_state`.
    const COUNT: u32;
}

/// Source of register snapshots for threads.
///
/// Implementations must not suspend, resume or otherwise change the scheduling state of the
/// thread they read.
pub trait RegisterStateReader {
    type Thread: Copy;
    type Registers: FrameRegisters;

    fn read_registers(&self, thread: Self::Thread) -> Result<Self::Registers, CaptureError>;
}

#[cfg(target_vendor = "apple")]
mod mach_reader {
    use super::*;
    use crate::mach::{self, mach_msg_type_number_t, natural_t, thread_act_t, KERN_SUCCESS};
    use crate::{capture_with, LiveMemory, NativeThreadState};

    /// Reads registers with `thread_get_state`, using the layout of the build target.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct MachStateReader;

    impl RegisterStateReader for MachStateReader {
        type Thread = thread_act_t;
        type Registers = NativeThreadState;

        fn read_registers(&self, thread: thread_act_t) -> Result<NativeThreadState, CaptureError> {
            read_thread_state(thread)
        }
    }

    fn read_thread_state<S: ThreadState>(
        thread: thread_act_t,
    ) -> Result<S, CaptureError> {
        let mut state = S::default();
        let mut count: mach_msg_type_number_t = S::COUNT;
        // SAFETY: `state` is a `#[repr(C)]` mirror of the layout selected by `S::FLAVOR`, and
        // `count` is its size in `natural_t` units, so the kernel writes at most that many.
        let kret = unsafe {
            mach::thread_get_state(
                thread,
                S::FLAVOR,
                &mut state as *mut S as *mut natural_t,
                &mut count,
            )
        };
        if kret != KERN_SUCCESS {
            return Err(CaptureError::StateQuery(kret));
        }
        Ok(state)
    }

    /// Fills `frames` with the backtrace of `thread` and returns how many addresses were
    /// written.
    ///
    /// `frames[0]` is the thread's program counter; on ARM `frames[1]` is its link register; the
    /// rest come from the frame-pointer chain, innermost first. A return of 0 means the register
    /// state could not be read (invalid or terminated thread), or `frames` is empty. Any other
    /// count is a successful capture, whether the chain ended or `frames` filled up.
    ///
    /// This function does not allocate and does not suspend `thread`.
    ///
    /// # Safety
    /// `thread` must not be the calling thread: the kernel would describe the frames of the
    /// state query itself, which are overwritten by the time they are walked. Use
    /// [`capture_current_thread`](crate::capture_current_thread) for the calling thread.
    ///
    /// The frame-pointer chain of `thread` is read directly from memory. The caller must ensure
    /// that it stays readable during the call: either `thread` is suspended (see
    /// [`SuspendedThread`](crate::SuspendedThread)), or the caller accepts a possibly torn result
    /// and runs the capture behind a guard against faults from a corrupted chain.
    pub unsafe fn capture(thread: thread_act_t, frames: &mut [usize]) -> usize {
        try_capture(thread, frames).unwrap_or(0)
    }

    /// Same as [`capture`], but reports why nothing was captured.
    ///
    /// # Safety
    /// See [`capture`].
    pub unsafe fn try_capture(
        thread: thread_act_t,
        frames: &mut [usize],
    ) -> Result<usize, CaptureError> {
        capture_with(&MachStateReader, LiveMemory::new(), thread, frames)
    }
}

#[cfg(target_vendor = "apple")]
pub use mach_reader::{capture, try_capture, MachStateReader};
