// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `ARM_THREAD_STATE64`, in its non-opaque layout.
//!
//! The standard prologue is `stp fp, lr, [sp, #-16]!; mov fp, sp`, so each frame record is
//! `[fp] = caller fp`, `[fp + 8] = saved lr`. A leaf function may skip the record entirely, which
//! is why the live LR is reported as its own frame.

use super::state_count;
use crate::{FrameRegisters, ThreadState as MachThreadState};

pub const THREAD_STATE_FLAVOR: i32 = 6;
pub const THREAD_STATE_COUNT: u32 = state_count::<ThreadState>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadState {
    /// General purpose registers x0-x28.
    pub x: [u64; 29],
    /// Frame pointer, x29.
    pub fp: u64,
    /// Link register, x30.
    pub lr: u64,
    pub sp: u64,
    pub pc: u64,
    pub cpsr: u32,
    pub pad: u32,
}

impl FrameRegisters for ThreadState {
    fn program_counter(&self) -> usize {
        self.pc as usize
    }

    fn link_register(&self) -> Option<usize> {
        Some(self.lr as usize)
    }

    fn frame_pointer(&self) -> usize {
        self.fp as usize
    }

    fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

impl MachThreadState for ThreadState {
    const FLAVOR: i32 = THREAD_STATE_FLAVOR;
    const COUNT: u32 = THREAD_STATE_COUNT;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_matches_kernel_header() {
        // ARM_THREAD_STATE64_COUNT
        assert_eq!(THREAD_STATE_COUNT, 68);
    }

    #[test]
    fn uses_dedicated_fp_and_lr() {
        let mut state = ThreadState {
            fp: 0x16f0_0040,
            lr: 0x1_0000_0f00,
            sp: 0x16f0_0000,
            pc: 0x1_0000_1000,
            ..Default::default()
        };
        state.x[28] = 0xdead;
        assert_eq!(state.frame_pointer(), 0x16f0_0040);
        assert_eq!(state.link_register(), Some(0x1_0000_0f00u64 as usize));
        assert_eq!(state.program_counter(), 0x1_0000_1000u64 as usize);
        assert_eq!(state.stack_pointer(), 0x16f0_0000);
    }
}
