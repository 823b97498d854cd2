// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `ARM_THREAD_STATE` (armv7).
//!
//! Apple's ARM ABI reserves R7 as the frame pointer (not R11 as on other ARM platforms). The
//! return address of the innermost frame lives in LR until the callee spills it into its own
//! frame record.

use super::state_count;
use crate::{FrameRegisters, ThreadState as MachThreadState};

pub const THREAD_STATE_FLAVOR: i32 = 1;
pub const THREAD_STATE_COUNT: u32 = state_count::<ThreadState>();

const FRAME_POINTER_INDEX: usize = 7;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadState {
    /// General purpose registers r0-r12.
    pub r: [u32; 13],
    pub sp: u32,
    pub lr: u32,
    pub pc: u32,
    pub cpsr: u32,
}

impl FrameRegisters for ThreadState {
    fn program_counter(&self) -> usize {
        self.pc as usize
    }

    fn link_register(&self) -> Option<usize> {
        Some(self.lr as usize)
    }

    fn frame_pointer(&self) -> usize {
        self.r[FRAME_POINTER_INDEX] as usize
    }

    fn stack_pointer(&self) -> usize {
        self.sp as usize
    }
}

impl MachThreadState for ThreadState {
    const FLAVOR: i32 = THREAD_STATE_FLAVOR;
    const COUNT: u32 = THREAD_STATE_COUNT;
}
