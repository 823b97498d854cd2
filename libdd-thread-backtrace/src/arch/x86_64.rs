// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `x86_THREAD_STATE64`, as declared in `<mach/i386/_structs.h>`.
//!
//! There is no link register: `call` pushes the return address, and a standard prologue saves
//! the caller's RBP right below it, so each frame record is `[rbp] = caller rbp`,
//! `[rbp + 8] = return address`.

use super::state_count;
use crate::{FrameRegisters, ThreadState as MachThreadState};

pub const THREAD_STATE_FLAVOR: i32 = 4;
pub const THREAD_STATE_COUNT: u32 = state_count::<ThreadState>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadState {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rdi: u64,
    pub rsi: u64,
    pub rbp: u64,
    pub rsp: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rip: u64,
    pub rflags: u64,
    pub cs: u64,
    pub fs: u64,
    pub gs: u64,
}

impl FrameRegisters for ThreadState {
    fn program_counter(&self) -> usize {
        self.rip as usize
    }

    fn link_register(&self) -> Option<usize> {
        None
    }

    fn frame_pointer(&self) -> usize {
        self.rbp as usize
    }

    fn stack_pointer(&self) -> usize {
        self.rsp as usize
    }
}

impl MachThreadState for ThreadState {
    const FLAVOR: i32 = THREAD_STATE_FLAVOR;
    const COUNT: u32 = THREAD_STATE_COUNT;
}
