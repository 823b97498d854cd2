// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `x86_THREAD_STATE32`. Same frame convention as x86_64 with 4-byte words.

use super::state_count;
use crate::{FrameRegisters, ThreadState as MachThreadState};

pub const THREAD_STATE_FLAVOR: i32 = 1;
pub const THREAD_STATE_COUNT: u32 = state_count::<ThreadState>();

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadState {
    pub eax: u32,
    pub ebx: u32,
    pub ecx: u32,
    pub edx: u32,
    pub edi: u32,
    pub esi: u32,
    pub ebp: u32,
    pub esp: u32,
    pub ss: u32,
    pub eflags: u32,
    pub eip: u32,
    pub cs: u32,
    pub ds: u32,
    pub es: u32,
    pub fs: u32,
    pub gs: u32,
}

impl FrameRegisters for ThreadState {
    fn program_counter(&self) -> usize {
        self.eip as usize
    }

    fn link_register(&self) -> Option<usize> {
        None
    }

    fn frame_pointer(&self) -> usize {
        self.ebp as usize
    }

    fn stack_pointer(&self) -> usize {
        self.esp as usize
    }
}

impl MachThreadState for ThreadState {
    const FLAVOR: i32 = THREAD_STATE_FLAVOR;
    const COUNT: u32 = THREAD_STATE_COUNT;
}
