// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Register snapshots from signal-handler contexts.
//!
//! A signal handler installed with `SA_SIGINFO` receives the interrupted thread's registers as a
//! `ucontext_t`. Walking from there works the same as from a Mach thread state, and is the only
//! register source available on Linux.

use crate::{walk_frame_chain, CaptureError, LiveMemory, RegisterSnapshot};
use libc::ucontext_t;

/// Extracts the frame-walking registers from a signal context.
///
/// # Safety
/// `ucontext` must be null or point to a valid `ucontext_t`, such as the third argument of an
/// `SA_SIGINFO` signal handler.
pub unsafe fn registers_from_ucontext(
    ucontext: *const ucontext_t,
) -> Result<RegisterSnapshot, CaptureError> {
    if ucontext.is_null() {
        return Err(CaptureError::NullContext);
    }
    Ok(extract_registers(&*ucontext))
}

/// Walks the frame chain of the context a signal interrupted, writing return addresses into
/// `frames`. Returns 0 for a null context or an empty buffer.
///
/// # Safety
/// Same as [`registers_from_ucontext`]. In addition the interrupted thread's frame chain is read
/// directly from memory; see [`LiveMemory::new`].
pub unsafe fn capture_from_ucontext(ucontext: *const ucontext_t, frames: &mut [usize]) -> usize {
    if frames.is_empty() {
        return 0;
    }
    match registers_from_ucontext(ucontext) {
        Ok(registers) => walk_frame_chain(&registers, LiveMemory::new(), frames),
        Err(_) => 0,
    }
}

#[cfg(all(target_os = "linux", target_arch = "x86_64"))]
fn extract_registers(ucontext: &ucontext_t) -> RegisterSnapshot {
    let gregs = &ucontext.uc_mcontext.gregs;
    RegisterSnapshot {
        pc: gregs[libc::REG_RIP as usize] as usize,
        lr: None,
        fp: gregs[libc::REG_RBP as usize] as usize,
        sp: gregs[libc::REG_RSP as usize] as usize,
    }
}

#[cfg(all(target_os = "linux", target_arch = "aarch64"))]
fn extract_registers(ucontext: &ucontext_t) -> RegisterSnapshot {
    let mcontext = &ucontext.uc_mcontext;
    RegisterSnapshot {
        pc: mcontext.pc as usize,
        lr: Some(mcontext.regs[30] as usize),
        fp: mcontext.regs[29] as usize,
        sp: mcontext.sp as usize,
    }
}

// On MacOS, the actual machine context is behind a second pointer.
#[cfg(all(target_os = "macos", target_arch = "x86_64"))]
fn extract_registers(ucontext: &ucontext_t) -> RegisterSnapshot {
    // SAFETY: the kernel always provides `uc_mcontext` for signal contexts.
    let ss = unsafe { &(*ucontext.uc_mcontext).__ss };
    RegisterSnapshot {
        pc: ss.__rip as usize,
        lr: None,
        fp: ss.__rbp as usize,
        sp: ss.__rsp as usize,
    }
}

#[cfg(all(target_os = "macos", target_arch = "aarch64"))]
fn extract_registers(ucontext: &ucontext_t) -> RegisterSnapshot {
    // SAFETY: the kernel always provides `uc_mcontext` for signal contexts.
    let ss = unsafe { &(*ucontext.uc_mcontext).__ss };
    RegisterSnapshot {
        pc: ss.__pc as usize,
        lr: Some(ss.__lr as usize),
        fp: ss.__fp as usize,
        sp: ss.__sp as usize,
    }
}
