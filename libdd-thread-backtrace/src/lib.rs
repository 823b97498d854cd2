// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Frame-pointer backtraces for threads of the current process.
//!
//! The core of this crate is [`capture`]: given a thread handle and a caller-owned buffer, it
//! reads the thread's saved registers from the kernel and follows the frame-pointer chain,
//! writing return addresses innermost-first. It never allocates, never suspends the target, and
//! never logs, so it can run from a signal handler or a watchdog thread. The target must not be
//! the calling thread: its own backtrace comes from [`capture_current_thread`], which unwinds the
//! live frames instead.
//!
//! The walk itself ([`walk_frame_chain`]) is independent of where the registers and the stack
//! memory come from; a snapshot can also be taken from a signal handler's `ucontext_t`
//! ([`capture_from_ucontext`]) or built by hand and walked over a copied stack ([`StackSlice`]).
//!
//! On top of that, the `Backtracer` (Apple platforms) adds thread enumeration, optional
//! suspension, symbol resolution and formatting. Calling `record_main_thread` during setup lets
//! it trace the main thread later from any other thread.
//!
//! # Limitations
//!
//! Frames compiled without frame pointers are skipped or end the walk. The live memory reader
//! only rejects null links: a corrupted chain that points into unmapped memory faults the
//! process. Installing a guard against that is up to the caller.

mod arch;
mod calling_thread;
mod configuration;
mod error;
mod frame_pointer_walker;
mod memory;
mod platform;
mod registers;
mod stacktrace;
mod thread_state;
#[cfg(all(
    any(target_os = "linux", target_os = "macos"),
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
mod ucontext;

#[cfg(target_vendor = "apple")]
mod backtracer;
#[cfg(target_vendor = "apple")]
mod mach;
#[cfg(target_vendor = "apple")]
mod thread;

pub use arch::{aarch64, arm, x86, x86_64, NativeThreadState};
pub use calling_thread::capture_current_thread;
pub use configuration::BacktraceConfiguration;
pub use error::CaptureError;
pub use frame_pointer_walker::{capture_with, walk_frame_chain, FrameChain};
pub use memory::{LiveMemory, StackMemory, StackSlice, WORD_SIZE};
pub use platform::MAX_BACKTRACE_FRAMES;
pub use registers::{FrameRegisters, RegisterSnapshot};
pub use stacktrace::{format_thread_backtraces, StackFrame, StackTrace, ThreadBacktrace};
pub use thread_state::{RegisterStateReader, ThreadState};
#[cfg(all(
    any(target_os = "linux", target_os = "macos"),
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
pub use ucontext::{capture_from_ucontext, registers_from_ucontext};

#[cfg(target_vendor = "apple")]
pub use backtracer::Backtracer;
#[cfg(target_vendor = "apple")]
pub use mach::{thread_act_t, KERN_SUCCESS};
#[cfg(target_vendor = "apple")]
pub use thread::{
    current_thread, main_thread, record_main_thread, task_threads, SuspendedThread, ThreadList,
    ThreadPort,
};
#[cfg(target_vendor = "apple")]
pub use thread_state::{capture, try_capture, MachStateReader};
