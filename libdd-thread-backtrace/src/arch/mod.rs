// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-architecture Mach thread-state layouts.
//!
//! Each module mirrors the `*_THREAD_STATE*` structure the kernel fills for one instruction set
//! and maps its fields onto [`FrameRegisters`](crate::FrameRegisters). All four layouts are
//! plain data and compile everywhere; [`NativeThreadState`] picks the one matching the build
//! target.
//!
//! Flavors and counts are fixed per layout rather than taken from the generic machine flavor, so
//! the size handed to the kernel always matches the struct it writes into.

pub mod aarch64;
pub mod arm;
pub mod x86;
pub mod x86_64;

/// Thread-state layout of the architecture this crate is built for.
#[cfg(target_arch = "x86")]
pub type NativeThreadState = x86::ThreadState;

/// Thread-state layout of the architecture this crate is built for.
#[cfg(target_arch = "x86_64")]
pub type NativeThreadState = x86_64::ThreadState;

/// Thread-state layout of the architecture this crate is built for.
#[cfg(target_arch = "arm")]
pub type NativeThreadState = arm::ThreadState;

/// Thread-state layout of the architecture this crate is built for.
#[cfg(target_arch = "aarch64")]
pub type NativeThreadState = aarch64::ThreadState;

// There is no generic frame layout to fall back on.
#[cfg(not(any(
    target_arch = "x86",
    target_arch = "x86_64",
    target_arch = "arm",
    target_arch = "aarch64"
)))]
compile_error!("libdd_thread_backtrace only supports x86, x86_64, arm and aarch64");

/// Number of `natural_t` (32-bit) elements the kernel expects for a state layout.
pub(crate) const fn state_count<T>() -> u32 {
    (std::mem::size_of::<T>() / std::mem::size_of::<u32>()) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FrameRegisters, ThreadState};

    #[test]
    fn native_state_count_matches_layout() {
        assert_eq!(NativeThreadState::COUNT, state_count::<NativeThreadState>());
    }

    #[cfg(any(target_arch = "arm", target_arch = "aarch64"))]
    #[test]
    fn native_arm_reports_link_register() {
        let state = NativeThreadState::default();
        assert_eq!(state.link_register(), Some(0));
    }

    #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
    #[test]
    fn native_x86_has_no_link_register() {
        let state = NativeThreadState::default();
        assert_eq!(state.link_register(), None);
    }
}
