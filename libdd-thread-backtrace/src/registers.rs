// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Uniform view over the registers a frame-pointer walk needs.
//!
//! Every architecture names these registers differently, and only some of them have a dedicated
//! link register. [`FrameRegisters`] hides that behind four accessors so the walker never has to
//! branch on the architecture.

use serde::{Deserialize, Serialize};

/// The registers consumed by the frame-pointer walker.
pub trait FrameRegisters {
    /// Address of the instruction currently executing (RIP/EIP on x86, PC on ARM).
    fn program_counter(&self) -> usize;

    /// Return address of the innermost frame, on architectures that keep it in a register
    /// (LR on ARM). `None` everywhere else.
    fn link_register(&self) -> Option<usize>;

    /// Head of the frame-pointer chain (RBP/EBP on x86, R7 on 32-bit ARM, X29 on aarch64).
    fn frame_pointer(&self) -> usize;

    /// Stack pointer (RSP/ESP on x86, SP on ARM).
    fn stack_pointer(&self) -> usize;

    /// Copies the four roles out of the architecture-specific layout.
    fn snapshot(&self) -> RegisterSnapshot {
        RegisterSnapshot {
            pc: self.program_counter(),
            lr: self.link_register(),
            fp: self.frame_pointer(),
            sp: self.stack_pointer(),
        }
    }
}

/// An architecture-neutral register snapshot.
///
/// This is a minimal representation containing only the register values, suitable for
/// async-signal-safe contexts. It can be produced from a kernel thread state, from a signal
/// handler's `ucontext_t`, or built by hand to walk a stack copied out of another process.
///
/// # Fields
///
/// - `pc`: Instruction pointer (RIP on x86_64, PC on aarch64)
/// - `lr`: Link register (LR/X30 on ARM), `None` on x86
/// - `fp`: Base/frame pointer (RBP on x86_64, FP/X29 on aarch64)
/// - `sp`: Stack pointer (RSP on x86_64, SP on aarch64)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub pc: usize,
    pub lr: Option<usize>,
    pub fp: usize,
    pub sp: usize,
}

impl FrameRegisters for RegisterSnapshot {
    fn program_counter(&self) -> usize {
        self.pc
    }

    fn link_register(&self) -> Option<usize> {
        self.lr
    }

    fn frame_pointer(&self) -> usize {
        self.fp
    }

    fn stack_pointer(&self) -> usize {
        self.sp
    }

    fn snapshot(&self) -> RegisterSnapshot {
        *self
    }
}
