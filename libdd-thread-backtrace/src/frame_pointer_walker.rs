// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Frame-pointer stack walking.
//!
//! A function built with frame pointers pushes a two-word record on entry and points the frame
//! pointer at it. The records form a linked list through the stack:
//!
//! ```text
//!   higher addresses
//!   ...
//!   [record B + word]  return address into A
//!   [record B]         0 (outermost) or record A      <-+
//!   ...                                               |
//!   [record C + word]  return address into B          |
//!   [record C]         record B ----------------------+
//!   lower addresses                                   ^ fp
//! ```
//!
//! Every frame record is a `(saved fp, return address)` pair at `[fp]` and `[fp + word]`. On ARM
//! the return address of the innermost frame is still in LR, so it is emitted right after the
//! PC.
//!
//! Nothing here allocates, locks or logs: the walk is safe to run from a signal handler as long
//! as the [`StackMemory`] it is given is.

use crate::{CaptureError, FrameRegisters, RegisterStateReader, StackMemory, WORD_SIZE};

/// Iterator over the return addresses of a frame-pointer chain, innermost first.
///
/// The iterator ends at the first null link, or at the first record that cannot be read. It does
/// not detect cycles: a self-referencing chain yields forever, so bound it (e.g. with `take`).
#[derive(Debug, Clone)]
pub struct FrameChain<M> {
    memory: M,
    cursor: usize,
}

impl<M: StackMemory> FrameChain<M> {
    pub fn new(memory: M, frame_pointer: usize) -> Self {
        Self {
            memory,
            cursor: frame_pointer,
        }
    }

    /// Frame pointer the next record will be read from.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl<M: StackMemory> Iterator for FrameChain<M> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == 0 {
            return None;
        }
        let record = self.cursor;
        // Stop rather than wrap if the record straddles the end of the address space.
        let return_slot = record.checked_add(WORD_SIZE);
        let (previous, return_address) = match return_slot {
            Some(slot) => (self.memory.read_word(record), self.memory.read_word(slot)),
            None => (None, None),
        };
        match (previous, return_address) {
            (Some(previous), Some(return_address)) => {
                self.cursor = previous;
                Some(return_address)
            }
            _ => {
                self.cursor = 0;
                None
            }
        }
    }
}

/// Fills `frames` with the call chain described by `registers`, innermost first, and returns
/// the number of addresses written.
///
/// `frames[0]` is the program counter. If the registers carry a link register it comes next.
/// The rest are the return addresses found by following the frame-pointer chain in `memory`
/// until a null link or until `frames` is full; the two cases are not distinguished.
pub fn walk_frame_chain<R, M>(registers: &R, memory: M, frames: &mut [usize]) -> usize
where
    R: FrameRegisters + ?Sized,
    M: StackMemory,
{
    let capacity = frames.len();
    if capacity == 0 {
        return 0;
    }

    let mut count = 0;
    frames[count] = registers.program_counter();
    count += 1;

    if let Some(lr) = registers.link_register() {
        if count < capacity {
            frames[count] = lr;
            count += 1;
        }
    }

    let chain = FrameChain::new(memory, registers.frame_pointer());
    for (slot, return_address) in frames[count..].iter_mut().zip(chain) {
        *slot = return_address;
        count += 1;
    }
    count
}

/// Reads the registers of `thread` through `reader` and walks its frame chain in `memory`.
///
/// An empty `frames` is rejected before the reader is consulted.
pub fn capture_with<R, M>(
    reader: &R,
    memory: M,
    thread: R::Thread,
    frames: &mut [usize],
) -> Result<usize, CaptureError>
where
    R: RegisterStateReader + ?Sized,
    M: StackMemory,
{
    if frames.is_empty() {
        return Err(CaptureError::ZeroCapacity);
    }
    let registers = reader.read_registers(thread)?;
    Ok(walk_frame_chain(&registers, memory, frames))
}
