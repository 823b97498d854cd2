// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Word-sized reads of (possibly untrusted) stack memory.
//!
//! The walker never dereferences a pointer itself; every access goes through [`StackMemory`].
//! [`LiveMemory`] is the only implementation that touches raw memory, and it does so in exactly
//! one place.

/// Size in bytes of a stack slot, and the offset from a frame pointer to the saved return
/// address.
pub const WORD_SIZE: usize = std::mem::size_of::<usize>();

/// Source of stack words for the frame-pointer walker.
pub trait StackMemory {
    /// Reads the machine word at `address`, or `None` if it cannot be read.
    ///
    /// Implementations must return `None` for address 0.
    fn read_word(&self, address: usize) -> Option<usize>;
}

/// Reads the memory of the current process directly.
///
/// No check beyond null is performed. A frame-pointer chain that leads into unmapped memory
/// faults the process: callers that cannot trust the chain must run the walk behind a
/// SIGSEGV/SIGBUS guard.
#[derive(Debug)]
pub struct LiveMemory {
    _private: (),
}

impl LiveMemory {
    /// # Safety
    /// Every non-null address handed to [`StackMemory::read_word`] must be readable for
    /// [`WORD_SIZE`] bytes for the lifetime of this value. In practice: the chain being walked
    /// belongs to a thread of this process that is suspended, or that the caller accepts may
    /// produce a torn (but still mapped) view.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl StackMemory for LiveMemory {
    #[inline]
    fn read_word(&self, address: usize) -> Option<usize> {
        if address == 0 {
            return None;
        }
        // SAFETY: non-null, and readability was promised when `self` was constructed. Frame
        // records of a corrupted chain need not be aligned, hence the unaligned read.
        Some(unsafe { std::ptr::read_unaligned(address as *const usize) })
    }
}

/// A copy of a stack region, addressed as it was in the thread it came from.
///
/// Reads outside the region return `None`, so a walk over a copied stack ends cleanly instead of
/// faulting.
#[derive(Debug, Clone, Copy)]
pub struct StackSlice<'a> {
    base: usize,
    words: &'a [usize],
}

impl<'a> StackSlice<'a> {
    /// `base` is the address `words[0]` had in the original stack.
    pub fn new(base: usize, words: &'a [usize]) -> Self {
        Self { base, words }
    }

    /// Views live words of this process through their own addresses.
    pub fn from_words(words: &'a [usize]) -> Self {
        Self::new(words.as_ptr() as usize, words)
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Address of the slot at `index`, `None` if it lies past the end of the address space.
    pub fn address_of(&self, index: usize) -> Option<usize> {
        index
            .checked_mul(WORD_SIZE)
            .and_then(|offset| self.base.checked_add(offset))
    }

    /// One past the last readable byte, `None` if the region ends at the top of the address
    /// space.
    pub fn end(&self) -> Option<usize> {
        self.address_of(self.words.len())
    }
}

impl StackMemory for StackSlice<'_> {
    fn read_word(&self, address: usize) -> Option<usize> {
        if address == 0 {
            return None;
        }
        let offset = address.checked_sub(self.base)?;
        if offset % WORD_SIZE != 0 {
            return None;
        }
        self.words.get(offset / WORD_SIZE).copied()
    }
}

impl<M: StackMemory + ?Sized> StackMemory for &M {
    fn read_word(&self, address: usize) -> Option<usize> {
        (**self).read_word(address)
    }
}
