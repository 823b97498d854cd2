// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Turns a C buffer into a slice, or `None` when there is nothing to write into.
///
/// # Safety
/// A non-null `frames` must be valid for writes of `capacity` words.
unsafe fn frame_buffer<'a>(frames: *mut usize, capacity: usize) -> Option<&'a mut [usize]> {
    if frames.is_null() || capacity == 0 {
        return None;
    }
    Some(std::slice::from_raw_parts_mut(frames, capacity))
}

/// Writes the backtrace of `thread` into `frames` and returns how many addresses were written.
/// Returns 0 if `frames` is null, `capacity` is 0, or the thread's registers cannot be read.
///
/// Does not allocate, suspend the thread or take locks.
///
/// # Safety
/// `thread` must not be the calling thread, see [`ddog_backtrace_capture_current_thread`].
/// `frames` must be null or valid for writes of `capacity` words. The target thread should be
/// suspended, or the caller must tolerate a torn result; a corrupted frame chain is not
/// detected and may fault.
#[cfg(target_vendor = "apple")]
#[no_mangle]
#[must_use]
pub unsafe extern "C" fn ddog_backtrace_capture(
    thread: libdd_thread_backtrace::thread_act_t,
    frames: *mut usize,
    capacity: usize,
) -> usize {
    match frame_buffer(frames, capacity) {
        Some(frames) => libdd_thread_backtrace::capture(thread, frames),
        None => 0,
    }
}

/// Writes the backtrace of the calling thread into `frames`, innermost caller first, and returns
/// how many addresses were written. Returns 0 if `frames` is null or `capacity` is 0.
///
/// Unwinds the live stack under the unwinder's lock, so it must not be called from a signal
/// handler.
///
/// # Safety
/// `frames` must be null or valid for writes of `capacity` words.
#[no_mangle]
#[must_use]
pub unsafe extern "C" fn ddog_backtrace_capture_current_thread(
    frames: *mut usize,
    capacity: usize,
) -> usize {
    match frame_buffer(frames, capacity) {
        Some(frames) => libdd_thread_backtrace::capture_current_thread(frames),
        None => 0,
    }
}

/// Writes the backtrace of the context a signal interrupted into `frames`.
/// Returns 0 if `ucontext` or `frames` is null, or `capacity` is 0.
///
/// # Safety
/// `ucontext` must be null or the `ucontext_t` passed to an `SA_SIGINFO` handler, and `frames`
/// must be null or valid for writes of `capacity` words.
#[cfg(all(
    any(target_os = "linux", target_os = "macos"),
    any(target_arch = "x86_64", target_arch = "aarch64")
))]
#[no_mangle]
#[must_use]
pub unsafe extern "C" fn ddog_backtrace_capture_from_ucontext(
    ucontext: *const libc::c_void,
    frames: *mut usize,
    capacity: usize,
) -> usize {
    match frame_buffer(frames, capacity) {
        Some(frames) => libdd_thread_backtrace::capture_from_ucontext(ucontext.cast(), frames),
        None => 0,
    }
}
