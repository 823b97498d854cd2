// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Thread handles, enumeration and suspension on Apple platforms.

use crate::mach::{self, thread_act_t, vm_address_t, vm_size_t, KERN_SUCCESS, MACH_PORT_NULL};
use std::ffi::CStr;
use std::marker::PhantomData;
use std::sync::OnceLock;

static MAIN_THREAD: OnceLock<ThreadPort> = OnceLock::new();

/// A Mach thread port.
///
/// Ports obtained from the kernel (`mach_thread_self`, `task_threads`) carry a send right that is
/// released on drop. Ports borrowed from a pthread do not.
#[derive(Debug)]
pub struct ThreadPort {
    port: thread_act_t,
    owned: bool,
}

impl ThreadPort {
    /// Borrows the port of a running pthread.
    ///
    /// # Safety
    /// `thread` must be a live pthread of this process, and must outlive the returned value.
    pub unsafe fn from_pthread(thread: libc::pthread_t) -> Self {
        let port = mach::pthread_mach_thread_np(thread);
        Self { port, owned: false }
    }

    /// Wraps a port whose send right is managed elsewhere, such as an entry of a [`ThreadList`].
    pub fn borrowed(port: thread_act_t) -> Self {
        Self { port, owned: false }
    }

    /// Takes ownership of a send right, releasing it on drop.
    ///
    /// # Safety
    /// `port` must be a send right of this task that nothing else releases.
    pub unsafe fn from_raw_owned(port: thread_act_t) -> Self {
        Self { port, owned: true }
    }

    pub fn as_raw(&self) -> thread_act_t {
        self.port
    }

    /// Whether this is the calling thread.
    pub fn is_current(&self) -> bool {
        // `mach_thread_self` hands out a new send right on every call.
        let current = current_thread();
        current.port == self.port
    }

    /// Kernel-wide identifier of the thread, or 0 when it cannot be queried.
    pub fn thread_id(&self) -> u64 {
        let pthread = self.pthread();
        if pthread.is_null() {
            return 0;
        }
        let mut id = 0u64;
        // SAFETY: `pthread` was just returned by the system for a live thread.
        if unsafe { libc::pthread_threadid_np(pthread, &mut id) } != 0 {
            return 0;
        }
        id
    }

    /// The pthread name, if the thread is a pthread and has a non-empty name.
    pub fn name(&self) -> Option<String> {
        let pthread = self.pthread();
        if pthread.is_null() {
            return None;
        }
        let mut buffer = [0 as libc::c_char; 64];
        // SAFETY: the buffer length is passed along, and the result is always NUL-terminated.
        let rc = unsafe { libc::pthread_getname_np(pthread, buffer.as_mut_ptr(), buffer.len()) };
        if rc != 0 {
            return None;
        }
        // SAFETY: pthread_getname_np wrote a NUL-terminated string into `buffer`.
        let name = unsafe { CStr::from_ptr(buffer.as_ptr()) };
        name.to_str()
            .ok()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
    }

    fn pthread(&self) -> libc::pthread_t {
        // SAFETY: only looks the port up in the pthread list.
        unsafe { mach::pthread_from_mach_thread_np(self.port) }
    }
}

impl Drop for ThreadPort {
    fn drop(&mut self) {
        if !self.owned || self.port == MACH_PORT_NULL {
            return;
        }
        // SAFETY: we own exactly one send right on `port`.
        let kret = unsafe { mach::mach_port_deallocate(mach::mach_task_self(), self.port) };
        if kret != KERN_SUCCESS {
            tracing::debug!(port = self.port, kret, "Failed to release thread port");
        }
    }
}

/// The port of the calling thread.
pub fn current_thread() -> ThreadPort {
    // SAFETY: mach_thread_self returns a fresh send right that we now own.
    unsafe { ThreadPort::from_raw_owned(mach::mach_thread_self()) }
}

/// Records the calling thread as the main thread, keeping a send right on its port for the life
/// of the process. Must be called from the main thread, typically during setup; later calls
/// return the recorded port.
pub fn record_main_thread() -> anyhow::Result<&'static ThreadPort> {
    if let Some(port) = MAIN_THREAD.get() {
        return Ok(port);
    }
    // SAFETY: only reads the pthread of the calling thread.
    let is_main = unsafe { mach::pthread_main_np() } != 0;
    anyhow::ensure!(is_main, "The main thread must be recorded from the main thread");
    Ok(MAIN_THREAD.get_or_init(current_thread))
}

/// The port saved by [`record_main_thread`], if it was called.
pub fn main_thread() -> Option<&'static ThreadPort> {
    MAIN_THREAD.get()
}

/// The threads of the current task at the time of the call.
///
/// Holds a send right on each thread and the kernel-allocated port array; both are released on
/// drop.
#[derive(Debug)]
pub struct ThreadList {
    ports: *mut thread_act_t,
    len: usize,
}

impl ThreadList {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The raw ports, in kernel order.
    pub fn as_slice(&self) -> &[thread_act_t] {
        if self.ports.is_null() {
            return &[];
        }
        // SAFETY: task_threads returned an array of `len` ports that lives until drop.
        unsafe { std::slice::from_raw_parts(self.ports, self.len) }
    }

    pub fn iter(&self) -> std::iter::Copied<std::slice::Iter<'_, thread_act_t>> {
        self.as_slice().iter().copied()
    }
}

impl<'a> IntoIterator for &'a ThreadList {
    type Item = thread_act_t;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, thread_act_t>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Drop for ThreadList {
    fn drop(&mut self) {
        let task = mach::mach_task_self();
        for &port in self.as_slice() {
            // SAFETY: task_threads gave us one send right per entry.
            unsafe { mach::mach_port_deallocate(task, port) };
        }
        if !self.ports.is_null() {
            let size = self.len * std::mem::size_of::<thread_act_t>();
            // SAFETY: the array was allocated by the kernel in our address space for us.
            let kret = unsafe {
                mach::vm_deallocate(task, self.ports as vm_address_t, size as vm_size_t)
            };
            if kret != KERN_SUCCESS {
                tracing::debug!(kret, "Failed to release the thread list");
            }
        }
    }
}

/// Enumerates the threads of the current task.
pub fn task_threads() -> anyhow::Result<ThreadList> {
    let mut ports: *mut thread_act_t = std::ptr::null_mut();
    let mut count: mach::mach_msg_type_number_t = 0;
    // SAFETY: both out-pointers are valid; on success the kernel hands us the array.
    let kret = unsafe { mach::task_threads(mach::mach_task_self(), &mut ports, &mut count) };
    anyhow::ensure!(
        kret == KERN_SUCCESS,
        "task_threads failed with kern_return_t {kret}"
    );
    Ok(ThreadList {
        ports,
        len: count as usize,
    })
}

/// Keeps a thread suspended until dropped.
///
/// Suspending the calling thread would deadlock, so [`SuspendedThread::new`] refuses it.
#[derive(Debug)]
pub struct SuspendedThread<'a> {
    thread: thread_act_t,
    _port: PhantomData<&'a ThreadPort>,
}

impl<'a> SuspendedThread<'a> {
    pub fn new(thread: &'a ThreadPort) -> anyhow::Result<Self> {
        anyhow::ensure!(!thread.is_current(), "Refusing to suspend the current thread");
        // SAFETY: `thread` is not the calling thread, so it cannot block us while suspended.
        unsafe { Self::from_raw(thread.as_raw()) }
    }

    /// Suspends a raw thread port.
    ///
    /// # Safety
    /// `thread` must not be the calling thread, and must stay valid for the lifetime `'a`.
    pub unsafe fn from_raw(thread: thread_act_t) -> anyhow::Result<Self> {
        let kret = mach::thread_suspend(thread);
        anyhow::ensure!(
            kret == KERN_SUCCESS,
            "thread_suspend failed with kern_return_t {kret}"
        );
        Ok(Self {
            thread,
            _port: PhantomData,
        })
    }

    pub fn as_raw(&self) -> thread_act_t {
        self.thread
    }
}

impl Drop for SuspendedThread<'_> {
    fn drop(&mut self) {
        // SAFETY: balances the successful thread_suspend from construction.
        let kret = unsafe { mach::thread_resume(self.thread) };
        if kret != KERN_SUCCESS {
            tracing::warn!(thread = self.thread, kret, "Failed to resume thread");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(miri, ignore)]
    fn current_thread_is_listed() {
        let current = current_thread();
        assert!(current.is_current());
        let threads = task_threads().unwrap();
        assert!(!threads.is_empty());
        assert!(threads.iter().any(|port| port == current.as_raw()));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn refuses_to_suspend_current_thread() {
        let current = current_thread();
        assert!(SuspendedThread::new(&current).is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn pthread_port_resolves_identity() {
        // SAFETY: the calling thread outlives `port`.
        let port = unsafe { ThreadPort::from_pthread(libc::pthread_self()) };
        assert!(port.is_current());
        assert_ne!(port.thread_id(), 0);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn main_thread_is_not_recorded_from_a_worker() {
        // Test functions run on worker threads.
        let recorded = std::thread::spawn(|| record_main_thread().map(ThreadPort::as_raw))
            .join()
            .unwrap();
        assert!(recorded.is_err());
        assert!(main_thread().is_none());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn reads_thread_name() {
        let handle = std::thread::Builder::new()
            .name("bt-named".to_string())
            .spawn(|| current_thread().name())
            .unwrap();
        assert_eq!(handle.join().unwrap(), Some("bt-named".to_string()));
    }
}
