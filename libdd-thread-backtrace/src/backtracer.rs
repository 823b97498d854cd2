// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::mach::thread_act_t;
use crate::{
    capture, capture_current_thread, current_thread, format_thread_backtraces, main_thread,
    task_threads, BacktraceConfiguration, StackTrace, SuspendedThread, ThreadBacktrace,
    ThreadPort,
};
use anyhow::Context;

/// Captures and symbolizes backtraces according to a [`BacktraceConfiguration`].
///
/// Unlike [`capture`], this allocates, logs and may suspend threads, so it must not be used from
/// a signal handler.
#[derive(Debug, Clone, Default)]
pub struct Backtracer {
    config: BacktraceConfiguration,
}

impl Backtracer {
    pub fn new(config: BacktraceConfiguration) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktraceConfiguration {
        &self.config
    }

    /// Backtrace of one thread. An empty trace means its state could not be read.
    ///
    /// The calling thread is unwound live, other threads are walked from their saved registers.
    pub fn backtrace_thread(&self, thread: thread_act_t) -> StackTrace {
        let is_current = current_thread().as_raw() == thread;
        // Nothing may allocate while the target is suspended: it could hold the allocator lock.
        let mut frames = vec![0usize; self.config.max_frames()];
        let count = if is_current {
            capture_current_thread(&mut frames)
        } else {
            let suspended = if self.config.suspend_threads() {
                // SAFETY: not the calling thread, and the caller keeps the port alive.
                match unsafe { SuspendedThread::from_raw(thread) } {
                    Ok(guard) => Some(guard),
                    Err(e) => {
                        tracing::debug!(thread, "Capturing without suspension: {e:#}");
                        None
                    }
                }
            } else {
                None
            };
            // SAFETY: not the calling thread. It is suspended, or the configuration accepts a
            // torn view of a running thread.
            let count = unsafe { capture(thread, &mut frames) };
            drop(suspended);
            count
        };
        if count == 0 {
            tracing::debug!(thread, "No frames captured");
            return StackTrace::empty();
        }

        let mut stack = StackTrace::from_addresses(&frames[..count], frames.len());
        self.symbolize(&mut stack);
        stack
    }

    pub fn backtrace_current_thread(&self) -> ThreadBacktrace {
        let current = current_thread();
        ThreadBacktrace {
            index: 0,
            thread_id: current.thread_id(),
            name: current.name(),
            stack: self.backtrace_thread(current.as_raw()),
        }
    }

    /// Backtrace of the thread saved by [`record_main_thread`](crate::record_main_thread).
    pub fn backtrace_main_thread(&self) -> anyhow::Result<ThreadBacktrace> {
        let main = main_thread().context("The main thread was not recorded")?;
        Ok(ThreadBacktrace {
            index: 0,
            thread_id: main.thread_id(),
            name: main.name(),
            stack: self.backtrace_thread(main.as_raw()),
        })
    }

    /// Backtraces of every thread in the task. Falls back to the current thread alone when the
    /// threads cannot be enumerated.
    pub fn backtrace_all_threads(&self) -> Vec<ThreadBacktrace> {
        let threads = match task_threads() {
            Ok(threads) => threads,
            Err(e) => {
                tracing::warn!("Falling back to the current thread: {e:#}");
                return vec![self.backtrace_current_thread()];
            }
        };
        tracing::debug!(count = threads.len(), "Capturing all threads");

        threads
            .iter()
            .enumerate()
            .map(|(index, thread)| {
                let port = ThreadPort::borrowed(thread);
                ThreadBacktrace {
                    index,
                    thread_id: port.thread_id(),
                    name: port.name(),
                    stack: self.backtrace_thread(thread),
                }
            })
            .collect()
    }

    /// A textual report of every thread.
    pub fn report_all_threads(&self) -> String {
        format_thread_backtraces(&self.backtrace_all_threads())
    }

    fn symbolize(&self, stack: &mut StackTrace) {
        if !self.config.resolve_symbols() {
            return;
        }
        if let Err(e) = stack.resolve_names() {
            tracing::debug!("Partial symbolization: {e:#}");
        }
        #[cfg(feature = "demangler")]
        self.demangle(stack);
    }

    #[cfg(feature = "demangler")]
    fn demangle(&self, stack: &mut StackTrace) {
        if !self.config.demangle_names() {
            return;
        }
        if let Err(e) = stack.demangle_names() {
            tracing::debug!("Partial demangling: {e:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg_attr(miri, ignore)]
    fn current_thread_has_frames() {
        let config = BacktraceConfiguration::new(64, false, false, false).unwrap();
        let trace = Backtracer::new(config).backtrace_current_thread();
        assert!(!trace.stack.is_empty());
        assert!(trace.stack.frames.len() <= 64);
        assert_ne!(trace.thread_id, 0);
    }

    #[inline(never)]
    fn traced_function(backtracer: &Backtracer) -> ThreadBacktrace {
        std::hint::black_box(backtracer.backtrace_current_thread())
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn current_thread_trace_names_its_callers() {
        let config = BacktraceConfiguration::new(64, false, false, false).unwrap();
        let trace = traced_function(&Backtracer::new(config));
        let mut names = Vec::new();
        for frame in &trace.stack.frames {
            backtrace::resolve(frame.ip as *mut std::ffi::c_void, |symbol| {
                if let Some(name) = symbol.name() {
                    names.push(name.to_string());
                }
            });
        }
        assert!(
            names.iter().any(|name| name.contains("traced_function")),
            "{names:?}"
        );
        assert!(
            names
                .iter()
                .any(|name| name.contains("current_thread_trace_names_its_callers")),
            "{names:?}"
        );
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn unrecorded_main_thread_is_an_error() {
        assert!(Backtracer::default().backtrace_main_thread().is_err());
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn report_lists_every_thread() {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        let parked = std::thread::spawn(move || rx.recv());

        let report = Backtracer::default().report_all_threads();
        assert!(report.starts_with("Thread 0"));
        assert!(report.contains("\n\nThread 1"));

        tx.send(()).unwrap();
        parked.join().unwrap().unwrap();
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn invalid_port_gives_empty_trace() {
        let config = BacktraceConfiguration::new(8, false, false, true).unwrap();
        assert!(Backtracer::new(config).backtrace_thread(0).is_empty());
    }
}
