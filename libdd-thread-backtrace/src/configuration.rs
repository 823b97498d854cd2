// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0
use crate::MAX_BACKTRACE_FRAMES;
use serde::{Deserialize, Serialize};

/// Settings for the [`Backtracer`](crate::Backtracer) front end.
///
/// The raw capture functions take no configuration: their only knob is the size of the buffer
/// they are handed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktraceConfiguration {
    // Upper bound on the addresses collected per thread, program counter included
    max_frames: usize,
    // Whether to look up image and symbol names for each address
    resolve_symbols: bool,
    // Whether to demangle symbol names in stack traces
    demangle_names: bool,
    // Whether to suspend other threads for the duration of their capture
    suspend_threads: bool,
}

impl BacktraceConfiguration {
    pub fn new(
        max_frames: usize,
        resolve_symbols: bool,
        demangle_names: bool,
        suspend_threads: bool,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(max_frames > 0, "max_frames must be at least 1");
        // Demangling works on resolved names, asking for it alone is a mistake.
        anyhow::ensure!(
            resolve_symbols || !demangle_names,
            "Cannot demangle names without resolving symbols"
        );
        Ok(Self {
            max_frames,
            resolve_symbols,
            demangle_names,
            suspend_threads,
        })
    }

    /// Parses a JSON configuration, filling missing fields with their defaults.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        Self::new(
            config.max_frames,
            config.resolve_symbols,
            config.demangle_names,
            config.suspend_threads,
        )
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub fn resolve_symbols(&self) -> bool {
        self.resolve_symbols
    }

    pub fn demangle_names(&self) -> bool {
        self.demangle_names
    }

    pub fn suspend_threads(&self) -> bool {
        self.suspend_threads
    }
}

impl Default for BacktraceConfiguration {
    fn default() -> Self {
        Self {
            max_frames: MAX_BACKTRACE_FRAMES,
            resolve_symbols: true,
            demangle_names: true,
            suspend_threads: true,
        }
    }
}
