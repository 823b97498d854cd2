// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "demangler")]
use symbolic_common::Name;
#[cfg(feature = "demangler")]
use symbolic_demangle::{Demangle, DemangleOptions};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StackTrace {
    pub frames: Vec<StackFrame>,
    /// Set when the capture filled its buffer, so older frames may be missing.
    pub incomplete: bool,
}

impl StackTrace {
    pub fn empty() -> Self {
        Self {
            frames: vec![],
            incomplete: false,
        }
    }

    /// Wraps the addresses produced by a capture into `capacity` slots.
    pub fn from_addresses(addresses: &[usize], capacity: usize) -> Self {
        Self {
            frames: addresses.iter().copied().map(StackFrame::new).collect(),
            incomplete: capacity > 0 && addresses.len() >= capacity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[cfg(feature = "demangler")]
    pub fn demangle_names(&mut self) -> anyhow::Result<()> {
        let mut errors = 0;
        for frame in &mut self.frames {
            frame.demangle_name().unwrap_or_else(|e| {
                frame.comments.push(e.to_string());
                errors += 1;
            });
        }
        anyhow::ensure!(errors == 0);
        Ok(())
    }
}

#[cfg(unix)]
impl StackTrace {
    /// Resolves every frame with `dladdr`. Frames that cannot be resolved keep their address and
    /// get a comment; the error reports how many failed.
    pub fn resolve_names(&mut self) -> anyhow::Result<()> {
        let mut errors = 0;
        for frame in &mut self.frames {
            frame.resolve_with_dladdr().unwrap_or_else(|e| {
                frame
                    .comments
                    .push(format!("resolve_names failed with {e:#}"));
                errors += 1;
            });
        }
        anyhow::ensure!(errors == 0, "{errors} frames could not be resolved");
        Ok(())
    }
}

/// One line per frame: `index image address symbol + offset`. Null addresses are skipped but
/// keep their index.
impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (index, frame) in self.frames.iter().enumerate() {
            if frame.ip == 0 {
                continue;
            }
            if !first {
                writeln!(f)?;
            }
            first = false;
            write!(f, "{:<4}{frame}", index)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct StackFrame {
    // Absolute addresses
    pub ip: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_base_address: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol_address: Option<usize>,

    // Symbol info
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mangled_name: Option<String>,

    // Additional Info
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<String>,
}

impl StackFrame {
    pub fn new(ip: usize) -> Self {
        Self {
            ip,
            ..Default::default()
        }
    }

    /// File name of the image containing the frame, `???` if unknown.
    pub fn image_name(&self) -> &str {
        match &self.path {
            Some(path) => path.rsplit('/').next().unwrap_or(path),
            None => "???",
        }
    }

    /// The nearest symbol, else the image name, else the raw symbol address.
    pub fn symbol_name(&self) -> String {
        match (&self.function, &self.path) {
            (Some(function), _) => function.clone(),
            (None, Some(_)) => self.image_name().to_string(),
            (None, None) => format!("{:#x}", self.symbol_address.unwrap_or_default()),
        }
    }

    /// Offset of `ip` from the symbol, or from the image base when no symbol is known.
    pub fn offset(&self) -> usize {
        let base = match (&self.function, &self.path) {
            (None, Some(_)) => self.module_base_address,
            _ => self.symbol_address,
        };
        self.ip.wrapping_sub(base.unwrap_or_default())
    }

    #[cfg(feature = "demangler")]
    pub fn demangle_name(&mut self) -> anyhow::Result<()> {
        if let Some(name) = self.function.take() {
            match Name::from(&name).demangle(DemangleOptions::name_only()) {
                Some(demangled) if demangled != name => {
                    self.mangled_name = Some(name);
                    self.function = Some(demangled);
                }
                _ => {
                    self.function = Some(name);
                }
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
impl StackFrame {
    /// Fills the image and symbol fields from the dynamic linker's view of `ip`.
    ///
    /// Only exported (dynamic) symbols are visible to `dladdr`; for the rest the image is still
    /// known and the offset is relative to its base.
    pub fn resolve_with_dladdr(&mut self) -> anyhow::Result<()> {
        use std::ffi::CStr;

        fn to_string(ptr: *const libc::c_char) -> Option<String> {
            if ptr.is_null() {
                return None;
            }
            // SAFETY: dladdr returns null or NUL-terminated strings owned by the loader.
            unsafe { CStr::from_ptr(ptr) }
                .to_str()
                .ok()
                .map(str::to_owned)
        }

        // SAFETY: Dl_info is plain old data; dladdr fills it on success.
        let mut info: libc::Dl_info = unsafe { std::mem::zeroed() };
        // SAFETY: dladdr only inspects the loader's image list, it never dereferences `ip`.
        let found = unsafe { libc::dladdr(self.ip as *const libc::c_void, &mut info) };
        anyhow::ensure!(found != 0, "dladdr found no image for {:#x}", self.ip);

        self.path = to_string(info.dli_fname);
        self.module_base_address = (!info.dli_fbase.is_null()).then_some(info.dli_fbase as usize);
        self.function = to_string(info.dli_sname);
        self.symbol_address = (!info.dli_saddr.is_null()).then_some(info.dli_saddr as usize);
        Ok(())
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(target_pointer_width = "64")]
        let address = format!("{:#018x}", self.ip);
        #[cfg(not(target_pointer_width = "64"))]
        let address = format!("{:#010x}", self.ip);
        write!(
            f,
            "{:<35} {} {} + {}",
            self.image_name(),
            address,
            self.symbol_name(),
            self.offset()
        )
    }
}

/// The backtrace of one thread, as part of a multi-thread report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadBacktrace {
    /// Position of the thread in the enumeration it came from.
    pub index: usize,
    pub thread_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub stack: StackTrace,
}

impl fmt::Display for ThreadBacktrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => writeln!(f, "Thread {} ({name}):", self.index)?,
            None => writeln!(f, "Thread {}:", self.index)?,
        }
        write!(f, "{}", self.stack)
    }
}

/// Renders a report of several threads, separated by blank lines.
pub fn format_thread_backtraces(threads: &[ThreadBacktrace]) -> String {
    threads
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved_frame() -> StackFrame {
        StackFrame {
            ip: 0x1000_2040,
            module_base_address: Some(0x1000_0000),
            symbol_address: Some(0x1000_2000),
            path: Some("/usr/lib/libfoo.dylib".to_string()),
            function: Some("foo_bar".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn incomplete_when_buffer_filled() {
        assert!(StackTrace::from_addresses(&[1, 2, 3], 3).incomplete);
        assert!(!StackTrace::from_addresses(&[1, 2], 3).incomplete);
        assert!(!StackTrace::from_addresses(&[], 0).incomplete);
    }

    #[test]
    fn offset_is_relative_to_symbol() {
        let frame = resolved_frame();
        assert_eq!(frame.image_name(), "libfoo.dylib");
        assert_eq!(frame.symbol_name(), "foo_bar");
        assert_eq!(frame.offset(), 0x40);
    }

    #[test]
    fn offset_falls_back_to_image_base() {
        let frame = StackFrame {
            function: None,
            ..resolved_frame()
        };
        assert_eq!(frame.symbol_name(), "libfoo.dylib");
        assert_eq!(frame.offset(), 0x2040);
    }

    #[test]
    fn unresolved_frame_uses_placeholders() {
        let frame = StackFrame::new(0x1234);
        assert_eq!(frame.image_name(), "???");
        assert_eq!(frame.symbol_name(), "0x0");
        assert_eq!(frame.offset(), 0x1234);
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn formats_one_line_per_frame() {
        let trace = StackTrace {
            frames: vec![resolved_frame(), StackFrame::new(0), StackFrame::new(0x10)],
            incomplete: false,
        };
        let text = trace.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            format!("0   {:<35} 0x0000000010002040 foo_bar + 64", "libfoo.dylib")
        );
        assert!(lines[1].starts_with("2   ???"));
        assert!(lines[1].ends_with("0x0000000000000010 0x0 + 16"));
    }

    #[test]
    fn thread_report_has_headers_and_blank_separators() {
        let threads = vec![
            ThreadBacktrace {
                index: 0,
                thread_id: 259,
                name: None,
                stack: StackTrace::from_addresses(&[0x10], 8),
            },
            ThreadBacktrace {
                index: 1,
                thread_id: 515,
                name: Some("worker".to_string()),
                stack: StackTrace::from_addresses(&[0x20], 8),
            },
        ];
        let report = format_thread_backtraces(&threads);
        let blocks: Vec<&str> = report.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].starts_with("Thread 0:\n0   ???"));
        assert!(blocks[1].starts_with("Thread 1 (worker):\n0   ???"));
    }

    #[test]
    fn serializes_without_empty_fields() {
        let json = serde_json::to_value(StackFrame::new(42)).unwrap();
        assert_eq!(json, serde_json::json!({ "ip": 42 }));
    }

    #[cfg(feature = "demangler")]
    #[test]
    fn test_demangle_rust() {
        let mut frame = StackFrame::new(1);
        frame.function = Some("_ZN3std2rt10lang_start17h7a87e81ecc4a9d6cE".to_string());
        frame.demangle_name().unwrap();
        assert_eq!(frame.function, Some("std::rt::lang_start".to_string()));
        assert_eq!(
            frame.mangled_name,
            Some("_ZN3std2rt10lang_start17h7a87e81ecc4a9d6cE".to_string())
        );
    }

    #[cfg(feature = "demangler")]
    #[test]
    fn test_demangle_cpp() {
        let mut frame = StackFrame::new(1);
        frame.function = Some("_ZN3Foo3barEv".to_string());
        frame.demangle_name().unwrap();
        assert_eq!(frame.function, Some("Foo::bar".to_string()));
        assert_eq!(frame.mangled_name, Some("_ZN3Foo3barEv".to_string()));
    }

    #[cfg(feature = "demangler")]
    #[test]
    fn test_demangle_unmangled() {
        let mut trace = StackTrace::from_addresses(&[1, 2], 8);
        trace.frames[0].function = Some("main".to_string());
        trace.demangle_names().unwrap();
        assert_eq!(trace.frames[0].function, Some("main".to_string()));
        assert_eq!(trace.frames[0].mangled_name, None);
        assert_eq!(trace.frames[1].function, None);
    }

    #[cfg(unix)]
    #[test]
    #[cfg_attr(miri, ignore)]
    fn resolves_libc_function() {
        let mut frame = StackFrame::new(libc::getpid as usize);
        frame.resolve_with_dladdr().unwrap();
        assert!(frame.path.is_some());
        assert!(frame.module_base_address.unwrap() <= frame.ip);
        if let Some(symbol_address) = frame.symbol_address {
            assert!(symbol_address <= frame.ip);
        }
    }

    #[cfg(unix)]
    #[test]
    #[cfg_attr(miri, ignore)]
    fn unresolvable_address_is_reported() {
        let mut trace = StackTrace::from_addresses(&[0x10], 8);
        assert!(trace.resolve_names().is_err());
        assert_eq!(trace.frames[0].comments.len(), 1);
        assert_eq!(trace.frames[0].path, None);
    }
}
