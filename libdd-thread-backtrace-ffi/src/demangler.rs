// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::ffi::CStr;
use symbolic_common::Name;
use symbolic_demangle::Demangle;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemangleOptions {
    Complete,
    NameOnly,
}

/// Demangles the NUL-terminated symbol `name` into `out`, truncating to `out_len - 1` bytes and
/// always NUL-terminating when `out_len > 0`.
///
/// Returns the length of the full demangled name, or 0 if `name` is null, not UTF-8 or cannot be
/// demangled. A return value of `out_len` or more means the output was truncated.
///
/// # Safety
/// `name` must be null or a valid C string; `out` must be null or valid for writes of `out_len`
/// bytes.
#[no_mangle]
#[must_use]
pub unsafe extern "C" fn ddog_backtrace_demangle(
    name: *const libc::c_char,
    options: DemangleOptions,
    out: *mut libc::c_char,
    out_len: usize,
) -> usize {
    if name.is_null() {
        return 0;
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return 0;
    };
    let options = match options {
        DemangleOptions::Complete => symbolic_demangle::DemangleOptions::complete(),
        DemangleOptions::NameOnly => symbolic_demangle::DemangleOptions::name_only(),
    };
    let Some(demangled) = Name::from(name).demangle(options) else {
        return 0;
    };
    if !out.is_null() && out_len > 0 {
        let copied = demangled.len().min(out_len - 1);
        std::ptr::copy_nonoverlapping(demangled.as_ptr(), out as *mut u8, copied);
        *out.add(copied) = 0;
    }
    demangled.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demangle(name: &CStr, options: DemangleOptions) -> (usize, String) {
        let mut out = [0 as libc::c_char; 256];
        let len = unsafe {
            ddog_backtrace_demangle(name.as_ptr(), options, out.as_mut_ptr(), out.len())
        };
        let text = unsafe { CStr::from_ptr(out.as_ptr()) }
            .to_str()
            .unwrap()
            .to_owned();
        (len, text)
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn test_demangle() {
        let name = c"_ZN3foo3barEi";
        assert_eq!(
            demangle(name, DemangleOptions::Complete),
            (13, "foo::bar(int)".to_string())
        );
        assert_eq!(
            demangle(name, DemangleOptions::NameOnly),
            (8, "foo::bar".to_string())
        );
    }

    #[test]
    fn test_demangle_fails() {
        assert_eq!(demangle(c"_ZNSt28__fdf", DemangleOptions::Complete).0, 0);
        let null = unsafe {
            ddog_backtrace_demangle(
                std::ptr::null(),
                DemangleOptions::NameOnly,
                std::ptr::null_mut(),
                0,
            )
        };
        assert_eq!(null, 0);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn truncates_to_the_buffer() {
        let mut out = [0x7f as libc::c_char; 5];
        let len = unsafe {
            ddog_backtrace_demangle(
                c"_ZN3foo3barEi".as_ptr(),
                DemangleOptions::NameOnly,
                out.as_mut_ptr(),
                out.len(),
            )
        };
        assert_eq!(len, 8);
        let text = unsafe { CStr::from_ptr(out.as_ptr()) };
        assert_eq!(text.to_str().unwrap(), "foo:");
    }
}
