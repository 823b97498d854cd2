// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Why a capture produced no frames.
///
/// Running out of capacity and reaching the end of the frame chain are not errors; both are
/// reflected only in the returned count.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("The output buffer has no room for a single frame")]
    ZeroCapacity,
    /// The kernel refused the register-state query: the thread handle is invalid, the thread
    /// has exited, or access was denied. Carries the raw `kern_return_t`.
    #[error("Failed to read the thread state: kern_return_t {0}")]
    StateQuery(i32),
    #[error("Null pointer provided for ucontext")]
    NullContext,
}
