//! Error types for the Crow engine
//!
//! This module defines the error types used throughout the engine,
//! including rendering, initialization, and resource management.
//!
//! Errors fall into three tiers:
//! - Fatal: submission failure, fence-wait timeout (`DeviceLost`),
//!   unexpected backend errors. Propagated unchanged to the run loop.
//! - Recoverable: surface out-of-date and pool exhaustion are NOT
//!   errors; they are encoded in return types (`FrameStatus`,
//!   `PoolAllocError`) so callers can retry.
//! - Soft: asset lookup misses are logged and the caller substitutes
//!   a default.

use std::fmt;

/// Result type for Crow engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Crow engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan, etc.)
    BackendError(String),

    /// Out of GPU memory, or a descriptor request that can never fit
    /// its pool (a configuration error, never transient)
    OutOfMemory,

    /// Invalid resource (buffer, layout, stream frame, etc.)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, subsystems)
    InitializationFailed(String),

    /// The device stopped responding (e.g. a fence wait timed out)
    DeviceLost(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::DeviceLost(msg) => write!(f, "Device lost: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::BackendError(format!("I/O error: {}", err))
    }
}

/// Build a `BackendError` and log it with file:line information
///
/// # Example
///
/// ```no_run
/// # use crow_engine::engine_err;
/// # let reason = "pool exhausted";
/// let err = engine_err!("crow::descriptors", "allocation failed: {}", reason);
/// ```
#[macro_export]
macro_rules! engine_err {
    ($source:expr, $($arg:tt)*) => {{
        $crate::engine_error!($source, $($arg)*);
        $crate::error::Error::BackendError(format!($($arg)*))
    }};
}

/// Log an error and return it from the enclosing function
///
/// # Example
///
/// ```no_run
/// # use crow_engine::engine_bail;
/// # fn check(bindings: &[u32]) -> crow_engine::error::Result<()> {
/// if bindings.is_empty() {
///     engine_bail!("crow::descriptors", "empty binding list");
/// }
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! engine_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::engine_err!($source, $($arg)*))
    };
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
