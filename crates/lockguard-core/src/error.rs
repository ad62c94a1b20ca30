//! Error types for Lockguard Core.

use thiserror::Error;

/// Why a single server could not be observed.
///
/// Connection errors are per server and never abort a run; the facade turns
/// them into [`ServerError`](crate::ServerError) entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
    /// The connector did not answer in time.
    #[error("Connection timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    /// The connector reported a failure.
    #[error("Connection failed: {0}")]
    Failed(String),
}

/// Core error type for facade operations.
#[derive(Debug, Error)]
pub enum GuardError {
    /// Lockfile error passthrough.
    #[error("Lockfile error: {0}")]
    Lockfile(#[from] lockguard_registry::LockfileError),

    /// Scanner error passthrough.
    #[error("Scan error: {0}")]
    Scan(#[from] lockguard_scanner::ScanError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
