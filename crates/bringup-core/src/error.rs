//! Error types for bring-up orchestration.

use bringup_platform::PlatformError;

/// A debug-service call failed.
///
/// Always contained at the per-core or per-routine boundary and turned into a
/// failed result; never aborts a broadcast.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{detail}")]
pub struct TransportError {
    /// What the debug service reported.
    pub detail: String,
}

impl TransportError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Errors surfaced to the caller rather than recorded per core.
#[derive(Debug, thiserror::Error)]
pub enum BringupError {
    /// The profile could not be turned into a core registry.
    #[error("configuration error: {0}")]
    Platform(#[from] PlatformError),

    /// A command name that the command table does not contain.
    #[error("unknown command '{name}'")]
    UnknownCommand {
        /// The name that was looked up.
        name: String,
    },

    /// The debug service rejected setup before any core was touched.
    #[error("debug service setup failed: {0}")]
    Setup(#[source] TransportError),
}

/// Result type for orchestration setup.
pub type Result<T> = std::result::Result<T, BringupError>;
