//! Error types for platform profile operations.

use std::path::PathBuf;

/// Errors that can occur while loading or deriving a platform profile.
#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    /// TOML deserialization error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    /// I/O error reading/writing profile files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile file not found.
    #[error("profile file not found: {}", path.display())]
    NotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// Two cores in one profile share an id.
    #[error("duplicate core id '{id}'")]
    DuplicateCore {
        /// The repeated id.
        id: String,
    },

    /// A core id was referenced that the profile does not declare.
    #[error("unknown core '{id}'")]
    UnknownCore {
        /// The id that was looked up.
        id: String,
    },

    /// Validation error in a profile definition.
    #[error("validation error: {detail}")]
    Validation {
        /// Description of the validation failure.
        detail: String,
    },
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, PlatformError>;
