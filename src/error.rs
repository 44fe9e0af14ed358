use thiserror::Error;

pub type ControllerResult<T> = std::result::Result<T, ControllerError>;

/// Crate-wide error type.
///
/// Only conditions from the "fatal" row of the error taxonomy become a
/// `ControllerError`. Clamped inputs, rejected commands, and inputs that
/// are meaningless in the current state are logged
/// (`tracing::warn!`/`tracing::debug!`) and otherwise ignored — they
/// never reach this type.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// An operator-actionable condition that must stop the process: an
    /// undefined system state transition was requested, or a packed
    /// robot was found with `start_up_sequence = false` during UNKNOWN
    /// resolution.
    #[error("fatal controller error: {0}")]
    Fatal(String),

    #[error("inverse kinematics failed for leg {leg}: {reason}")]
    IkFailure { leg: &'static str, reason: String },

    #[error("required parameter missing at init: {0}")]
    MissingParameter(&'static str),

    #[error("IO error")]
    IoError(#[from] std::io::Error),

    #[error("toml deserialization error")]
    TomlDeError(#[from] toml::de::Error),

    #[error("toml serialization error")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("json error")]
    JsonError(#[from] serde_json::Error),

    #[error("configuration error")]
    ConfigError(#[from] config::ConfigError),
}
