use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("No device connected.")]
    NoDevice,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Command timed out after {0:?}")]
    ToolTimeout(std::time::Duration),

    #[error("Tool failure: {0}")]
    ToolFailure(String),

    #[error("Another capture process is active.")]
    SessionConflict,

    #[error("Launch failure: {0}")]
    LaunchFailure(String),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
