#![forbid(unsafe_code)]

use std::path::PathBuf;

use staymap::{ConfigError, SandboxError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("replay step {step} failed: {message}")]
    Replay { step: usize, message: String },
}

impl From<staymap::Error> for CliError {
    fn from(error: staymap::Error) -> Self {
        match error {
            staymap::Error::Config(e) => Self::Config(e),
            staymap::Error::Sandbox(e) => Self::Sandbox(e),
            staymap::Error::Page(e) => Self::Json(e),
        }
    }
}

impl CliError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } | Self::Config(_) => 2,
            Self::Replay { .. } => 3,
            _ => 1,
        }
    }

    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }
}
