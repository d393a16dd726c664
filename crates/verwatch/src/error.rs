use thiserror::Error;
use verwatch_core::EngineError;
use verwatch_platform::AppPathsError;

use crate::settings::SettingsError;

/// Failures that stop the binary before or while it sets up the engine.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Usage(String),
    #[error(transparent)]
    Paths(#[from] AppPathsError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("resource '{name}': {source}")]
    Resource {
        name: String,
        #[source]
        source: EngineError,
    },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("failed to listen for Ctrl-C: {0}")]
    Signal(#[source] std::io::Error),
}

impl AppError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Signal(_) => 1,
            _ => 2,
        }
    }
}
