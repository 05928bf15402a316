use thiserror::Error;

use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum JsdAdapterError {
    #[error("Unhandled command: {0}")]
    UnhandledCommand(String),
    #[error("Missing arguments for {0}")]
    MissingArguments(String),
    #[error("Invalid arguments for {command}: {source}")]
    InvalidArguments {
        command: String,
        source: serde_json::Error,
    },
    #[error("A program is already running")]
    AlreadyRunning,
    #[error("Failed to read program '{path}': {source}")]
    FileError { path: String, source: std::io::Error },
    #[error("Failed to start execution thread: {0}")]
    SpawnError(std::io::Error),
    #[error("{0}")]
    EvaluationError(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
}
