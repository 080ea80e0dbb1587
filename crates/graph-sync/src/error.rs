//! Sync errors

use graph_model::GraphError;

/// Errors raised while decoding or interpreting a command
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("{command}: missing parameter {index}")]
    MissingParameter { command: &'static str, index: usize },
    #[error("{command}: malformed parameter {index}: {value:?}")]
    MalformedParameter {
        command: &'static str,
        index: usize,
        value: String,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors reported by a remote authority
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("client is not authorized for this graph")]
    Unauthorized,
    #[error("network error: {0}")]
    Network(String),
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Errors surfaced to callers of a `GraphSession`
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    #[error("session is not authorized")]
    Unauthorized,
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Transport(TransportError),
    #[error("replica actor has stopped")]
    ActorClosed,
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<TransportError> for SyncError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized => Self::Unauthorized,
            other => Self::Transport(other),
        }
    }
}

pub type Result<T, E = SyncError> = std::result::Result<T, E>;
