use std::time::Duration;

/// Faults the hover controller can report to its caller.
#[derive(Debug, thiserror::Error)]
pub enum HoverError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Position feed not ready after {0:?}")]
    FeedTimeout(Duration),

    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
