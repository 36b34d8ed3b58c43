use verifyflow_core::CoreError;

/// Errors surfaced by the watcher runtime.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    /// A state-machine transition was not allowed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The relay's HTTP endpoint failed or returned an unexpected body.
    #[error("Relay HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The push channel could not be opened or broke mid-stream.
    #[error("Push channel error: {0}")]
    Connection(String),
}
