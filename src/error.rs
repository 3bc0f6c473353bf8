use thiserror::Error;

/// Failures reported by a device-automation driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// HTTP transport to the automation server failed
    #[error("driver transport failed ({context}): {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// The automation server answered, but reported an error
    #[error("driver command '{command}' failed: {error}")]
    Protocol { command: String, error: String },

    /// The target element refused the action (e.g. typing into a read-only field)
    #[error("action rejected: {0}")]
    ActionRejected(String),

    /// Response body could not be decoded
    #[error("driver JSON error ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while replaying committed target events on the live application.
///
/// Every variant is recoverable by backtracking.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("oracle assertion failed: {0}")]
    AssertionFailed(String),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("unreadable UI hierarchy: {0}")]
    Hierarchy(String),

    /// The application left its declared package or reached an excluded screen
    #[error("out of scope: {0}")]
    OutOfScope(String),
}

/// Terminal session errors surfaced to the caller of the transfer engine.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Unsupported action kind or missing required field in the source test
    #[error("malformed source event #{index}: {reason}")]
    MalformedEvent { index: usize, reason: String },

    /// A backtrack was requested while positioned on the first source event
    #[error("cannot backtrack past the first source event")]
    CannotBacktrack,

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Replay(#[from] ReplayError),

    #[error("unreadable UI hierarchy: {0}")]
    Hierarchy(String),

    #[error("I/O error ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot rejected: {0}")]
    Snapshot(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl TransferError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        TransferError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        TransferError::Json {
            context: context.into(),
            source,
        }
    }
}
