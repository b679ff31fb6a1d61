//! Error handling for the capture/predict core

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
///
/// The `Display` output doubles as the status text shown to the user, so the
/// prefixes here are part of the observable behaviour.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera permission denied or no matching device
    #[error("camera unavailable: {0}")]
    Device(String),

    /// Operation not valid in the current state
    #[error("not allowed: {0}")]
    Precondition(String),

    /// Network unreachable, timeout, connection reset
    #[error("connection error: {0}")]
    Transport(String),

    /// Non-success HTTP status or explicit `error` field
    #[error("submission rejected: {0}")]
    Server(String),

    /// Malformed or unexpected response shape
    #[error("unexpected response: {0}")]
    Parse(String),

    /// No bound session or the live source has no usable frame
    #[error("no active frame: {0}")]
    NoActiveFrame(String),

    /// Still-frame encoding failed
    #[error("encode error: {0}")]
    Encode(String),

    /// Invalid input payload
    #[error("validation error: {0}")]
    Validation(String),

    /// Config error
    #[error("config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The orchestrator task has exited
    #[error("orchestrator has shut down")]
    Closed,
}
