use thiserror::Error;

/// Errors surfaced by session negotiation and streaming operations.
///
/// Failures inside pipeline loops and transport callbacks are not represented
/// here; they are logged and folded into loop termination or session stop.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A signaling payload could not be decoded (malformed base64, JSON, or
    /// message structure).
    #[error("decode error: {0}")]
    Decode(String),

    /// The underlying transport rejected a connection, track, description, or
    /// candidate operation.
    #[error("transport error: {0}")]
    Transport(String),

    /// `start` was called on a session that is not idle. Sessions are
    /// single-shot; create a fresh one per negotiation.
    #[error("session already active: {0}")]
    AlreadyActive(String),

    /// The operation is not valid in the session's current lifecycle state,
    /// e.g. pushing frames after stop.
    #[error("invalid session state: {0}")]
    State(String),
}

impl SessionError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        SessionError::Transport(err.to_string())
    }
}
