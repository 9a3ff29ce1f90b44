//! Error types for chat-narrator.

/// Why a chat-completion request did not produce text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompletionError {
    /// Connection refused, DNS failure, TLS error and the like.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    /// 401 or 403 from the endpoint.
    #[error("unauthorized (status {0})")]
    Unauthorized(u16),

    #[error("rate limited")]
    RateLimited,

    /// Any other non-success status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Body was not a chat-completion reply.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl CompletionError {
    /// Short machine-readable label for status reporting.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Timeout => "timeout",
            Self::Unauthorized(_) => "unauthorized",
            Self::RateLimited => "rate_limited",
            Self::Status(_) => "status",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Speech engine failure.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to start synthesiser: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("speech engine unavailable: {0}")]
    Unavailable(String),
}

/// The controller task has shut down.
#[derive(Debug, thiserror::Error)]
#[error("narration controller stopped")]
pub struct ControllerStopped;
