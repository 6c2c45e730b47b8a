/// Core error type.
///
/// Adapter crates map their specific failures into this type so the loops can
/// decide between retrying and giving up.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("credentials error: {0}")]
    Credentials(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Whether the failure is worth another attempt after a pause.
    ///
    /// Connection-level failures, throttling and server errors are recoverable.
    /// Everything else (bad config, bad credentials, client errors, `success: false`)
    /// will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_errors() {
        assert!(Error::Transport("timeout".into()).is_retryable());
        assert!(Error::Api {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
        assert!(Error::Api {
            status: 429,
            message: "slow down".into()
        }
        .is_retryable());
        assert!(!Error::Api {
            status: 401,
            message: "unauthorized".into()
        }
        .is_retryable());
        assert!(!Error::Rejected("nope".into()).is_retryable());
        assert!(!Error::Credentials("USER_ID".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }
}
