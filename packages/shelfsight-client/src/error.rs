use thiserror::Error;

/// Operator-facing fallback when no more specific wording applies.
const GENERIC_FAILURE: &str = "Analysis failed. Check the server connection and try again.";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request timed out")]
    Timeout,

    #[error("upload rejected: file exceeds the server size limit")]
    FileTooLarge,

    #[error("server error (HTTP 500)")]
    ServerError,

    #[error("request rejected (HTTP {status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("request failed with HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("transport error: {0}")]
    Transport(reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input file not found: {0}")]
    FileNotFound(String),

    #[error("an analysis is already in progress")]
    AnalysisInProgress,

    #[error("a finished analysis is still loaded - reset the session first")]
    SessionNotReset,

    #[error("no analysis result is loaded")]
    NoActiveResult,

    #[error("analysis cancelled")]
    Cancelled,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Classify a transport-level failure. Timeouts get their own variant
    /// so the message priority below can distinguish them from ordinary
    /// connection failures.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout
        } else {
            ClientError::Transport(err)
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// The message shown to the operator. Priority order is fixed:
    /// timeout, 413, 500, structured backend detail, any other error
    /// message verbatim, generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Timeout => {
                "Request timed out - the file may be too large or the server is busy.".to_string()
            }
            ClientError::FileTooLarge => {
                "File too large - the maximum upload size was exceeded.".to_string()
            }
            ClientError::ServerError => {
                "Server error while processing the analysis - try again in a few minutes."
                    .to_string()
            }
            ClientError::Rejected { detail, .. } => detail.clone(),
            ClientError::Decode(_) => GENERIC_FAILURE.to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
