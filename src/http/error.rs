//! Request framing errors.

use thiserror::Error;

/// Why a request could not be read off a connection.
///
/// Every variant is recoverable: the connection is closed without a response.
#[derive(Debug, Error)]
pub enum RequestError {
    /// A socket read exceeded the per-connection timeout.
    #[error("request timed out")]
    RequestTimedOut,

    /// The peer closed before a complete request line arrived.
    #[error("connection closed before the request line was complete")]
    IncompleteRequest,

    /// The peer closed before the header block was terminated.
    #[error("connection closed before the request headers were complete")]
    IncompleteRequestHeader,

    /// The request line or a framing header could not be parsed.
    #[error("incorrect request syntax: {0}")]
    IncorrectRequestSyntax(String),

    /// The request line and headers outgrew the configured limit.
    #[error("request head exceeds {limit} bytes")]
    HeaderTooLarge { limit: usize },

    /// The declared body is larger than the configured limit.
    #[error("declared body of {declared} bytes exceeds {limit} bytes")]
    BodyTooLarge { declared: usize, limit: usize },

    /// Reading from the socket failed.
    #[error("socket read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl RequestError {
    /// Whether the failure is routine client behaviour rather than a fault worth a warning.
    pub fn is_benign(&self) -> bool {
        matches!(self, RequestError::RequestTimedOut | RequestError::IncompleteRequest)
    }
}
