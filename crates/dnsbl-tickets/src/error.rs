use thiserror::Error;

/// Result type alias for ticketing operations
pub type Result<T> = std::result::Result<T, TicketError>;

/// Statuses worth retrying: rate limiting and transient server errors
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Errors that can occur when talking to the ticket system
#[derive(Error, Debug)]
pub enum TicketError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// Non-success response from the API
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error text from the response body
        message: String,
    },

    /// Response body could not be decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Client misconfiguration
    #[error("configuration error: {0}")]
    Config(String),

    /// Retryable failures persisted past the retry budget
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Total attempts made
        attempts: u32,
        /// Error from the final attempt
        last: Box<TicketError>,
    },
}

impl TicketError {
    /// HTTP status carried by this error, if any
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status_code(),
            _ => None,
        }
    }

    /// Whether the default retry policy would retry this error
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Api { status, .. } if RETRYABLE_STATUSES.contains(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in RETRYABLE_STATUSES {
            let err = TicketError::Api {
                status,
                message: String::new(),
            };
            assert!(err.is_retryable(), "{status}");
        }
        let not_found = TicketError::Api {
            status: 404,
            message: "Issue Does Not Exist".into(),
        };
        assert!(!not_found.is_retryable());
        assert!(!TicketError::Http("connection reset".into()).is_retryable());
    }

    #[test]
    fn test_status_code_through_exhaustion() {
        let err = TicketError::RetriesExhausted {
            attempts: 4,
            last: Box::new(TicketError::Api {
                status: 503,
                message: "unavailable".into(),
            }),
        };
        assert_eq!(err.status_code(), Some(503));
        assert!(!err.is_retryable());
    }
}
