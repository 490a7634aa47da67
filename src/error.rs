//! Error Types
//!
//! Every failure the engine can surface is one of a closed set of kinds, so
//! callers can branch on category without string-matching. Service-provided
//! messages are carried through verbatim in the payload.

use thiserror::Error;

/// Errors surfaced by query execution and its collaborators
#[derive(Debug, Error)]
pub enum QueryError {
    /// Start and end parsed but do not form a valid range
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    /// A time expression matched none of the accepted forms
    #[error("Unrecognized time expression: {0}")]
    UnrecognizedTimeExpression(String),

    /// A named resource does not exist, or no pattern matched anything
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The service rejected the query text at submission
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// The service throttled the request
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Credentials missing, expired, or insufficient
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The query reached a Cancelled terminal state
    #[error("Query cancelled: {0}")]
    QueryCancelled(String),

    /// The query reached a Timeout terminal state
    #[error("Query timed out: {0}")]
    QueryTimedOut(String),

    /// Network failures and anything the service reported that fits no
    /// other kind
    #[error("Transport error: {0}")]
    Transport(String),
}

impl QueryError {
    /// Stable kind name, independent of the message payload
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::InvalidTimeRange(_) => "InvalidTimeRange",
            QueryError::UnrecognizedTimeExpression(_) => "UnrecognizedTimeExpression",
            QueryError::ResourceNotFound(_) => "ResourceNotFound",
            QueryError::MalformedQuery(_) => "MalformedQuery",
            QueryError::RateLimited(_) => "RateLimited",
            QueryError::Unauthorized(_) => "Unauthorized",
            QueryError::QueryCancelled(_) => "QueryCancelled",
            QueryError::QueryTimedOut(_) => "QueryTimedOut",
            QueryError::Transport(_) => "TransportError",
        }
    }

    /// The message payload without the kind prefix
    pub fn message(&self) -> &str {
        match self {
            QueryError::InvalidTimeRange(m)
            | QueryError::UnrecognizedTimeExpression(m)
            | QueryError::ResourceNotFound(m)
            | QueryError::MalformedQuery(m)
            | QueryError::RateLimited(m)
            | QueryError::Unauthorized(m)
            | QueryError::QueryCancelled(m)
            | QueryError::QueryTimedOut(m)
            | QueryError::Transport(m) => m,
        }
    }

    /// Map a service error code to an error kind, keeping the message verbatim.
    ///
    /// Codes come from submit rejections and from the failure reason of a
    /// query that ended in the Failed state. Unknown codes land in
    /// `Transport` so the set of kinds stays closed.
    pub fn from_service_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            "MalformedQueryException" | "InvalidParameterException" => {
                QueryError::MalformedQuery(message)
            }
            "ResourceNotFoundException" => QueryError::ResourceNotFound(message),
            "LimitExceededException" | "ThrottlingException" => QueryError::RateLimited(message),
            "AccessDeniedException" | "UnrecognizedClientException" => {
                QueryError::Unauthorized(message)
            }
            _ => QueryError::Transport(message),
        }
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
