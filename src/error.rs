//! Connector error taxonomy.
//!
//! Every error aborts the current command; nothing is retried internally.
//! The host scheduler re-runs a failed poll on its own interval against the
//! unchanged persisted cursor.

use thiserror::Error;

/// Errors surfaced by the Hoxhunt connector.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Bad configuration or invocation argument (unparseable date, bad sort
    /// key, bad boolean, missing required argument). Raised before any
    /// network call and surfaced verbatim to the invoking user.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Non-2xx HTTP response from the Hoxhunt API.
    #[error("Hoxhunt API returned HTTP {status}: {body}")]
    Transport {
        status: u16,
        body: serde_json::Value,
    },

    /// GraphQL-level failure: a 200 response carrying a non-empty `errors`
    /// array. Holds the first line of each upstream error message.
    #[error("Hoxhunt query failed: {}", .0.join("; "))]
    Query(Vec<String>),

    /// Requested entity does not exist upstream.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The response body could not be understood.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Connection-level failure before any status code was received.
    #[error("Request failed: {0}")]
    RequestFailed(String),
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

impl From<reqwest::Error> for ConnectorError {
    fn from(err: reqwest::Error) -> Self {
        ConnectorError::RequestFailed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_carries_status_and_body() {
        let err = ConnectorError::Transport {
            status: 500,
            body: serde_json::json!({"message": "internal error"}),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("500"));
        assert!(rendered.contains("internal error"));
    }

    #[test]
    fn query_error_joins_messages() {
        let err = ConnectorError::Query(vec![
            "Cannot query field".to_string(),
            "Unknown argument".to_string(),
        ]);
        let rendered = err.to_string();
        assert!(rendered.contains("Cannot query field"));
        assert!(rendered.contains("Unknown argument"));
    }
}
