//! Error types for the query codec and the request client.
//!
//! # Design
//! Both enums are `Clone` because a settled `RequestHandle` hands the same
//! error to every observer. Foreign errors (ureq, serde_json) are flattened
//! to their messages for the same reason.
//!
//! A query-string `QueryError` never escapes `RequestClient::build_get`: a
//! malformed query embedded in a URL is logged and dropped.

use thiserror::Error;

/// Errors produced while decoding or encoding query strings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A `%` was not followed by two hex digits.
    #[error("malformed percent escape at byte {position}")]
    MalformedEscape { position: usize },

    /// Percent-decoded bytes are not valid UTF-8.
    #[error("percent-decoded value is not valid UTF-8")]
    InvalidUtf8,

    /// The value handed in as parameters does not serialize to a map.
    #[error("query parameters must serialize to a map")]
    NotAMap,
}

impl QueryError {
    /// Move a reported position `by` bytes further along the input.
    pub(crate) fn shifted(self, by: usize) -> Self {
        match self {
            QueryError::MalformedEscape { position } => QueryError::MalformedEscape {
                position: position + by,
            },
            other => other,
        }
    }
}

/// Errors returned by `RequestClient` operations and carried by a failed
/// `RequestHandle`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    /// The transport could not complete the round-trip.
    #[error("transport error: {0}")]
    Transport(String),

    /// The request did not finish within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// A successful status arrived without a usable body.
    #[error("HTTP status {status} but no response body")]
    EmptyBody { status: u16 },

    /// The request parameters or body could not be serialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The client configuration is missing or invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The task driving the request ended before producing a result.
    #[error("request task aborted")]
    Aborted,
}

impl From<QueryError> for RequestError {
    fn from(err: QueryError) -> Self {
        RequestError::Serialization(err.to_string())
    }
}
