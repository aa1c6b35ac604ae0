//! Error types for request classification.

/// Errors that can occur while classifying a request.
///
/// Missing or malformed headers are never errors; only a descriptor that
/// cannot describe a request at all is rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IngestError {
    /// The descriptor is missing its method or target.
    #[error("invalid request descriptor: {0}")]
    InvalidRequest(String),
}
