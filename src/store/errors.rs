//! Store error channel
//!
//! Every store-facing operation resolves to a value or exactly one of:
//! - EMPTY_RESPONSE: the call succeeded but carried no resource
//! - DECODING_ERROR: the returned item does not satisfy the expected schema
//! - ERROR_RESPONSE: the transport or the store failed
//!
//! The set is closed. Callers map kinds to user-facing responses; this layer
//! has no notion of HTTP responses of its own.

use std::fmt;

use thiserror::Error;

use crate::model::{DecodeErrors, ValidationDetails};

/// HTTP status codes the store layer inspects
pub mod status {
    pub const OK: u16 = 200;
    pub const CREATED: u16 = 201;
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const CONFLICT: u16 = 409;
    pub const PRECONDITION_FAILED: u16 = 412;
    pub const FAILED_DEPENDENCY: u16 = 424;

    /// Returns true for 2xx codes
    pub fn is_success(code: u16) -> bool {
        (200..300).contains(&code)
    }
}

/// Error kinds with their stable string codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    EmptyResponse,
    DecodingError,
    ErrorResponse,
}

impl StoreErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreErrorKind::EmptyResponse => "EMPTY_RESPONSE",
            StoreErrorKind::DecodingError => "DECODING_ERROR",
            StoreErrorKind::ErrorResponse => "ERROR_RESPONSE",
        }
    }
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure reported by the store or the transport beneath it.
///
/// `code` is the HTTP status when the store answered, `None` when the request
/// never got a response (DNS, TLS, timeouts).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    code: Option<u16>,
    message: String,
}

impl ResponseError {
    pub fn new(code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn with_status(code: u16, message: impl Into<String>) -> Self {
        Self::new(Some(code), message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(None, message)
    }

    pub fn code(&self) -> Option<u16> {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_conflict(&self) -> bool {
        self.code == Some(status::CONFLICT)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Some(status::NOT_FOUND)
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "[{}] {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ResponseError {}

/// Store operation error
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Call succeeded without the written or requested resource
    #[error("EMPTY_RESPONSE: store returned no resource")]
    EmptyResponse,

    /// Returned item failed schema validation
    #[error("DECODING_ERROR: {0}")]
    DecodingError(DecodeErrors),

    /// Transport or store failure
    #[error("ERROR_RESPONSE: {0}")]
    ErrorResponse(ResponseError),
}

impl StoreError {
    pub fn kind(&self) -> StoreErrorKind {
        match self {
            StoreError::EmptyResponse => StoreErrorKind::EmptyResponse,
            StoreError::DecodingError(_) => StoreErrorKind::DecodingError,
            StoreError::ErrorResponse(_) => StoreErrorKind::ErrorResponse,
        }
    }

    /// Status code of the underlying store error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StoreError::ErrorResponse(err) => err.code(),
            _ => None,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ErrorResponse(err) if err.is_conflict())
    }

    pub fn decoding(details: ValidationDetails) -> Self {
        StoreError::DecodingError(DecodeErrors::single(details))
    }

    pub fn response(code: Option<u16>, message: impl Into<String>) -> Self {
        StoreError::ErrorResponse(ResponseError::new(code, message))
    }
}

impl From<ResponseError> for StoreError {
    fn from(err: ResponseError) -> Self {
        StoreError::ErrorResponse(err)
    }
}

impl From<DecodeErrors> for StoreError {
    fn from(errors: DecodeErrors) -> Self {
        StoreError::DecodingError(errors)
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        assert_eq!(StoreError::EmptyResponse.kind().as_str(), "EMPTY_RESPONSE");
        assert_eq!(
            StoreError::decoding(ValidationDetails::missing_field("id")).kind().as_str(),
            "DECODING_ERROR"
        );
        assert_eq!(StoreError::response(Some(409), "conflict").kind().as_str(), "ERROR_RESPONSE");
    }

    #[test]
    fn test_status_code_only_for_error_response() {
        assert_eq!(StoreError::response(Some(412), "etag").status_code(), Some(412));
        assert_eq!(StoreError::response(None, "dns").status_code(), None);
        assert_eq!(StoreError::EmptyResponse.status_code(), None);
    }

    #[test]
    fn test_conflict_detection() {
        assert!(StoreError::response(Some(409), "exists").is_conflict());
        assert!(!StoreError::response(Some(404), "missing").is_conflict());
    }

    #[test]
    fn test_display_includes_kind_and_code() {
        let display = StoreError::response(Some(409), "Entity already exists").to_string();
        assert!(display.contains("ERROR_RESPONSE"));
        assert!(display.contains("[409]"));
    }

    #[test]
    fn test_is_success() {
        assert!(status::is_success(200));
        assert!(status::is_success(201));
        assert!(!status::is_success(424));
    }
}
