//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code after one
//! error object has been written to stdout.

use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::store::{StoreError, StoreErrorKind};

/// CLI error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout)
    IoError,
    /// Argument accepted by clap but unusable (e.g. empty id)
    InvalidArgument,
    /// Store returned no resource
    EmptyResponse,
    /// Stored document failed validation
    DecodingError,
    /// Store or transport failure
    ErrorResponse,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "DOCMODEL_CLI_CONFIG_ERROR",
            Self::IoError => "DOCMODEL_CLI_IO_ERROR",
            Self::InvalidArgument => "DOCMODEL_CLI_INVALID_ARGUMENT",
            Self::EmptyResponse => "EMPTY_RESPONSE",
            Self::DecodingError => "DECODING_ERROR",
            Self::ErrorResponse => "ERROR_RESPONSE",
        }
    }
}

/// CLI error
#[derive(Debug, Error)]
#[error("{}: {}", .code.code(), .message)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InvalidArgument, msg)
    }

    pub fn code(&self) -> CliErrorCode {
        self.code
    }

    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        let code = match e.kind() {
            StoreErrorKind::EmptyResponse => CliErrorCode::EmptyResponse,
            StoreErrorKind::DecodingError => CliErrorCode::DecodingError,
            StoreErrorKind::ErrorResponse => CliErrorCode::ErrorResponse,
        };
        Self::new(code, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
