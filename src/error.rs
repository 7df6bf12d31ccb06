//! Service-wide error types.
//!
//! Every boundary in the service reports failures through [`ServiceError`],
//! and wire-facing envelopes carry the coarse [`ErrorKind`] so that callers
//! (and the tool layer feeding results back to a model) can branch on the
//! failure class without parsing messages.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a failure, stable across the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NavigationTimeout,
    ScriptError,
    ScreenshotError,
    PdfError,
    StorageError,
    SessionGone,
    ToolUnknown,
    ToolExecError,
    ProviderError,
    JobNotFound,
    Fatal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NavigationTimeout => "navigation_timeout",
            Self::ScriptError => "script_error",
            Self::ScreenshotError => "screenshot_error",
            Self::PdfError => "pdf_error",
            Self::StorageError => "storage_error",
            Self::SessionGone => "session_gone",
            Self::ToolUnknown => "tool_unknown",
            Self::ToolExecError => "tool_exec_error",
            Self::ProviderError => "provider_error",
            Self::JobNotFound => "job_not_found",
            Self::Fatal => "fatal",
        }
    }
}

/// Error type for crawl, storage, job and tool-dispatch operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("navigation timed out after {0}ms")]
    NavigationTimeout(u64),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("script execution failed: {0}")]
    ScriptError(String),

    #[error("screenshot capture failed: {0}")]
    ScreenshotError(String),

    #[error("PDF generation failed: {0}")]
    PdfError(String),

    #[error("storage error: {0}")]
    StorageError(String),

    #[error("session '{0}' is gone")]
    SessionGone(String),

    #[error("unknown tool '{0}'")]
    ToolUnknown(String),

    #[error("tool '{name}' failed: {message}")]
    ToolExecError { name: String, message: String },

    #[error("provider '{provider}' error: {message}")]
    ProviderError { provider: String, message: String },

    #[error("job '{0}' not found")]
    JobNotFound(String),

    #[error("illegal job status transition: {from} -> {to}")]
    IllegalTransition { from: String, to: String },

    #[error("browser error: {0}")]
    BrowserError(String),

    #[error(transparent)]
    Fatal(#[from] anyhow::Error),
}

impl ServiceError {
    /// Map to the coarse wire-facing classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::IllegalTransition { .. } => ErrorKind::InvalidInput,
            Self::NavigationTimeout(_) => ErrorKind::NavigationTimeout,
            Self::NavigationFailed(_) | Self::BrowserError(_) => ErrorKind::Fatal,
            Self::ScriptError(_) => ErrorKind::ScriptError,
            Self::ScreenshotError(_) => ErrorKind::ScreenshotError,
            Self::PdfError(_) => ErrorKind::PdfError,
            Self::StorageError(_) => ErrorKind::StorageError,
            Self::SessionGone(_) => ErrorKind::SessionGone,
            Self::ToolUnknown(_) => ErrorKind::ToolUnknown,
            Self::ToolExecError { .. } => ErrorKind::ToolExecError,
            Self::ProviderError { .. } => ErrorKind::ProviderError,
            Self::JobNotFound(_) => ErrorKind::JobNotFound,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::StorageError(format!("{err:#}"))
    }
}
