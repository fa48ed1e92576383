use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::reconciliation::domain::Application;

/// Exit codes for the CLI application.
///
/// Client-class failures (missing rows, conflicts, bad input) are kept apart
/// from storage failures so scripts can decide whether a retry makes sense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success - every report was reconciled and committed
    Success = 0,
    /// The request referenced something missing, conflicting or malformed
    ClientError = 1,
    /// Invalid command-line arguments (clap parsing errors)
    InvalidArguments = 2,
    /// Application error (transaction failure, view refresh failure, file I/O error, etc.)
    ApplicationError = 3,
}

impl ExitCode {
    /// Convert to i32 for use with std::process::exit
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Maps an error chain to the exit code the CLI should report.
    pub fn for_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<ReconcileError>() {
            Some(e) if e.is_client_error() => ExitCode::ClientError,
            _ => ExitCode::ApplicationError,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitCode::Success => write!(f, "Success (0)"),
            ExitCode::ClientError => write!(f, "Client Error (1)"),
            ExitCode::InvalidArguments => write!(f, "Invalid Arguments (2)"),
            ExitCode::ApplicationError => write!(f, "Application Error (3)"),
        }
    }
}

/// Level of the tree at which a commit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeLevel {
    Package,
    Resource,
    Application,
}

impl fmt::Display for TreeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeLevel::Package => write!(f, "package"),
            TreeLevel::Resource => write!(f, "resource"),
            TreeLevel::Application => write!(f, "application"),
        }
    }
}

/// Errors surfaced by reconciliation, storage and view maintenance.
///
/// `NotFound`, `ConflictOnCreate` and `Validation` are client-class errors;
/// everything else means the storage layer or the process is unhealthy.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{entity} not found: {id}\n\n💡 Hint: Create the {entity} first or check the identifier")]
    NotFound { entity: &'static str, id: String },

    #[error("Application already exists: {} ({})\n\n💡 Hint: Use the existing application or update it instead of creating it again", existing.name, existing.id)]
    ConflictOnCreate { existing: Box<Application> },

    #[error("failed to update {level}: {details}\n\n💡 Hint: The transaction was rolled back; the reconciliation can be retried as-is")]
    TransactionFailure { level: TreeLevel, details: String },

    #[error("Failed to refresh materialized view {view}: {details}")]
    RefreshFailure { view: String, details: String },

    /// Validation error for malformed input values
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Failed to parse scan report: {path}\nDetails: {details}\n\n💡 Hint: Please verify that the file is a JSON scan report")]
    InvalidReportFile { path: PathBuf, details: String },

    #[error("Security violation: {path}\nReason: {reason}\n\n💡 Hint: {hint}")]
    SecurityError {
        path: PathBuf,
        reason: String,
        hint: String,
    },
}

impl ReconcileError {
    pub fn validation(message: impl Into<String>) -> Self {
        ReconcileError::Validation {
            message: message.into(),
        }
    }

    /// True for errors a caller should report back rather than retry.
    pub fn is_client_error(&self) -> bool {
        match self {
            ReconcileError::NotFound { .. }
            | ReconcileError::ConflictOnCreate { .. }
            | ReconcileError::Validation { .. }
            | ReconcileError::InvalidReportFile { .. }
            | ReconcileError::SecurityError { .. } => true,
            ReconcileError::TransactionFailure { .. } | ReconcileError::RefreshFailure { .. } => {
                false
            }
        }
    }
}
