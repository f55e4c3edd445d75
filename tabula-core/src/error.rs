//! The error taxonomy shared by every layer.
//!
//! Errors are classified once, near the driver, and travel unchanged to the
//! response writer. User-caused errors keep their message; database and
//! internal errors surface to the caller only as a generic category message
//! while the full detail (including the failing statement) goes to the log.

use crate::envelope::Envelope;
use crate::http::{IntoResponse, Response, StatusCode};

/// Maximum number of characters of a failing statement kept on a log line.
pub const MAX_LOGGED_STATEMENT: usize = 5000;

/// Caller identity used when the request context carries none.
pub const UNKNOWN_CALLER: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bad input. Maps to 400 unless a more specific status is embedded
    /// (403 for permission, 422 for validation, and so on).
    User { message: String, status: StatusCode },
    /// The addressed row does not exist. Reported as 400 "invalid id".
    NotFound,
    /// Unique violation (SQLSTATE 23505).
    Conflict(String),
    /// Check or foreign-key violation (SQLSTATE 23514 / 23503). The message
    /// may include the constraint name and detail text.
    ConstraintViolation(String),
    /// The client went away. No response is written and nothing is logged.
    Canceled,
    /// The database aborted the statement (SQLSTATE 57014).
    PlannerCanceled,
    /// Driver or database failure that is not the caller's fault.
    Database {
        message: String,
        statement: Option<String>,
    },
    /// Failure outside the database (serialisation, pool exhaustion, bugs).
    Internal {
        message: String,
        statement: Option<String>,
    },
    /// Wiring mistake: bad descriptor, missing table, empty input batch.
    Config(String),
    /// A delete guarded by a uniqueness assumption matched more than one row.
    TooManyRows,
    /// A bulk operation affected some rows but not all of them.
    BulkPartial { affected: u64, unaffected: Vec<String> },
}

impl Error {
    pub fn user(message: impl Into<String>) -> Self {
        Error::User {
            message: message.into(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn user_with_status(message: impl Into<String>, status: StatusCode) -> Self {
        Error::User {
            message: message.into(),
            status,
        }
    }

    pub fn database(message: impl Into<String>) -> Self {
        Error::Database {
            message: message.into(),
            statement: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
            statement: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    /// Attach the failing SQL statement to a database or internal error.
    /// Other kinds are returned unchanged.
    pub fn with_statement(self, statement: &str) -> Self {
        match self {
            Error::Database { message, .. } => Error::Database {
                message,
                statement: Some(statement.to_string()),
            },
            Error::Internal { message, .. } => Error::Internal {
                message,
                statement: Some(statement.to_string()),
            },
            other => other,
        }
    }

    pub fn statement(&self) -> Option<&str> {
        match self {
            Error::Database { statement, .. } | Error::Internal { statement, .. } => {
                statement.as_deref()
            }
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Error::Canceled)
    }

    /// HTTP status accompanying the failure envelope.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::User { status, .. } => *status,
            Error::NotFound | Error::ConstraintViolation(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Canceled
            | Error::PlannerCanceled
            | Error::Database { .. }
            | Error::Internal { .. }
            | Error::Config(_)
            | Error::TooManyRows
            | Error::BulkPartial { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-visible description placed in `errDescription`.
    ///
    /// User-caused kinds keep their message; everything else collapses to a
    /// generic category message so that no internal detail leaks.
    pub fn description(&self) -> String {
        match self {
            Error::User { message, .. } => message.clone(),
            Error::NotFound => "invalid id".to_string(),
            Error::Conflict(message) => message.clone(),
            Error::ConstraintViolation(message) => message.clone(),
            Error::Canceled => String::new(),
            Error::PlannerCanceled => "process canceled in database".to_string(),
            Error::Database { .. } => "A database error occurred".to_string(),
            Error::Internal { .. } | Error::Config(_) | Error::TooManyRows => {
                "An internal error occurred".to_string()
            }
            Error::BulkPartial { unaffected, .. } => format!(
                "not all inputs were processed; unaffected: {}",
                unaffected.join(", ")
            ),
        }
    }

    /// Write the error to the log, tagged with the caller's identity.
    ///
    /// Client cancellation is never logged. User-caused kinds log at debug
    /// since their message already travels to the caller.
    pub fn log(&self, caller: &str) {
        match self {
            Error::Canceled => {}
            Error::User { .. }
            | Error::NotFound
            | Error::Conflict(_)
            | Error::ConstraintViolation(_) => {
                tracing::debug!(caller, error = %self, "request failed");
            }
            Error::Database { statement, .. } | Error::Internal { statement, .. } => {
                let statement = statement.as_deref().map(truncate_statement);
                tracing::error!(caller, error = %self, statement, "request failed");
            }
            Error::PlannerCanceled
            | Error::Config(_)
            | Error::TooManyRows
            | Error::BulkPartial { .. } => {
                tracing::error!(caller, error = %self, "request failed");
            }
        }
    }
}

/// Cut a statement down to [`MAX_LOGGED_STATEMENT`] characters.
pub fn truncate_statement(statement: &str) -> &str {
    match statement.char_indices().nth(MAX_LOGGED_STATEMENT) {
        Some((idx, _)) => &statement[..idx],
        None => statement,
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::User { message, .. } => write!(f, "user error: {message}"),
            Error::NotFound => write!(f, "row not found"),
            Error::Conflict(message) => write!(f, "conflict: {message}"),
            Error::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Error::Canceled => write!(f, "request canceled"),
            Error::PlannerCanceled => write!(f, "statement canceled by the database"),
            Error::Database { message, .. } => write!(f, "database error: {message}"),
            Error::Internal { message, .. } => write!(f, "internal error: {message}"),
            Error::Config(message) => write!(f, "config error: {message}"),
            Error::TooManyRows => write!(f, "statement matched more than one row"),
            Error::BulkPartial {
                affected,
                unaffected,
            } => write!(
                f,
                "bulk operation incomplete: {affected} rows affected, {} inputs unaffected",
                unaffected.len()
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::internal(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::internal(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if self.is_canceled() {
            // The client is gone; the body will never be read.
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        let status = self.status_code();
        (status, Envelope::failure(self.description())).into_response()
    }
}
