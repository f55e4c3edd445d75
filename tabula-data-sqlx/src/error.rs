//! Driver-error classification.
//!
//! Errors are sorted into the shared taxonomy once, right where they leave
//! sqlx, keyed on SQLSTATE. Constraint kinds keep the driver's message and
//! detail because those are safe for clients; everything else surfaces
//! generically and carries the failing statement for the log line only.

use sqlx::postgres::PgDatabaseError;
use tabula_core::Error;

/// Convenience alias for store results.
pub type SqlxResult<T> = Result<T, Error>;

/// Bridge from `sqlx::Error` into the shared taxonomy.
///
/// Orphan rules keep `From<sqlx::Error> for Error` out of this crate, so
/// stores call `.classify()` at each await point instead.
pub trait SqlxErrorExt {
    fn classify(self) -> Error;
}

impl SqlxErrorExt for sqlx::Error {
    fn classify(self) -> Error {
        if matches!(self, sqlx::Error::RowNotFound) {
            return Error::NotFound;
        }
        match self.as_database_error() {
            Some(db) => {
                let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
                let detail = db
                    .try_downcast_ref::<PgDatabaseError>()
                    .and_then(|pg| pg.detail().map(str::to_string));
                classify_code(&code, db.message(), detail.as_deref())
            }
            None => Error::internal(self.to_string()),
        }
    }
}

/// Classify and attach the failing statement for the log line.
pub fn classify_with_statement(err: sqlx::Error, statement: &str) -> Error {
    err.classify().with_statement(statement)
}

fn classify_code(code: &str, message: &str, detail: Option<&str>) -> Error {
    let described = || match detail {
        Some(detail) => format!("{message}: {detail}"),
        None => message.to_string(),
    };
    match code {
        "23505" => Error::Conflict(described()),
        "23514" | "23503" => Error::ConstraintViolation(described()),
        "22P02" | "42704" => Error::user(message),
        "57014" => Error::PlannerCanceled,
        "42703" | "42P01" => Error::config(message),
        _ => Error::database(message),
    }
}
