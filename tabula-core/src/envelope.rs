//! The uniform response envelope.
//!
//! Every endpoint, success or failure, answers with the same JSON shape:
//!
//! ```json
//! { "status": "succeeded", "data": ..., "metadata": { ... } }
//! { "status": "failed", "errDescription": "..." }
//! ```
//!
//! Exactly one of `data` or `errDescription` is populated on a terminal
//! response; the constructors enforce this. The HTTP status code is carried
//! separately and is independent of the envelope status.

use serde::Serialize;

use crate::http::{IntoResponse, Json, Response};

/// Terminal state of a request, as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Succeeded,
    Failed,
}

/// Paging metadata attached to successful list responses.
///
/// `total_count` is the number of rows the query would return without
/// paging. It may be an estimate (table statistics or planner output) for
/// large relations, in which case `total_count_is_estimated` is `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMetadata {
    /// Number of rows in this page.
    pub count: usize,
    /// Total rows matching the query across all pages.
    pub total_count: i64,
    /// Whether `total_count` came from statistics rather than a real count.
    pub total_count_is_estimated: bool,
}

/// The response envelope shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ListMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_description: Option<String>,
}

impl Envelope {
    /// Successful envelope carrying a payload.
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            status: Status::Succeeded,
            data: Some(data),
            metadata: None,
            err_description: None,
        }
    }

    /// Successful list envelope with paging metadata.
    pub fn success_with_metadata(data: serde_json::Value, metadata: ListMetadata) -> Self {
        Self {
            status: Status::Succeeded,
            data: Some(data),
            metadata: Some(metadata),
            err_description: None,
        }
    }

    /// Failed envelope carrying a caller-visible description.
    pub fn failure(description: impl Into<String>) -> Self {
        Self {
            status: Status::Failed,
            data: None,
            metadata: None,
            err_description: Some(description.into()),
        }
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
