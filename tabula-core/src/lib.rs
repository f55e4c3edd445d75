//! Core types for the tabula data gateway.
//!
//! | Module | Contents |
//! |---|---|
//! | [`error`] | Error taxonomy, status mapping, statement truncation |
//! | [`envelope`] | The uniform response envelope |
//! | [`config`] | [`TabulaConfig`] and its YAML/env loader |
//! | [`context`] | Caller identity extractor |
//! | [`http`] | Re-exported axum/http types |
//! | [`params`] | Raw query-string parsing |
//! | [`logging`] | `tracing` subscriber setup |

pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod http;
pub mod logging;
pub mod params;

pub use config::TabulaConfig;
pub use context::{Caller, CallerIdentity};
pub use envelope::{Envelope, ListMetadata, Status};
pub use error::{truncate_statement, Error, MAX_LOGGED_STATEMENT, UNKNOWN_CALLER};
pub use logging::init_tracing;
pub use params::parse_query_string;
