//! Re-exports of the HTTP types used across the crate family.
//!
//! Downstream crates import axum types from here so that an axum upgrade is
//! a single-crate change.

pub use axum::{serve, Extension, Json, Router};
pub use axum::body::Body;
pub use axum::extract::rejection::BytesRejection;
pub use axum::extract::{DefaultBodyLimit, FromRequestParts, Path, Query, RawQuery, Request, State};
pub use axum::http::request::Parts;
pub use axum::http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
pub use axum::response::{IntoResponse, Response};
pub use axum::routing::{delete, get, patch, post, put};
pub use bytes::Bytes;
