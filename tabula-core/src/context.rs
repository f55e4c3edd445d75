//! Caller identity plumbing.
//!
//! Authentication is an external concern: whatever middleware a deployment
//! uses is expected to insert a [`CallerIdentity`] into the request
//! extensions. The [`Caller`] extractor reads it back and falls back to
//! `"Unknown"` so that log lines always carry an identity.

use std::convert::Infallible;

use crate::error::UNKNOWN_CALLER;
use crate::http::{FromRequestParts, Parts};

/// Identity of the authenticated caller, as placed in request extensions
/// by the deployment's auth middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity(pub String);

impl CallerIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        CallerIdentity(name.into())
    }
}

/// Extractor yielding the caller's name for log attribution.
///
/// Never rejects: requests without an identity extension resolve to
/// `"Unknown"`.
///
/// ```ignore
/// async fn handler(Caller(name): Caller) -> String {
///     format!("hello, {name}")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Caller(pub String);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let name = parts
            .extensions
            .get::<CallerIdentity>()
            .map(|identity| identity.0.clone())
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string());
        Ok(Caller(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn falls_back_to_unknown() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let Caller(name) = Caller::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(name, "Unknown");
    }

    #[tokio::test]
    async fn reads_identity_from_extensions() {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        parts.extensions.insert(CallerIdentity::new("svc-batch"));
        let Caller(name) = Caller::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(name, "svc-batch");
    }
}
