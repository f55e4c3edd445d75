//! # tabula-rest — REST resource router for tabula stores
//!
//! This crate turns a store from [`tabula-data`] into an
//! [axum](https://github.com/tokio-rs/axum) router exposing the uniform
//! CRUD surface: list with the query-param language, fetch by integer or
//! UUID key, create, replace, patch, delete, archive/restore and bulk
//! import. Every endpoint answers with the shared response envelope.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Resource<T, S, I>`](Resource) | Builder binding a record type and a store to one collection |
//! | [`Exporter`] | Seam rendering list rows as csv or excel downloads |
//!
//! # Quick start
//!
//! ```ignore
//! use tabula_rest::Resource;
//!
//! let items = Resource::new(store)
//!     .options(config.clone())
//!     .router("items");
//!
//! let weekdays = Resource::new(weekday_store)
//!     .set_args(&["vals"])
//!     .read_only_router("weekdays");
//!
//! let app = items.merge(weekdays);
//! axum::serve(listener, app).await?;
//! ```
//!
//! # Routes
//!
//! [`Resource::router`] registers, for a collection named `items`:
//!
//! | Method | Path | Semantics |
//! |--------|------|-----------|
//! | GET | `/items` | list (json, or an export via `xformat`) |
//! | POST | `/items` | create, answers 201 with the new key |
//! | GET | `/items/{id}` | fetch by integer key |
//! | GET | `/items-uuid/{id}` | fetch by UUID key |
//! | PUT | `/items/{id}` | full replace |
//! | PATCH | `/items/{id}` | partial update against the allow-list |
//! | DELETE | `/items/{id}` | delete exactly one row |
//! | DELETE | `/items/{id}/archive` | move the row to the archive sibling |
//! | POST | `/items/{id}/restore` | move the row back |
//! | POST | `/items/import` | bulk insert, answers 201 with the count |
//!
//! [`Resource::read_only_router`] registers the three GET routes only and
//! asks nothing of the store beyond `SelectStore`.
//!
//! # Bodies
//!
//! A body-carrying request must declare `Content-Type: application/json`,
//! stay within `max_body_size` and parse as non-empty JSON; each violation
//! is a 400 in the envelope. Caller identity for log attribution is read
//! from the [`CallerIdentity`](tabula_core::CallerIdentity) request
//! extension, falling back to `"Unknown"`.

mod body;
mod handlers;

pub mod export;
pub mod resource;

pub use export::Exporter;
pub use resource::Resource;

/// Re-exports of the most commonly used types from the crate family.
pub mod prelude {
    pub use crate::{Exporter, Resource};
    pub use tabula_data::prelude::*;
}
