//! Tabula — a descriptor-driven REST data gateway for PostgreSQL.
//!
//! This facade crate re-exports the tabula sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use tabula::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature    | Default | Crate              |
//! |------------|---------|--------------------|
//! | `postgres` | **yes** | `tabula-data-sqlx` |
//! | `rest`     | **yes** | `tabula-rest`      |
//!
//! `tabula-core` (error taxonomy, envelope, configuration, logging) and
//! `tabula-data` (descriptors, query language, SQL builders) are always
//! available.

pub use tabula_core;
pub use tabula_data;

#[cfg(feature = "postgres")]
pub use tabula_data_sqlx;

#[cfg(feature = "rest")]
pub use tabula_rest;

// Core types at the top level for convenience.
pub use tabula_core::*;

/// Unified prelude — import everything with `use tabula::prelude::*`.
///
/// Includes the data prelude plus types from all enabled feature crates.
pub mod prelude {
    pub use tabula_core::{Caller, CallerIdentity, Envelope, Error, ListMetadata, TabulaConfig};
    pub use tabula_data::prelude::*;

    #[cfg(feature = "postgres")]
    pub use tabula_data_sqlx::prelude::*;

    #[cfg(feature = "rest")]
    pub use tabula_rest::prelude::*;
}
