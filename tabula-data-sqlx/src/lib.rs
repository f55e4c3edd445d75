//! # tabula-data-sqlx — SQLx PostgreSQL backend for the tabula data layer
//!
//! This crate provides the [SQLx](https://github.com/launchbadge/sqlx)-specific
//! implementation of the store contracts declared in [`tabula-data`]. It adds
//! the Postgres store, transaction handling, the adaptive row counter, and
//! the bridge from `sqlx::Error` into the shared error taxonomy.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`PgStore<T>`](PgStore) | Store for one record type over one source; implements every `tabula-data` store trait |
//! | [`StoreConfig`] | Source, key column, base table, patch allow-list and tuning for a store |
//! | [`Tx`] | Transaction handle — commit on success, rollback on drop |
//! | [`SqlxErrorExt`] | Extension trait classifying `sqlx::Error` into the taxonomy (`.classify()`) |
//! | [`SqlxResult<T>`](SqlxResult) | Type alias for `Result<T, tabula_core::Error>` |
//!
//! # Quick start
//!
//! ```ignore
//! use tabula_data_sqlx::{PgStore, StoreConfig};
//!
//! let store: PgStore<Item> = PgStore::new(
//!     pool.clone(),
//!     StoreConfig::relation("api", "items")
//!         .patch_fields(&["c_int", "c_text"])
//!         .options(config.clone()),
//! );
//!
//! let rows = store.select(&params).await?;
//! let total = store.total(&params).await?;
//! ```
//!
//! A function-backed source reads the same way; writes and archiving are
//! refused at configuration level:
//!
//! ```ignore
//! let weekdays: PgStore<Weekday> = PgStore::new(
//!     pool.clone(),
//!     StoreConfig::set_func("api", "weekdays", &["day_count"]),
//! );
//! ```
//!
//! # Counting
//!
//! `total` adapts to table size: small tables are counted exactly, large
//! ones answer from `pg_class.reltuples`, and a filtered query on a large
//! table asks the planner for its row estimate via `EXPLAIN (FORMAT JSON)`.
//! The boundary is `count_threshold` in the configuration.
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for tabula_core::Error`
//! cannot be implemented here. Use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use tabula_data_sqlx::SqlxErrorExt;
//!
//! let row = sqlx::query("SELECT ...")
//!     .fetch_one(&pool)
//!     .await
//!     .map_err(|e| e.classify())?;
//! ```

mod archive;
mod bulk;
mod count;
mod crud;
mod executor;

pub mod error;
pub mod store;
pub mod tx;

pub use archive::{archive_in, restore_in};
pub use error::{SqlxErrorExt, SqlxResult};
pub use store::{PgStore, StoreConfig};
pub use tx::Tx;

/// Re-exports of the most commonly used types from `tabula-data` and this
/// crate.
pub mod prelude {
    pub use crate::{PgStore, SqlxErrorExt, StoreConfig, Tx};
    pub use tabula_data::prelude::*;
}
