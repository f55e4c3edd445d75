//! Store contracts.
//!
//! One small trait per operation family, so a concrete store only has to
//! satisfy the contracts its resource actually exposes and handlers stay
//! generic over the backend. The SQL implementations live in
//! `tabula-data-sqlx`; tests substitute in-memory fakes.

use std::future::Future;

use tabula_core::Error;

use crate::descriptor::Record;
use crate::params::{SelectParams, TotalCount};
use crate::value::PkValue;

/// Read operations of a list source.
///
/// `select` and `total` take the same parameters; `total` reports the
/// pre-paging row count and whether it was estimated rather than counted.
pub trait SelectStore<T: Record>: Send + Sync {
    /// Rows matching `params`, paged and ordered.
    fn select(&self, params: &SelectParams)
        -> impl Future<Output = Result<Vec<T>, Error>> + Send;

    /// Pre-paging total for the same parameters.
    fn total(
        &self,
        params: &SelectParams,
    ) -> impl Future<Output = Result<TotalCount, Error>> + Send;

    /// Exactly one row by key, or [`Error::NotFound`].
    fn select_unique(&self, pk: PkValue) -> impl Future<Output = Result<T, Error>> + Send;
}

/// Single-row write operations.
pub trait MutateStore<T: Record, I: Record>: Send + Sync {
    /// Insert `input` and return the generated key together with the stored
    /// row, re-read so computed columns are populated.
    fn insert(&self, input: &I) -> impl Future<Output = Result<(PkValue, T), Error>> + Send;

    /// Full-row update. [`Error::NotFound`] when the key matches nothing.
    fn update(&self, pk: PkValue, input: &I)
        -> impl Future<Output = Result<(), Error>> + Send;

    /// Update only the columns named in `patch` (storage names), checked
    /// against the store's allow-list.
    fn update_partial(
        &self,
        pk: PkValue,
        patch: &serde_json::Map<String, serde_json::Value>,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Delete by key. [`Error::NotFound`] when the key matches nothing.
    fn delete(&self, pk: PkValue) -> impl Future<Output = Result<(), Error>> + Send;

    /// Delete by key inside a transaction, rolling back with
    /// [`Error::TooManyRows`] if more than one row would go.
    fn delete_unique(&self, pk: PkValue) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Archive-table protocol: move rows to and from the `_archived` sibling.
pub trait ArchiveStore: Send + Sync {
    /// Move the row into the archive sibling, stamping the cascade flag.
    fn archive(
        &self,
        pk: PkValue,
        cascade: bool,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Move the row back, provided it was archived with the same flag.
    fn restore(
        &self,
        pk: PkValue,
        cascade: bool,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Batched writes.
pub trait BulkStore<I: Record>: Send + Sync {
    /// Stream every input in one bulk load; returns the inserted count.
    fn bulk_insert(&self, inputs: &[I]) -> impl Future<Output = Result<u64, Error>> + Send;

    /// One delete per key. Partial completion is [`Error::BulkPartial`]
    /// listing the keys that matched nothing.
    fn bulk_delete(&self, pks: &[PkValue]) -> impl Future<Output = Result<u64, Error>> + Send;

    /// One full-row update per entry, with the same partial semantics as
    /// [`bulk_delete`](Self::bulk_delete).
    fn bulk_update(
        &self,
        inputs: &[(PkValue, I)],
    ) -> impl Future<Output = Result<u64, Error>> + Send;
}
