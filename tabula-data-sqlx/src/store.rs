//! The Postgres-backed store.
//!
//! [`PgStore`] satisfies the `tabula-data` store contracts for one record
//! type against one source. Everything it needs beyond the pool lives in a
//! [`StoreConfig`]: the source, the key column, the table whose statistics
//! drive counting, and the columns a partial update may touch.

use std::marker::PhantomData;

use sqlx::PgPool;

use tabula_core::{Error, TabulaConfig};
use tabula_data::sql::{self, TableSource};
use tabula_data::{PkValue, Record, SelectParams, SelectStore, TotalCount};
use tabula_data::{LogicalType, RecordDescriptor};

use crate::{count, executor};

/// Everything a [`PgStore`] knows about its relation.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub(crate) source: TableSource,
    pub(crate) pk_column: String,
    /// Schema-qualified table behind the source. Drives the adaptive
    /// counter and the archive protocol; a function-backed source has none.
    pub(crate) base_table: Option<(String, String)>,
    /// Storage names a partial update may assign. Empty refuses every patch.
    pub(crate) patch_fields: Vec<String>,
    /// Storage names a full update leaves alone, e.g. creation stamps.
    pub(crate) omit_on_update: Vec<String>,
    pub(crate) options: TabulaConfig,
}

impl StoreConfig {
    /// A store over a table or updatable view.
    pub fn relation(schema: impl Into<String>, name: impl Into<String>) -> Self {
        let schema = schema.into();
        let name = name.into();
        StoreConfig {
            source: TableSource::relation(schema.clone(), name.clone()),
            pk_column: "id".to_string(),
            base_table: Some((schema, name)),
            patch_fields: Vec::new(),
            omit_on_update: Vec::new(),
            options: TabulaConfig::default(),
        }
    }

    /// A read-only store over a table-valued function. Totals report as an
    /// estimated zero and writes are refused.
    pub fn set_func(
        schema: impl Into<String>,
        name: impl Into<String>,
        arg_names: &[&str],
    ) -> Self {
        StoreConfig {
            source: TableSource::set_func(schema, name, arg_names),
            pk_column: "id".to_string(),
            base_table: None,
            patch_fields: Vec::new(),
            omit_on_update: Vec::new(),
            options: TabulaConfig::default(),
        }
    }

    pub fn pk_column(mut self, column: impl Into<String>) -> Self {
        self.pk_column = column.into();
        self
    }

    /// Count and archive against a table other than the read source, for
    /// the case where reads go through a view.
    pub fn base_table(mut self, schema: impl Into<String>, name: impl Into<String>) -> Self {
        self.base_table = Some((schema.into(), name.into()));
        self
    }

    /// Forget the base table; totals report as an estimated zero.
    pub fn without_base_table(mut self) -> Self {
        self.base_table = None;
        self
    }

    /// Storage names a partial update may assign.
    pub fn patch_fields(mut self, fields: &[&str]) -> Self {
        self.patch_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Storage names a full update leaves alone.
    pub fn omit_on_update(mut self, fields: &[&str]) -> Self {
        self.omit_on_update = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn options(mut self, options: TabulaConfig) -> Self {
        self.options = options;
        self
    }

    pub fn source(&self) -> &TableSource {
        &self.source
    }

    pub(crate) fn qualified_base(&self) -> Option<String> {
        self.base_table
            .as_ref()
            .map(|(schema, name)| format!("{schema}.{name}"))
    }

    /// The archive protocol operates on the base table, never on a view.
    pub(crate) fn archive_target(&self) -> Result<TableSource, Error> {
        match &self.base_table {
            Some((schema, name)) => Ok(TableSource::relation(schema.clone(), name.clone())),
            None => Err(Error::config("source has no base table to archive against")),
        }
    }
}

/// A [`Record`] store backed by a Postgres pool.
pub struct PgStore<T> {
    pub(crate) pool: PgPool,
    pub(crate) config: StoreConfig,
    record: PhantomData<T>,
}

impl<T> Clone for PgStore<T> {
    fn clone(&self) -> Self {
        PgStore {
            pool: self.pool.clone(),
            config: self.config.clone(),
            record: PhantomData,
        }
    }
}

impl<T: Record> PgStore<T> {
    pub fn new(pool: PgPool, config: StoreConfig) -> Self {
        PgStore {
            pool,
            config,
            record: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn descriptor(&self) -> &'static RecordDescriptor {
        T::descriptor()
    }

    /// Logical type of the key column, for decoding `RETURNING` values.
    pub(crate) fn pk_logical(&self) -> Result<LogicalType, Error> {
        self.descriptor()
            .storage_field(&self.config.pk_column)
            .map(|field| field.logical())
            .ok_or_else(|| {
                Error::config(format!(
                    "key column {} is not described",
                    self.config.pk_column
                ))
            })
    }
}

impl<T: Record> SelectStore<T> for PgStore<T> {
    async fn select(&self, params: &SelectParams) -> Result<Vec<T>, Error> {
        let descriptor = self.descriptor();
        let built = sql::build_select(&self.config.source, descriptor, params)?;
        let projection = descriptor.projection(params.fields.as_deref())?;
        executor::fetch_records(&self.pool, &built.statement, &built.args, &projection).await
    }

    async fn total(&self, params: &SelectParams) -> Result<TotalCount, Error> {
        let built = sql::build_select(&self.config.source, self.descriptor(), params)?;
        count::total(
            &self.pool,
            self.config.qualified_base().as_deref(),
            &built,
            self.config.options.count_threshold,
        )
        .await
    }

    async fn select_unique(&self, pk: PkValue) -> Result<T, Error> {
        let descriptor = self.descriptor();
        let (statement, arg) =
            sql::build_select_one(&self.config.source, descriptor, &self.config.pk_column, pk)?;
        let projection = descriptor.projection(None)?;
        executor::fetch_record(&self.pool, &statement, &[arg], &projection).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sqlx::postgres::PgConnectOptions;

    /// A pool that never connects; statement building happens client-side.
    pub(crate) fn lazy_pool() -> PgPool {
        PgPool::connect_lazy_with(PgConnectOptions::new().host("localhost").database("unused"))
    }

    #[test]
    fn relation_config_defaults() {
        let config = StoreConfig::relation("api", "items");
        assert_eq!(config.pk_column, "id");
        assert_eq!(config.qualified_base().as_deref(), Some("api.items"));
        assert!(config.patch_fields.is_empty());
    }

    #[test]
    fn view_reads_can_count_another_table() {
        let config = StoreConfig::relation("api", "items_view").base_table("public", "items");
        assert_eq!(config.qualified_base().as_deref(), Some("public.items"));
        let target = config.archive_target().unwrap();
        assert_eq!(target, TableSource::relation("public", "items"));
    }

    #[test]
    fn set_func_config_has_no_base() {
        let config = StoreConfig::set_func("api", "weekdays", &["day_count"]);
        assert_eq!(config.qualified_base(), None);
        let err = config.archive_target().unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }
}
