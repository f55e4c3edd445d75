//! Archive and restore.
//!
//! A row moves between the base table and its `_archived` sibling as an
//! insert-select plus a delete, both inside one transaction. The sibling
//! carries two extra columns, `archived_at` and `archived_by_cascade`; the
//! cascade flag distinguishes rows archived in their own right from rows
//! swept along by a parent, and a restore only touches rows archived with
//! the same flag.
//!
//! [`archive_in`] and [`restore_in`] run on a caller-supplied connection,
//! so a parent can sweep its children under one transaction. The
//! [`ArchiveStore`] impl wraps each call in its own.

use sqlx::{PgConnection, Row};

use tabula_core::Error;
use tabula_data::sql::{self, TableSource};
use tabula_data::{ArchiveStore, PkValue, Record};

use crate::error::{classify_with_statement, SqlxErrorExt};
use crate::executor;
use crate::store::PgStore;
use crate::tx::Tx;

impl<T: Record> ArchiveStore for PgStore<T> {
    async fn archive(&self, pk: PkValue, cascade: bool) -> Result<(), Error> {
        let target = self.config.archive_target()?;
        let mut tx = Tx::begin(&self.pool).await?;
        // An early error drops the transaction, which rolls back the copy.
        archive_in(tx.as_mut(), &target, &self.config.pk_column, pk, cascade).await?;
        tx.commit().await
    }

    async fn restore(&self, pk: PkValue, cascade: bool) -> Result<(), Error> {
        let target = self.config.archive_target()?;
        let mut tx = Tx::begin(&self.pool).await?;
        restore_in(tx.as_mut(), &target, &self.config.pk_column, pk, cascade).await?;
        tx.commit().await
    }
}

/// Moves one row into the `_archived` sibling on the caller's connection.
///
/// Opens no transaction of its own; callers that cascade over children run
/// several of these before committing once.
pub async fn archive_in(
    conn: &mut PgConnection,
    target: &TableSource,
    pk_column: &str,
    pk: PkValue,
    cascade: bool,
) -> Result<(), Error> {
    let columns = table_columns(conn, target).await?;
    let copy = sql::build_archive_copy(target, pk_column, &columns, cascade)?;
    let copied = executor::execute(&mut *conn, &copy, &[pk.to_sql()]).await?;
    if copied == 0 {
        return Err(Error::NotFound);
    }

    let (delete, arg) = sql::build_delete(target, pk_column, pk)?;
    executor::execute(conn, &delete, &[arg]).await?;
    Ok(())
}

/// Moves one row back out of the `_archived` sibling on the caller's
/// connection, provided its cascade flag matches.
pub async fn restore_in(
    conn: &mut PgConnection,
    target: &TableSource,
    pk_column: &str,
    pk: PkValue,
    cascade: bool,
) -> Result<(), Error> {
    let columns = table_columns(conn, target).await?;
    let copy = sql::build_restore_copy(target, pk_column, &columns, cascade)?;
    let restored = executor::execute(&mut *conn, &copy, &[pk.to_sql()]).await?;
    if restored == 0 {
        return Err(Error::NotFound);
    }

    let delete = sql::build_restore_delete(target, pk_column, cascade)?;
    executor::execute(conn, &delete, &[pk.to_sql()]).await?;
    Ok(())
}

/// Column list of the base table, fetched fresh on every call so schema
/// changes apply without a restart. The statement projects columns in
/// ordinal order, which keeps the two sides of the insert-select aligned.
async fn table_columns(
    conn: &mut PgConnection,
    target: &TableSource,
) -> Result<Vec<String>, Error> {
    let (schema, name) = target.write_target()?;
    let rows = sqlx::query(sql::TABLE_COLUMNS_STATEMENT)
        .bind(schema)
        .bind(name)
        .fetch_all(conn)
        .await
        .map_err(|e| classify_with_statement(e, sql::TABLE_COLUMNS_STATEMENT))?;
    rows.iter()
        .map(|row| row.try_get::<String, _>(0).map_err(SqlxErrorExt::classify))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::lazy_pool;
    use crate::store::StoreConfig;
    use serde::{Deserialize, Serialize};
    use std::sync::LazyLock;
    use tabula_data::{LogicalType, RecordDescriptor};

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Item {
        id: i64,
    }

    impl Record for Item {
        fn descriptor() -> &'static RecordDescriptor {
            static DESCRIPTOR: LazyLock<RecordDescriptor> = LazyLock::new(|| {
                RecordDescriptor::builder()
                    .field("id", "id", LogicalType::Int)
                    .build()
                    .expect("item descriptor")
            });
            &DESCRIPTOR
        }
    }

    #[tokio::test]
    async fn function_sources_cannot_be_archived() {
        let store: PgStore<Item> =
            PgStore::new(lazy_pool(), StoreConfig::set_func("api", "weekdays", &[]));
        let err = store.archive(PkValue::Int(1), false).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "config error: source has no base table to archive against"
        );
    }
}
