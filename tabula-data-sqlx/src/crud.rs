//! Single-row writes.
//!
//! The input type `I` is reflected through its own descriptor, so create
//! and replace payloads may be a narrower type than the stored record. The
//! stored row is re-read after an insert to pick up generated columns.

use tabula_core::Error;
use tabula_data::sql;
use tabula_data::{MutateStore, PkValue, Record, SelectStore};

use crate::executor;
use crate::store::PgStore;
use crate::tx::Tx;

impl<T: Record, I: Record> MutateStore<T, I> for PgStore<T> {
    async fn insert(&self, input: &I) -> Result<(PkValue, T), Error> {
        let pk_logical = self.pk_logical()?;
        let fields = I::descriptor().extract(input)?;
        let (statement, args) =
            sql::build_insert(&self.config.source, &self.config.pk_column, fields)?;
        let pk = executor::fetch_returned_key(&self.pool, &statement, &args, pk_logical).await?;
        let row = self.select_unique(pk).await?;
        Ok((pk, row))
    }

    async fn update(&self, pk: PkValue, input: &I) -> Result<(), Error> {
        let fields = I::descriptor().extract(input)?;
        let (statement, args) = sql::build_update(
            &self.config.source,
            &self.config.pk_column,
            fields,
            &self.config.omit_on_update,
            pk,
        )?;
        let affected = executor::execute(&self.pool, &statement, &args).await?;
        if affected == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn update_partial(
        &self,
        pk: PkValue,
        patch: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), Error> {
        let (statement, args) = sql::build_update_partial(
            &self.config.source,
            self.descriptor(),
            &self.config.pk_column,
            patch,
            &self.config.patch_fields,
            pk,
        )?;
        let affected = executor::execute(&self.pool, &statement, &args).await?;
        if affected == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, pk: PkValue) -> Result<(), Error> {
        let (statement, arg) = sql::build_delete(&self.config.source, &self.config.pk_column, pk)?;
        let affected = executor::execute(&self.pool, &statement, &[arg]).await?;
        if affected == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    async fn delete_unique(&self, pk: PkValue) -> Result<(), Error> {
        let (statement, arg) = sql::build_delete(&self.config.source, &self.config.pk_column, pk)?;
        let mut tx = Tx::begin(&self.pool).await?;
        let affected = executor::execute(tx.as_mut(), &statement, &[arg]).await?;
        // Any outcome but exactly one row leaves the transaction to roll
        // back on drop.
        match affected {
            1 => tx.commit().await,
            0 => Err(Error::NotFound),
            _ => Err(Error::TooManyRows),
        }
    }
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
        c_int: i64,
        c_text: Option<String>,
    }

    impl Record for Item {
        fn descriptor() -> &'static RecordDescriptor {
            static DESCRIPTOR: LazyLock<RecordDescriptor> = LazyLock::new(|| {
                RecordDescriptor::builder()
                    .field("id", "id", LogicalType::Int)
                    .field("c_int", "c_int", LogicalType::Int)
                    .field("c_text", "c_text", LogicalType::Text)
                    .build()
                    .expect("item descriptor")
            });
            &DESCRIPTOR
        }
    }

    fn store(config: StoreConfig) -> PgStore<Item> {
        PgStore::new(lazy_pool(), config)
    }

    // Wiring mistakes must surface before any round-trip is attempted;
    // these stores are backed by a pool that cannot connect.

    #[tokio::test]
    async fn writes_to_function_sources_are_refused() {
        let store = store(StoreConfig::set_func("api", "weekdays", &["day_count"]));
        let err = store.delete(PkValue::Int(1)).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn insert_requires_a_described_key_column() {
        let store = store(StoreConfig::relation("api", "items").pk_column("item_id"));
        let err = store.insert(&Item::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "config error: key column item_id is not described");
    }

    #[tokio::test]
    async fn patches_outside_the_allow_list_are_refused() {
        let store = store(StoreConfig::relation("api", "items").patch_fields(&["c_text"]));
        let patch = serde_json::json!({ "c_int": 7 });
        let serde_json::Value::Object(patch) = patch else {
            unreachable!()
        };
        let err = store
            .update_partial(PkValue::Int(1), &patch)
            .await
            .unwrap_err();
        assert_eq!(err.description(), "invalid field: c_int");
    }
}
