//! Transaction handle.

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use tabula_core::Error;

use crate::error::SqlxErrorExt;

/// An open transaction. Dropping the handle without committing rolls the
/// transaction back, so every early `?` return leaves the database clean.
pub struct Tx(Transaction<'static, Postgres>);

impl Tx {
    pub async fn begin(pool: &PgPool) -> Result<Tx, Error> {
        let tx = pool.begin().await.map_err(SqlxErrorExt::classify)?;
        Ok(Tx(tx))
    }

    pub async fn commit(self) -> Result<(), Error> {
        self.0.commit().await.map_err(SqlxErrorExt::classify)
    }

    pub async fn rollback(self) -> Result<(), Error> {
        self.0.rollback().await.map_err(SqlxErrorExt::classify)
    }

    /// The underlying connection, usable as an executor.
    pub fn as_mut(&mut self) -> &mut PgConnection {
        &mut self.0
    }
}
