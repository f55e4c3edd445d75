//! Batched writes.
//!
//! Inserts stream through `COPY … FROM STDIN` in text format, one round
//! trip for the whole batch. Deletes and updates run one parameterised
//! statement per element; a batch that lands partially reports the keys
//! that matched nothing.

use sqlx::postgres::PgPoolCopyExt;

use tabula_core::Error;
use tabula_data::sql::{self, TableSource};
use tabula_data::value::{DATETIME_FORMAT, DATE_FORMAT, TIME_FORMAT};
use tabula_data::{BulkStore, PkValue, Record, RecordDescriptor, SqlValue};

use crate::error::classify_with_statement;
use crate::executor;
use crate::store::PgStore;

impl<T: Record, I: Record> BulkStore<I> for PgStore<T> {
    async fn bulk_insert(&self, inputs: &[I]) -> Result<u64, Error> {
        if inputs.is_empty() {
            return Err(Error::config("inputs has len 0"));
        }
        let statement = copy_statement(&self.config.source, I::descriptor())?;
        let payload = copy_payload(inputs)?;

        let mut stream = self
            .pool
            .copy_in_raw(&statement)
            .await
            .map_err(|e| classify_with_statement(e, &statement))?;
        if let Err(e) = stream.send(payload.as_bytes()).await {
            return Err(classify_with_statement(e, &statement));
        }
        stream
            .finish()
            .await
            .map_err(|e| classify_with_statement(e, &statement))
    }

    async fn bulk_delete(&self, pks: &[PkValue]) -> Result<u64, Error> {
        let mut affected = 0;
        let mut unaffected = Vec::new();
        for pk in pks {
            let (statement, arg) =
                sql::build_delete(&self.config.source, &self.config.pk_column, *pk)?;
            let n = executor::execute(&self.pool, &statement, &[arg]).await?;
            if n == 0 {
                unaffected.push(pk.to_string());
            } else {
                affected += n;
            }
        }
        bulk_outcome(affected, unaffected)
    }

    async fn bulk_update(&self, inputs: &[(PkValue, I)]) -> Result<u64, Error> {
        let mut affected = 0;
        let mut unaffected = Vec::new();
        for (pk, input) in inputs {
            let fields = I::descriptor().extract(input)?;
            let (statement, args) = sql::build_update(
                &self.config.source,
                &self.config.pk_column,
                fields,
                &self.config.omit_on_update,
                *pk,
            )?;
            let n = executor::execute(&self.pool, &statement, &args).await?;
            if n == 0 {
                unaffected.push(pk.to_string());
            } else {
                affected += n;
            }
        }
        bulk_outcome(affected, unaffected)
    }
}

/// Only a mixed outcome is an error; "nothing matched" reports as zero.
fn bulk_outcome(affected: u64, unaffected: Vec<String>) -> Result<u64, Error> {
    if unaffected.is_empty() || affected == 0 {
        return Ok(affected);
    }
    Err(Error::BulkPartial {
        affected,
        unaffected,
    })
}

fn copy_statement(source: &TableSource, descriptor: &RecordDescriptor) -> Result<String, Error> {
    let (schema, name) = source.write_target()?;
    let columns = descriptor.insert_columns();
    if columns.is_empty() {
        return Err(Error::config("input record has no storage fields"));
    }
    let list = columns
        .iter()
        .map(|c| sql::quote_storage(c))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!(
        "COPY {schema}.{name} ({list}) FROM STDIN (FORMAT text)"
    ))
}

fn copy_payload<I: Record>(inputs: &[I]) -> Result<String, Error> {
    let descriptor = I::descriptor();
    let mut payload = String::new();
    for input in inputs {
        let values = descriptor.extract_all(input)?;
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                payload.push('\t');
            }
            write_copy_field(&mut payload, value)?;
        }
        payload.push('\n');
    }
    Ok(payload)
}

fn write_copy_field(out: &mut String, value: &SqlValue) -> Result<(), Error> {
    match value {
        SqlValue::Null(_) => out.push_str("\\N"),
        SqlValue::Bool(b) => out.push(if *b { 't' } else { 'f' }),
        SqlValue::Int(i) => out.push_str(&i.to_string()),
        SqlValue::Float(x) => out.push_str(&x.to_string()),
        SqlValue::Text(s) => escape_copy_text(out, s),
        SqlValue::Uuid(u) => out.push_str(&u.to_string()),
        SqlValue::Date(d) => out.push_str(&d.format(DATE_FORMAT).to_string()),
        SqlValue::Time(t) => out.push_str(&t.format(TIME_FORMAT).to_string()),
        SqlValue::DateTime(dt) => out.push_str(&dt.format(DATETIME_FORMAT).to_string()),
        SqlValue::Json(v) => {
            let raw = serde_json::to_string(v)?;
            escape_copy_text(out, &raw);
        }
        SqlValue::BoolSet(_)
        | SqlValue::IntSet(_)
        | SqlValue::FloatSet(_)
        | SqlValue::TextSet(_)
        | SqlValue::UuidSet(_)
        | SqlValue::DateSet(_)
        | SqlValue::TimeSet(_)
        | SqlValue::DateTimeSet(_) => {
            return Err(Error::config("set values cannot be bulk loaded"));
        }
    }
    Ok(())
}

fn escape_copy_text(out: &mut String, raw: &str) {
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
}
