//! Endpoint handlers.
//!
//! Every handler follows the same arc: validate the path and body, run
//! the store operation, wrap the outcome in the envelope. Failures are
//! logged against the caller's identity before the response is written;
//! the HTTP status comes from the error taxonomy, never from the
//! envelope.

use serde::Serialize;
use uuid::Uuid;

use tabula_core::http::{
    Bytes, BytesRejection, HeaderMap, IntoResponse, Path, RawQuery, Response, State, StatusCode,
    CONTENT_TYPE,
};
use tabula_core::{parse_query_string, Caller, Envelope, Error, ListMetadata};
use tabula_data::descriptor::Record;
use tabula_data::params::OutputFormat;
use tabula_data::store::{ArchiveStore, BulkStore, MutateStore, SelectStore};
use tabula_data::value::PkValue;

use crate::body::parse_json;
use crate::resource::Resource;

/// GET `/<coll>`: list with the query-param language, or an export when
/// the format parameter selects one.
pub(crate) async fn list<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    RawQuery(query): RawQuery,
) -> Response
where
    T: Record,
    I: Record,
    S: SelectStore<T> + Clone + 'static,
{
    let result = async {
        let pairs = parse_query_string(query.as_deref());
        let params =
            tabula_data::parse::parse(&pairs, T::descriptor(), &resource.options, &resource.set_args)?;
        let rows = resource.store.select(&params).await?;
        if params.format == OutputFormat::Json {
            let total = resource.store.total(&params).await?;
            let metadata = ListMetadata {
                count: rows.len(),
                total_count: total.value,
                total_count_is_estimated: total.is_estimated,
            };
            let envelope = Envelope::success_with_metadata(serde_json::to_value(&rows)?, metadata);
            return Ok((StatusCode::OK, envelope).into_response());
        }
        let exporter = resource.exporter(params.format)?;
        let fields = T::descriptor().projection(params.fields.as_deref())?;
        let payload = exporter.write(&fields, &to_wire_rows(&rows)?)?;
        Ok(([(CONTENT_TYPE, exporter.content_type())], payload).into_response())
    }
    .await;
    match result {
        Ok(response) => response,
        Err(err) => fail(&caller, err),
    }
}

/// GET `/<coll>/{id}`: fetch one row by integer key.
pub(crate) async fn fetch<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Response
where
    T: Record,
    I: Record,
    S: SelectStore<T> + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        let row = resource.store.select_unique(int_id(&id)?).await?;
        Ok(Envelope::success(serde_json::to_value(&row)?))
    }
    .await;
    reply(&caller, StatusCode::OK, result)
}

/// GET `/<coll>-uuid/{id}`: fetch one row by UUID key.
pub(crate) async fn fetch_by_uuid<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Response
where
    T: Record,
    I: Record,
    S: SelectStore<T> + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        let row = resource.store.select_unique(uuid_id(&id)?).await?;
        Ok(Envelope::success(serde_json::to_value(&row)?))
    }
    .await;
    reply(&caller, StatusCode::OK, result)
}

/// POST `/<coll>`: insert one row, answering 201 with the generated key.
pub(crate) async fn create<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response
where
    T: Record,
    I: Record,
    S: MutateStore<T, I> + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        let body = read_body(body, resource.options.max_body_size)?;
        let input: I = parse_json(&headers, &body, resource.options.max_body_size)?;
        let (pk, _) = resource.store.insert(&input).await?;
        Ok(Envelope::success(pk.to_json()))
    }
    .await;
    reply(&caller, StatusCode::CREATED, result)
}

/// PUT `/<coll>/{id}`: full-row replace.
pub(crate) async fn replace<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response
where
    T: Record,
    I: Record,
    S: MutateStore<T, I> + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        let pk = int_id(&id)?;
        let body = read_body(body, resource.options.max_body_size)?;
        let input: I = parse_json(&headers, &body, resource.options.max_body_size)?;
        resource.store.update(pk, &input).await?;
        Ok(Envelope::success(serde_json::json!("updated")))
    }
    .await;
    reply(&caller, StatusCode::OK, result)
}

/// PATCH `/<coll>/{id}`: update the columns named in the body, subject
/// to the store's allow-list. Keys are storage names.
pub(crate) async fn patch<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response
where
    T: Record,
    I: Record,
    S: MutateStore<T, I> + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        let pk = int_id(&id)?;
        let body = read_body(body, resource.options.max_body_size)?;
        let patch: serde_json::Map<String, serde_json::Value> =
            parse_json(&headers, &body, resource.options.max_body_size)?;
        resource.store.update_partial(pk, &patch).await?;
        Ok(Envelope::success(serde_json::json!("updated")))
    }
    .await;
    reply(&caller, StatusCode::OK, result)
}

/// DELETE `/<coll>/{id}`: delete one row, refusing multi-row matches.
pub(crate) async fn remove<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Response
where
    T: Record,
    I: Record,
    S: MutateStore<T, I> + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        resource.store.delete_unique(int_id(&id)?).await?;
        Ok(Envelope::success(serde_json::json!("deleted")))
    }
    .await;
    reply(&caller, StatusCode::OK, result)
}

/// DELETE `/<coll>/{id}/archive`: move the row to the archive sibling.
pub(crate) async fn archive<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Response
where
    T: Record,
    I: Record,
    S: ArchiveStore + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        // Direct calls are never cascades; those come from code, not HTTP.
        resource.store.archive(int_id(&id)?, false).await?;
        Ok(Envelope::success(serde_json::json!("archived")))
    }
    .await;
    reply(&caller, StatusCode::OK, result)
}

/// POST `/<coll>/{id}/restore`: move the row back from the archive.
pub(crate) async fn restore<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    Path(id): Path<String>,
) -> Response
where
    T: Record,
    I: Record,
    S: ArchiveStore + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        resource.store.restore(int_id(&id)?, false).await?;
        Ok(Envelope::success(serde_json::json!("restored")))
    }
    .await;
    reply(&caller, StatusCode::OK, result)
}

/// POST `/<coll>/import`: bulk insert, answering with the loaded count.
pub(crate) async fn import<T, S, I>(
    State(resource): State<Resource<T, S, I>>,
    Caller(caller): Caller,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response
where
    T: Record,
    I: Record,
    S: BulkStore<I> + Clone + 'static,
{
    let result: Result<Envelope, Error> = async {
        let body = read_body(body, resource.options.max_body_size)?;
        let inputs: Vec<I> = parse_json(&headers, &body, resource.options.max_body_size)?;
        if inputs.is_empty() {
            return Err(Error::user("import requires at least one record"));
        }
        if inputs.len() > resource.options.max_import_records {
            return Err(Error::user(format!(
                "import accepts at most {} records, got {}",
                resource.options.max_import_records,
                inputs.len()
            )));
        }
        let count = resource.store.bulk_insert(&inputs).await?;
        Ok(Envelope::success(serde_json::Value::from(count)))
    }
    .await;
    reply(&caller, StatusCode::CREATED, result)
}

fn reply(caller: &str, status: StatusCode, result: Result<Envelope, Error>) -> Response {
    match result {
        Ok(envelope) => (status, envelope).into_response(),
        Err(err) => fail(caller, err),
    }
}

fn fail(caller: &str, err: Error) -> Response {
    err.log(caller);
    err.into_response()
}

fn int_id(raw: &str) -> Result<PkValue, Error> {
    raw.parse::<i64>()
        .map(PkValue::Int)
        .map_err(|_| Error::user("invalid id"))
}

fn uuid_id(raw: &str) -> Result<PkValue, Error> {
    Uuid::parse_str(raw)
        .map(PkValue::Uuid)
        .map_err(|_| Error::user("invalid id"))
}

// The framework's own over-limit rejection is plain text; remap it so the
// size rule always answers in the envelope.
fn read_body(body: Result<Bytes, BytesRejection>, max_size: usize) -> Result<Bytes, Error> {
    body.map_err(|_| Error::user(format!("request body exceeds {max_size} bytes")))
}

fn to_wire_rows<T: Serialize>(
    rows: &[T],
) -> Result<Vec<serde_json::Map<String, serde_json::Value>>, Error> {
    let mut wire = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::to_value(row)? {
            serde_json::Value::Object(map) => wire.push(map),
            _ => return Err(Error::internal("record did not serialise to a JSON object")),
        }
    }
    Ok(wire)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_ids_parse_or_read_as_invalid() {
        assert_eq!(int_id("41"), Ok(PkValue::Int(41)));
        assert_eq!(int_id("abc").unwrap_err().description(), "invalid id");
        assert_eq!(int_id("").unwrap_err().description(), "invalid id");

        let uuid = "c56a4180-65aa-42ec-a945-5fd21dec0538";
        assert_eq!(
            uuid_id(uuid),
            Ok(PkValue::Uuid(Uuid::parse_str(uuid).unwrap()))
        );
        assert_eq!(uuid_id("41").unwrap_err().description(), "invalid id");
    }

    #[test]
    fn wire_rows_must_be_objects() {
        #[derive(Serialize)]
        struct Row {
            id: i64,
        }
        let rows = to_wire_rows(&[Row { id: 1 }, Row { id: 2 }]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&serde_json::Value::from(1)));

        let err = to_wire_rows(&[1, 2]).unwrap_err();
        assert_eq!(err.description(), "An internal error occurred");
    }
}
