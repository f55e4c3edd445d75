use std::sync::{Arc, LazyLock, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use uuid::Uuid;

use tabula_core::{Error, TabulaConfig};
use tabula_data::descriptor::{Record, RecordDescriptor};
use tabula_data::params::{SelectParams, TotalCount};
use tabula_data::store::{ArchiveStore, BulkStore, MutateStore, SelectStore};
use tabula_data::value::{LogicalType, PkValue};
use tabula_rest::{Exporter, Resource};

const KNOWN_UUID: &str = "c56a4180-65aa-42ec-a945-5fd21dec0538";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    id: i64,
    c_text: Option<String>,
}

static ITEM: LazyLock<RecordDescriptor> = LazyLock::new(|| {
    RecordDescriptor::builder()
        .field("id", "id", LogicalType::Int)
        .field("c_text", "cText", LogicalType::Text)
        .default_order(&["id"])
        .build()
        .unwrap()
});

impl Record for Item {
    fn descriptor() -> &'static RecordDescriptor {
        &ITEM
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemInput {
    c_text: Option<String>,
}

static ITEM_INPUT: LazyLock<RecordDescriptor> = LazyLock::new(|| {
    RecordDescriptor::builder()
        .field("c_text", "cText", LogicalType::Text)
        .build()
        .unwrap()
});

impl Record for ItemInput {
    fn descriptor() -> &'static RecordDescriptor {
        &ITEM_INPUT
    }
}

fn item(id: i64, text: &str) -> Item {
    Item {
        id,
        c_text: Some(text.to_string()),
    }
}

/// Serves two fixed rows; id 7 (or the known UUID) is the only row that
/// single-row operations find.
#[derive(Clone, Default)]
struct MockStore {
    selects: Arc<Mutex<Vec<SelectParams>>>,
}

fn known(pk: PkValue) -> Result<(), Error> {
    if pk == PkValue::Int(7) {
        Ok(())
    } else {
        Err(Error::NotFound)
    }
}

impl SelectStore<Item> for MockStore {
    async fn select(&self, params: &SelectParams) -> Result<Vec<Item>, Error> {
        self.selects.lock().unwrap().push(params.clone());
        Ok(vec![item(7, "first"), item(9, "second")])
    }

    async fn total(&self, _params: &SelectParams) -> Result<TotalCount, Error> {
        Ok(TotalCount {
            value: 40_123,
            is_estimated: true,
        })
    }

    async fn select_unique(&self, pk: PkValue) -> Result<Item, Error> {
        match pk {
            PkValue::Int(7) => Ok(item(7, "first")),
            PkValue::Uuid(u) if u == Uuid::parse_str(KNOWN_UUID).unwrap() => Ok(item(7, "first")),
            _ => Err(Error::NotFound),
        }
    }
}

impl MutateStore<Item, ItemInput> for MockStore {
    async fn insert(&self, input: &ItemInput) -> Result<(PkValue, Item), Error> {
        Ok((
            PkValue::Int(8),
            Item {
                id: 8,
                c_text: input.c_text.clone(),
            },
        ))
    }

    async fn update(&self, pk: PkValue, _input: &ItemInput) -> Result<(), Error> {
        known(pk)
    }

    async fn update_partial(
        &self,
        pk: PkValue,
        _patch: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), Error> {
        known(pk)
    }

    async fn delete(&self, pk: PkValue) -> Result<(), Error> {
        known(pk)
    }

    async fn delete_unique(&self, pk: PkValue) -> Result<(), Error> {
        known(pk)
    }
}

impl ArchiveStore for MockStore {
    async fn archive(&self, pk: PkValue, cascade: bool) -> Result<(), Error> {
        if cascade {
            return Err(Error::config("handlers never cascade"));
        }
        known(pk)
    }

    async fn restore(&self, pk: PkValue, cascade: bool) -> Result<(), Error> {
        if cascade {
            return Err(Error::config("handlers never cascade"));
        }
        known(pk)
    }
}

impl BulkStore<ItemInput> for MockStore {
    async fn bulk_insert(&self, inputs: &[ItemInput]) -> Result<u64, Error> {
        Ok(inputs.len() as u64)
    }

    async fn bulk_delete(&self, pks: &[PkValue]) -> Result<u64, Error> {
        Ok(pks.len() as u64)
    }

    async fn bulk_update(&self, inputs: &[(PkValue, ItemInput)]) -> Result<u64, Error> {
        Ok(inputs.len() as u64)
    }
}

fn resource() -> Resource<Item, MockStore, ItemInput> {
    Resource::new(MockStore::default())
}

fn router() -> axum::Router {
    resource().router("items")
}

async fn send_request(
    router: axum::Router,
    method: &str,
    path: &str,
    headers: &[(&str, &str)],
    body: Body,
) -> axum::http::Response<Body> {
    let mut builder = Request::builder().method(method).uri(path);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let req = builder.body(body).unwrap();
    router.oneshot(req).await.unwrap()
}

async fn send(router: axum::Router, method: &str, path: &str) -> (StatusCode, serde_json::Value) {
    let resp = send_request(router, method, path, &[], Body::empty()).await;
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn send_json(
    router: axum::Router,
    method: &str,
    path: &str,
    payload: &str,
) -> (StatusCode, serde_json::Value) {
    let resp = send_request(
        router,
        method,
        path,
        &[("content-type", "application/json")],
        Body::from(payload.to_string()),
    )
    .await;
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap())
}

fn failed(description: &str) -> serde_json::Value {
    serde_json::json!({ "status": "failed", "errDescription": description })
}

// ── Listing ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_wraps_rows_and_paging_metadata() {
    let (status, body) = send(router(), "GET", "/items").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({
            "status": "succeeded",
            "data": [
                { "id": 7, "cText": "first" },
                { "id": 9, "cText": "second" },
            ],
            "metadata": {
                "count": 2,
                "totalCount": 40123,
                "totalCountIsEstimated": true,
            },
        })
    );
}

#[tokio::test]
async fn list_parse_failures_are_user_errors() {
    let (status, body) = send(router(), "GET", "/items?bogus=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("invalid filter field: bogus"));
}

#[tokio::test]
async fn set_args_pass_through_as_raw_text() {
    let store = MockStore::default();
    let router = Resource::<Item, MockStore, ItemInput>::new(store.clone())
        .set_args(&["vals"])
        .read_only_router("weekdays");

    let (status, _) = send(router.clone(), "GET", "/weekdays?vals=Sunday,Monday").await;
    assert_eq!(status, StatusCode::OK);
    let seen = store.selects.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].set_args, vec!["Sunday,Monday".to_string()]);
    drop(seen);

    let (status, body) = send(router, "GET", "/weekdays").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("setFunc param name vals is missing"));
}

// ── Fetching ────────────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_answers_a_single_row() {
    let (status, body) = send(router(), "GET", "/items/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({
            "status": "succeeded",
            "data": { "id": 7, "cText": "first" },
        })
    );
}

#[tokio::test]
async fn fetch_by_uuid_parses_the_key() {
    let path = format!("/items-uuid/{KNOWN_UUID}");
    let (status, body) = send(router(), "GET", &path).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "succeeded");

    let (status, body) = send(router(), "GET", "/items-uuid/41").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("invalid id"));
}

#[tokio::test]
async fn malformed_ids_fail_before_the_store() {
    let (status, body) = send(router(), "GET", "/items/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("invalid id"));
}

#[tokio::test]
async fn missing_rows_read_as_invalid_id() {
    let (status, body) = send(router(), "GET", "/items/41").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("invalid id"));
}

// ── Writing ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_answers_201_with_the_new_key() {
    let (status, body) = send_json(router(), "POST", "/items", r#"{"cText":"boots"}"#).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        serde_json::json!({ "status": "succeeded", "data": 8 })
    );
}

#[tokio::test]
async fn replace_and_patch_confirm_with_updated() {
    let (status, body) = send_json(router(), "PUT", "/items/7", r#"{"cText":"x"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({ "status": "succeeded", "data": "updated" })
    );

    // Patch bodies carry storage column names.
    let (status, body) = send_json(router(), "PATCH", "/items/7", r#"{"c_text":"x"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({ "status": "succeeded", "data": "updated" })
    );

    let (status, body) = send_json(router(), "PUT", "/items/41", r#"{"cText":"x"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("invalid id"));
}

#[tokio::test]
async fn delete_confirms_with_deleted() {
    let (status, body) = send(router(), "DELETE", "/items/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({ "status": "succeeded", "data": "deleted" })
    );

    let (status, body) = send(router(), "DELETE", "/items/41").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("invalid id"));
}

// ── Archive protocol ────────────────────────────────────────────────────

#[tokio::test]
async fn archive_and_restore_confirm() {
    let (status, body) = send(router(), "DELETE", "/items/7/archive").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({ "status": "succeeded", "data": "archived" })
    );

    let (status, body) = send(router(), "POST", "/items/7/restore").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({ "status": "succeeded", "data": "restored" })
    );
}

#[tokio::test]
async fn archiving_a_missing_row_fails() {
    let (status, body) = send(router(), "DELETE", "/items/41/archive").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("invalid id"));
}

// ── Body rules ──────────────────────────────────────────────────────────

fn small_body_router() -> axum::Router {
    resource()
        .options(TabulaConfig {
            max_body_size: 64,
            ..TabulaConfig::default()
        })
        .router("items")
}

#[tokio::test]
async fn bodies_must_declare_json() {
    let resp = send_request(
        router(),
        "POST",
        "/items",
        &[("content-type", "text/plain")],
        Body::from("{}"),
    )
    .await;
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&body).unwrap(),
        failed("Content-Type header is not application/json")
    );
}

#[tokio::test]
async fn bodies_must_not_be_empty() {
    let (status, body) = send_json(router(), "POST", "/items", "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("request body is empty"));
}

#[tokio::test]
async fn malformed_bodies_are_user_errors() {
    let (status, body) = send_json(router(), "POST", "/items", "{oops").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "failed");
    let description = body["errDescription"].as_str().unwrap();
    assert!(
        description.starts_with("invalid request body: "),
        "got {description:?}"
    );
}

#[tokio::test]
async fn oversize_bodies_answer_in_the_envelope() {
    // One byte past the limit still reaches the handler's own size rule.
    let just_over = format!(r#"{{"cText":"{}"}}"#, "x".repeat(53));
    assert_eq!(just_over.len(), 65);
    let (status, body) = send_json(small_body_router(), "POST", "/items", &just_over).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("request body exceeds 64 bytes"));

    // Far past the limit, the framework cuts the read; same envelope.
    let far_over = format!(r#"{{"cText":"{}"}}"#, "x".repeat(2000));
    let (status, body) = send_json(small_body_router(), "POST", "/items", &far_over).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("request body exceeds 64 bytes"));
}

// ── Import ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn import_loads_a_batch() {
    let (status, body) = send_json(
        router(),
        "POST",
        "/items/import",
        r#"[{"cText":"a"},{"cText":"b"}]"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        serde_json::json!({ "status": "succeeded", "data": 2 })
    );
}

#[tokio::test]
async fn import_batches_are_bounded() {
    let router = resource()
        .options(TabulaConfig {
            max_import_records: 2,
            ..TabulaConfig::default()
        })
        .router("items");

    let batch = r#"[{"cText":"a"},{"cText":"b"},{"cText":"c"}]"#;
    let (status, body) = send_json(router.clone(), "POST", "/items/import", batch).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("import accepts at most 2 records, got 3"));

    let (status, body) = send_json(router, "POST", "/items/import", "[]").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, failed("import requires at least one record"));
}

// ── Exports ─────────────────────────────────────────────────────────────

struct Tsv;

impl Exporter for Tsv {
    fn content_type(&self) -> &'static str {
        "text/tab-separated-values"
    }

    fn write(
        &self,
        fields: &[&tabula_data::descriptor::FieldDescriptor],
        rows: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<Vec<u8>, Error> {
        let mut lines = vec![fields
            .iter()
            .map(|f| f.wire().to_string())
            .collect::<Vec<_>>()
            .join("\t")];
        for row in rows {
            let cells: Vec<String> = fields
                .iter()
                .map(|f| match row.get(f.wire()) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => String::new(),
                })
                .collect();
            lines.push(cells.join("\t"));
        }
        Ok(lines.join("\n").into_bytes())
    }
}

#[tokio::test]
async fn exports_delegate_to_the_registered_exporter() {
    let router = resource().csv_exporter(Tsv).router("items");
    let resp = send_request(router, "GET", "/items?xformat=csv", &[], Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-type"],
        "text/tab-separated-values"
    );
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"id\tcText\n7\tfirst\n9\tsecond");
}

#[tokio::test]
async fn missing_exporters_surface_as_internal() {
    let (status, body) = send(router(), "GET", "/items?xformat=excel").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, failed("An internal error occurred"));
}

// ── Read-only router ────────────────────────────────────────────────────

#[tokio::test]
async fn read_only_router_has_no_write_routes() {
    let router = resource().read_only_router("items");

    let (status, _) = send(router.clone(), "GET", "/items").await;
    assert_eq!(status, StatusCode::OK);

    let resp = send_request(
        router,
        "POST",
        "/items",
        &[("content-type", "application/json")],
        Body::from(r#"{"cText":"boots"}"#),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
}
