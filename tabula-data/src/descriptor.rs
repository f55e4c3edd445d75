//! Record descriptors.
//!
//! A [`RecordDescriptor`] is the single authority on a record type's
//! fields: the column name in the database (storage name), the field name
//! on the wire (wire name), and the logical type used for value coercion.
//! The URL parser validates field references against it and the SQL builder
//! consults it for column names and coercions.
//!
//! Descriptors are immutable and built once per type, typically in a
//! `LazyLock` behind [`Record::descriptor`]:
//!
//! ```ignore
//! static ITEM: LazyLock<RecordDescriptor> = LazyLock::new(|| {
//!     RecordDescriptor::builder()
//!         .field("id", "id", LogicalType::Int)
//!         .field("c_text", "c_text", LogicalType::Text)
//!         .default_order(&["id"])
//!         .build()
//!         .expect("item descriptor")
//! });
//! ```

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tabula_core::Error;

use crate::value::{LogicalType, SqlValue};

/// Wire name marking a field that is never exposed in payloads. Hidden
/// fields exist so a default sort can reference a column the record type
/// does not serve.
pub const HIDDEN: &str = "-";

/// One field of a record: storage name, wire name, logical type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    storage: String,
    wire: String,
    logical: LogicalType,
}

impl FieldDescriptor {
    pub fn storage(&self) -> &str {
        &self.storage
    }

    pub fn wire(&self) -> &str {
        &self.wire
    }

    pub fn logical(&self) -> LogicalType {
        self.logical
    }

    pub fn is_hidden(&self) -> bool {
        self.wire == HIDDEN
    }
}

/// Immutable per-type field metadata.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    fields: Vec<FieldDescriptor>,
    by_wire: HashMap<String, usize>,
    by_storage: HashMap<String, usize>,
    default_order: Vec<String>,
}

impl RecordDescriptor {
    pub fn builder() -> DescriptorBuilder {
        DescriptorBuilder {
            fields: Vec::new(),
            default_order: Vec::new(),
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look a field up by its wire name. Hidden fields are not reachable.
    pub fn wire_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_wire.get(name).map(|&idx| &self.fields[idx])
    }

    /// Look a field up by its column name.
    pub fn storage_field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.by_storage.get(name).map(|&idx| &self.fields[idx])
    }

    /// Sort entries (`"col"` / `"col DESC"`) applied when a request
    /// carries no sort parameter.
    pub fn default_order(&self) -> &[String] {
        &self.default_order
    }

    /// Resolve the projected fields for a request.
    ///
    /// `None` selects every wire-visible field in declaration order; a
    /// whitelist selects the named fields in request order.
    pub fn projection(&self, fields: Option<&[String]>) -> Result<Vec<&FieldDescriptor>, Error> {
        match fields {
            None => Ok(self.fields.iter().filter(|f| !f.is_hidden()).collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.wire_field(name)
                        .ok_or_else(|| Error::user(format!("invalid field: {name}")))
                })
                .collect(),
        }
    }

    /// Column names eligible for insert, in declaration order.
    pub fn insert_columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.is_hidden())
            .map(|f| f.storage())
            .collect()
    }

    /// Reflect a record into `(field, value)` pairs for insert/update.
    ///
    /// Fields absent from the record's serialised form are skipped, so the
    /// database default applies on insert.
    pub fn extract<R: Serialize>(
        &self,
        record: &R,
    ) -> Result<Vec<(&FieldDescriptor, SqlValue)>, Error> {
        let map = to_object(record)?;
        let mut out = Vec::with_capacity(self.fields.len());
        for field in self.fields.iter().filter(|f| !f.is_hidden()) {
            let Some(value) = map.get(&field.wire) else {
                continue;
            };
            out.push((field, coerce_field(field, value)?));
        }
        Ok(out)
    }

    /// Reflect a record into one value per insertable column, aligned with
    /// [`insert_columns`](Self::insert_columns). Absent fields become nulls;
    /// bulk loads list every column, so there is no "skip" position.
    pub fn extract_all<R: Serialize>(&self, record: &R) -> Result<Vec<SqlValue>, Error> {
        let map = to_object(record)?;
        self.fields
            .iter()
            .filter(|f| !f.is_hidden())
            .map(|field| match map.get(&field.wire) {
                Some(value) => coerce_field(field, value),
                None => Ok(SqlValue::Null(field.logical)),
            })
            .collect()
    }
}

fn to_object<R: Serialize>(record: &R) -> Result<serde_json::Map<String, serde_json::Value>, Error> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(Error::config(format!(
            "record serialises to {other:?}, expected an object"
        ))),
    }
}

fn coerce_field(field: &FieldDescriptor, value: &serde_json::Value) -> Result<SqlValue, Error> {
    field
        .logical
        .from_json(value)
        .map_err(|e| Error::user(format!("invalid value for field {}: {e}", field.wire)))
}

/// Builder for [`RecordDescriptor`]. Construction fails on duplicate
/// names, an empty field list, or a default order referencing an unknown
/// column.
pub struct DescriptorBuilder {
    fields: Vec<FieldDescriptor>,
    default_order: Vec<String>,
}

impl DescriptorBuilder {
    pub fn field(mut self, storage: &str, wire: &str, logical: LogicalType) -> Self {
        self.fields.push(FieldDescriptor {
            storage: storage.to_string(),
            wire: wire.to_string(),
            logical,
        });
        self
    }

    /// A column with no wire presence; see [`HIDDEN`].
    pub fn hidden(self, storage: &str, logical: LogicalType) -> Self {
        self.field(storage, HIDDEN, logical)
    }

    /// Default sort entries, each `"col"` or `"col DESC"` with `col` a
    /// storage name.
    pub fn default_order(mut self, entries: &[&str]) -> Self {
        self.default_order = entries.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn build(self) -> Result<RecordDescriptor, Error> {
        if self.fields.is_empty() {
            return Err(Error::config("descriptor declares no fields"));
        }
        let mut by_wire = HashMap::new();
        let mut by_storage = HashMap::new();
        for (idx, field) in self.fields.iter().enumerate() {
            if field.storage.is_empty() {
                return Err(Error::config("descriptor field has an empty storage name"));
            }
            if field.wire.is_empty() {
                return Err(Error::config(format!(
                    "descriptor field {} has an empty wire name",
                    field.storage
                )));
            }
            if by_storage.insert(field.storage.clone(), idx).is_some() {
                return Err(Error::config(format!(
                    "descriptor declares storage name {} twice",
                    field.storage
                )));
            }
            if !field.is_hidden() && by_wire.insert(field.wire.clone(), idx).is_some() {
                return Err(Error::config(format!(
                    "descriptor declares wire name {} twice",
                    field.wire
                )));
            }
        }
        for entry in &self.default_order {
            let column = entry.strip_suffix(" DESC").unwrap_or(entry);
            if !by_storage.contains_key(column) {
                return Err(Error::config(format!(
                    "default order references unknown column {column}"
                )));
            }
        }
        Ok(RecordDescriptor {
            fields: self.fields,
            by_wire,
            by_storage,
            default_order: self.default_order,
        })
    }
}

/// A type that maps to rows of a relation.
///
/// Deserialisation must tolerate missing fields (`#[serde(default)]`),
/// since a request may restrict the projection to any subset of fields.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    fn descriptor() -> &'static RecordDescriptor;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn item_descriptor() -> RecordDescriptor {
        RecordDescriptor::builder()
            .field("id", "id", LogicalType::Int)
            .field("c_text", "c_text", LogicalType::Text)
            .field("c_bool", "c_bool", LogicalType::Bool)
            .hidden("rank", LogicalType::Float)
            .default_order(&["rank DESC", "id"])
            .build()
            .unwrap()
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Item {
        id: i64,
        c_text: Option<String>,
        c_bool: bool,
    }

    #[test]
    fn duplicate_names_are_refused() {
        let err = RecordDescriptor::builder()
            .field("a", "a", LogicalType::Int)
            .field("a", "b", LogicalType::Int)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");

        let err = RecordDescriptor::builder()
            .field("a", "x", LogicalType::Int)
            .field("b", "x", LogicalType::Int)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[test]
    fn hidden_fields_may_share_the_sentinel() {
        let descriptor = RecordDescriptor::builder()
            .field("a", "a", LogicalType::Int)
            .hidden("h1", LogicalType::Int)
            .hidden("h2", LogicalType::Int)
            .build()
            .unwrap();
        assert!(descriptor.wire_field("-").is_none());
        assert!(descriptor.storage_field("h2").is_some());
    }

    #[test]
    fn default_order_must_reference_known_columns() {
        let err = RecordDescriptor::builder()
            .field("a", "a", LogicalType::Int)
            .default_order(&["missing"])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)), "got {err:?}");
    }

    #[test]
    fn projection_follows_request_order() {
        let descriptor = item_descriptor();
        let fields = descriptor
            .projection(Some(&["c_text".to_string(), "id".to_string()]))
            .unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.storage()).collect();
        assert_eq!(names, vec!["c_text", "id"]);
    }

    #[test]
    fn projection_excludes_hidden_fields_by_default() {
        let descriptor = item_descriptor();
        let fields = descriptor.projection(None).unwrap();
        let names: Vec<_> = fields.iter().map(|f| f.storage()).collect();
        assert_eq!(names, vec!["id", "c_text", "c_bool"]);
    }

    #[test]
    fn unknown_projection_field_is_a_user_error() {
        let descriptor = item_descriptor();
        let err = descriptor
            .projection(Some(&["nope".to_string()]))
            .unwrap_err();
        assert_eq!(err.description(), "invalid field: nope");
    }

    #[test]
    fn extract_skips_absent_fields_and_keeps_nulls() {
        let descriptor = item_descriptor();
        let item = Item {
            id: 7,
            c_text: None,
            c_bool: true,
        };
        let pairs = descriptor.extract(&item).unwrap();
        let view: Vec<_> = pairs
            .iter()
            .map(|(f, v)| (f.storage(), v.clone()))
            .collect();
        assert_eq!(
            view,
            vec![
                ("id", SqlValue::Int(7)),
                ("c_text", SqlValue::Null(LogicalType::Text)),
                ("c_bool", SqlValue::Bool(true)),
            ]
        );
    }

    #[test]
    fn extract_all_aligns_to_insert_columns() {
        let descriptor = item_descriptor();
        assert_eq!(descriptor.insert_columns(), vec!["id", "c_text", "c_bool"]);
        let values = descriptor
            .extract_all(&serde_json::json!({ "id": 1, "c_bool": false }))
            .unwrap();
        assert_eq!(
            values,
            vec![
                SqlValue::Int(1),
                SqlValue::Null(LogicalType::Text),
                SqlValue::Bool(false),
            ]
        );
    }
}
