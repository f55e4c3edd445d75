//! Tabular export seam for list responses.
//!
//! A list request with `xformat=csv` or `xformat=excel` is answered by an
//! [`Exporter`] instead of the JSON envelope. The router ships without any
//! exporter; register one per format on the [`Resource`](crate::Resource)
//! builder. Implementations receive the projected field descriptors plus
//! the rows as wire-keyed JSON objects and return the finished document.

use tabula_core::Error;
use tabula_data::descriptor::FieldDescriptor;

/// Renders a page of rows into a downloadable document.
pub trait Exporter: Send + Sync {
    /// Value for the `Content-Type` response header.
    fn content_type(&self) -> &'static str;

    /// Render `rows` in projection order given by `fields`.
    ///
    /// Row objects are keyed by wire name; a field missing from a row
    /// should render the same as an explicit JSON null.
    fn write(
        &self,
        fields: &[&FieldDescriptor],
        rows: &[serde_json::Map<String, serde_json::Value>],
    ) -> Result<Vec<u8>, Error>;
}
