//! The resource builder and its routers.

use std::marker::PhantomData;
use std::sync::Arc;

use tabula_core::http::{delete, get, post, DefaultBodyLimit, Router};
use tabula_core::{Error, TabulaConfig};
use tabula_data::descriptor::Record;
use tabula_data::params::OutputFormat;
use tabula_data::store::{ArchiveStore, BulkStore, MutateStore, SelectStore};

use crate::export::Exporter;
use crate::handlers;

/// One REST collection bound to a store.
///
/// `T` is the record served on reads, `I` the record accepted on writes
/// (defaulting to `T` when the two shapes coincide). The builder is
/// consumed by [`router`](Resource::router) or
/// [`read_only_router`](Resource::read_only_router), which fix the store
/// contracts the endpoints require.
pub struct Resource<T, S, I = T> {
    pub(crate) store: S,
    pub(crate) options: TabulaConfig,
    pub(crate) set_args: Vec<String>,
    csv: Option<Arc<dyn Exporter>>,
    excel: Option<Arc<dyn Exporter>>,
    record: PhantomData<fn() -> (T, I)>,
}

// Derived Clone would demand T: Clone and I: Clone, which the phantom
// does not need.
impl<T, S: Clone, I> Clone for Resource<T, S, I> {
    fn clone(&self) -> Self {
        Resource {
            store: self.store.clone(),
            options: self.options.clone(),
            set_args: self.set_args.clone(),
            csv: self.csv.clone(),
            excel: self.excel.clone(),
            record: PhantomData,
        }
    }
}

impl<T, S, I> Resource<T, S, I> {
    pub fn new(store: S) -> Self {
        Resource {
            store,
            options: TabulaConfig::default(),
            set_args: Vec::new(),
            csv: None,
            excel: None,
            record: PhantomData,
        }
    }

    pub fn options(mut self, options: TabulaConfig) -> Self {
        self.options = options;
        self
    }

    /// Positional query parameters of a function-backed source, in
    /// declaration order. Must match the names given to the store.
    pub fn set_args(mut self, names: &[&str]) -> Self {
        self.set_args = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn csv_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.csv = Some(Arc::new(exporter));
        self
    }

    pub fn excel_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.excel = Some(Arc::new(exporter));
        self
    }

    pub(crate) fn exporter(&self, format: OutputFormat) -> Result<&Arc<dyn Exporter>, Error> {
        let slot = match format {
            OutputFormat::Csv => self.csv.as_ref(),
            OutputFormat::Excel => self.excel.as_ref(),
            OutputFormat::Json => None,
        };
        slot.ok_or_else(|| {
            Error::config(format!(
                "no exporter registered for format {}",
                format.as_str()
            ))
        })
    }
}

impl<T, S, I> Resource<T, S, I>
where
    T: Record,
    I: Record,
{
    /// Full CRUD router for one collection.
    ///
    /// The body limit is set one byte past `max_body_size` so that the
    /// size rule answers with the envelope instead of the framework's
    /// plain 413.
    pub fn router(self, collection: &str) -> Router
    where
        S: SelectStore<T> + MutateStore<T, I> + ArchiveStore + BulkStore<I> + Clone + 'static,
    {
        let body_limit = DefaultBodyLimit::max(self.options.max_body_size + 1);
        Router::new()
            .route(
                &format!("/{collection}"),
                get(handlers::list::<T, S, I>).post(handlers::create::<T, S, I>),
            )
            .route(
                &format!("/{collection}/import"),
                post(handlers::import::<T, S, I>),
            )
            .route(
                &format!("/{collection}/{{id}}"),
                get(handlers::fetch::<T, S, I>)
                    .put(handlers::replace::<T, S, I>)
                    .patch(handlers::patch::<T, S, I>)
                    .delete(handlers::remove::<T, S, I>),
            )
            .route(
                &format!("/{collection}-uuid/{{id}}"),
                get(handlers::fetch_by_uuid::<T, S, I>),
            )
            .route(
                &format!("/{collection}/{{id}}/archive"),
                delete(handlers::archive::<T, S, I>),
            )
            .route(
                &format!("/{collection}/{{id}}/restore"),
                post(handlers::restore::<T, S, I>),
            )
            .layer(body_limit)
            .with_state(self)
    }

    /// List and fetch endpoints only, for read-only sources such as views
    /// and set-returning functions.
    pub fn read_only_router(self, collection: &str) -> Router
    where
        S: SelectStore<T> + Clone + 'static,
    {
        Router::new()
            .route(&format!("/{collection}"), get(handlers::list::<T, S, I>))
            .route(
                &format!("/{collection}/{{id}}"),
                get(handlers::fetch::<T, S, I>),
            )
            .route(
                &format!("/{collection}-uuid/{{id}}"),
                get(handlers::fetch_by_uuid::<T, S, I>),
            )
            .with_state(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exporter_lookup_reports_the_missing_format() {
        let resource: Resource<(), ()> = Resource::new(());
        let err = resource.exporter(OutputFormat::Csv).unwrap_err();
        assert_eq!(
            err.to_string(),
            "config error: no exporter registered for format csv"
        );
    }
}
