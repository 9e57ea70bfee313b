//! Page requests and the data sources that answer them.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// Parameters of a single page fetch.
///
/// `query` is opaque to the loader: it is forwarded untouched so the host
/// can carry filters, search text, or anything else its backend expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: usize,
    /// Rows per page.
    pub batch_size: usize,
    /// Sort field, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Sort direction, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by_asc: Option<bool>,
    /// Host-defined query payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<Value>,
}

impl PageRequest {
    /// Index of the first row this page covers.
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.batch_size)
    }
}

/// A failed page fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The backend reported an error.
    #[error("data source failed: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// A plain description of what went wrong.
    #[error("{0}")]
    Message(String),
}

impl FetchError {
    /// Wrap any backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }

    /// Build an error from a description.
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }
}

/// What a data source resolves to.
///
/// `Ok(None)` means "nothing to merge": the loader releases its in-flight
/// flag and leaves rows untouched. `Ok(Some(rows))` with fewer than
/// `batch_size` rows marks the end of the data.
pub type FetchResult<T> = Result<Option<Vec<T>>, FetchError>;

/// Supplies pages of records to a [`Loader`](crate::loader::Loader).
///
/// The last currently-loaded record is passed along so cursor-paginated
/// backends can continue from it. Any `Fn(PageRequest, Option<T>) -> impl
/// Future<Output = FetchResult<T>>` closure is a data source.
pub trait DataSource<T>: Send + Sync + 'static {
    /// Start fetching one page.
    fn load(&self, request: PageRequest, last_item: Option<T>) -> BoxFuture<'static, FetchResult<T>>;
}

impl<T, F, Fut> DataSource<T> for F
where
    F: Fn(PageRequest, Option<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchResult<T>> + Send + 'static,
{
    fn load(&self, request: PageRequest, last_item: Option<T>) -> BoxFuture<'static, FetchResult<T>> {
        Box::pin(self(request, last_item))
    }
}

type Filter<T> = Arc<dyn Fn(&T, Option<&Value>) -> bool + Send + Sync>;

/// An in-memory data source that slices a shared vector into pages.
///
/// Handy for fixtures, demos and small reference tables. An optional filter
/// receives each record together with the request's `query`.
pub struct MemorySource<T> {
    rows: Arc<Vec<T>>,
    filter: Option<Filter<T>>,
}

impl<T: Clone + Send + Sync + 'static> MemorySource<T> {
    /// Create a source over owned rows.
    pub fn new(rows: Vec<T>) -> Self {
        Self::from_arc(Arc::new(rows))
    }

    /// Create a source over rows shared with someone else.
    pub fn from_arc(rows: Arc<Vec<T>>) -> Self {
        Self { rows, filter: None }
    }

    /// Only serve rows for which `filter(row, query)` is true.
    pub fn with_filter(
        mut self,
        filter: impl Fn(&T, Option<&Value>) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    /// The page a request would return, computed synchronously.
    pub fn page(&self, request: &PageRequest) -> Vec<T> {
        let query = request.query.as_ref();
        let matching = self
            .rows
            .iter()
            .filter(|row| self.filter.as_ref().is_none_or(|f| f(row, query)));
        matching
            .skip(request.offset())
            .take(request.batch_size)
            .cloned()
            .collect()
    }
}

impl<T: Clone + Send + Sync + 'static> DataSource<T> for MemorySource<T> {
    fn load(&self, request: PageRequest, _last_item: Option<T>) -> BoxFuture<'static, FetchResult<T>> {
        let page = self.page(&request);
        Box::pin(async move { Ok(Some(page)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(page: usize, batch_size: usize) -> PageRequest {
        PageRequest {
            page,
            batch_size,
            order_by: None,
            order_by_asc: None,
            query: None,
        }
    }

    #[test]
    fn offset_is_page_times_batch() {
        assert_eq!(request(0, 50).offset(), 0);
        assert_eq!(request(3, 20).offset(), 60);
    }

    #[test]
    fn request_serializes_without_empty_fields() {
        let json = serde_json::to_value(request(2, 10)).unwrap();
        assert_eq!(json, serde_json::json!({ "page": 2, "batch_size": 10 }));

        let mut req = request(0, 5);
        req.order_by = Some("name".into());
        req.order_by_asc = Some(false);
        req.query = Some(serde_json::json!({ "city": "Paris" }));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["order_by"], "name");
        assert_eq!(json["order_by_asc"], false);
        assert_eq!(json["query"]["city"], "Paris");
    }

    #[test]
    fn fetch_error_display() {
        let err = FetchError::message("timeout");
        assert_eq!(err.to_string(), "timeout");
        let err = FetchError::backend(std::io::Error::other("refused"));
        assert_eq!(err.to_string(), "data source failed: refused");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn memory_source_slices_pages() {
        let source = MemorySource::new((0..7).collect::<Vec<u32>>());
        assert_eq!(source.page(&request(0, 3)), vec![0, 1, 2]);
        assert_eq!(source.page(&request(2, 3)), vec![6]);
        assert!(source.page(&request(5, 3)).is_empty());
    }

    #[test]
    fn memory_source_applies_filter_with_query() {
        let source = MemorySource::new((0..10).collect::<Vec<u32>>()).with_filter(|n, query| {
            let min = query.and_then(|q| q["min"].as_u64()).unwrap_or(0);
            u64::from(*n) >= min
        });
        let mut req = request(0, 3);
        req.query = Some(serde_json::json!({ "min": 6 }));
        assert_eq!(source.page(&req), vec![6, 7, 8]);
        req.page = 1;
        assert_eq!(source.page(&req), vec![9]);
    }

    #[tokio::test]
    async fn closures_are_data_sources() {
        let source = |req: PageRequest, last: Option<u32>| async move {
            let start = last.map_or(0, |n| n + 1);
            Ok::<_, FetchError>(Some((start..start + req.batch_size as u32).collect::<Vec<_>>()))
        };
        let page = source.load(request(0, 2), Some(4)).await.unwrap();
        assert_eq!(page, Some(vec![5, 6]));
    }
}
