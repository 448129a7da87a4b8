//! Cursor paging over id-bearing documents
//!
//! A page carries the id of its first item (`prev`) and of its last item
//! (`next`). Callers pass those ids back as exclusive id bounds through
//! `CursorQuery` to move between pages. Results are ordered by partition
//! field then id, both descending, so the bounds are deterministic.

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::client::DocumentClient;
use crate::iter::{to_page, try_to_page, AsyncIter, AsyncIterExt, Page, Peekable};
use crate::model::{Decoded, Identified, Schema};
use crate::observability::Event;
use crate::store::{FeedOptions, FilterExpr, Query, StoreResult};

/// A page with its boundary cursors
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    /// Id of the last item
    pub next: Option<String>,
    /// Id of the first item
    pub prev: Option<String>,
    pub has_more: bool,
}

impl<T: Identified> From<Page<T>> for CursorPage<T> {
    fn from(page: Page<T>) -> Self {
        let next = page.items.last().map(|item| item.id().to_string());
        let prev = page.items.first().map(|item| item.id().to_string());
        Self {
            items: page.items,
            next,
            prev,
            has_more: page.has_more,
        }
    }
}

/// Pulls up to `page_size` items and computes the cursors
pub async fn fill_page<I>(iter: &mut Peekable<I>, page_size: usize) -> CursorPage<I::Item>
where
    I: AsyncIter,
    I::Item: Identified,
{
    to_page(iter, page_size).await.into()
}

/// `fill_page` over fallible items; stops at the first error
pub async fn try_fill_page<I, T, E>(
    iter: &mut Peekable<I>,
    page_size: usize,
) -> Result<CursorPage<T>, E>
where
    I: AsyncIter<Item = Result<T, E>>,
    T: Identified + Send,
    E: Send,
{
    Ok(try_to_page(iter, page_size).await?.into())
}

/// Response body for a page of items
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub items_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
}

impl<T> From<CursorPage<T>> for PageResponse<T> {
    fn from(page: CursorPage<T>) -> Self {
        Self {
            items_size: page.items.len(),
            items: page.items,
            next: page.next,
            prev: page.prev,
        }
    }
}

/// Keyset query over one partition value
#[derive(Debug, Clone, PartialEq)]
pub struct CursorQuery {
    partition_field: String,
    partition_value: Value,
    /// Only ids strictly greater than this
    min_id: Option<String>,
    /// Only ids strictly less than this
    max_id: Option<String>,
    /// Partition value is also the container partition key
    scoped: bool,
}

impl CursorQuery {
    pub fn new(partition_field: impl Into<String>, partition_value: impl Into<Value>) -> Self {
        Self {
            partition_field: partition_field.into(),
            partition_value: partition_value.into(),
            min_id: None,
            max_id: None,
            scoped: false,
        }
    }

    pub fn with_min_id(mut self, id: impl Into<String>) -> Self {
        self.min_id = Some(id.into());
        self
    }

    pub fn with_max_id(mut self, id: impl Into<String>) -> Self {
        self.max_id = Some(id.into());
        self
    }

    /// Sends the query to the partition holding `partition_value` only
    pub fn within_partition(mut self) -> Self {
        self.scoped = true;
        self
    }

    pub fn to_query(&self) -> Query {
        let mut query =
            Query::new().where_eq(self.partition_field.as_str(), self.partition_value.clone());
        if let Some(min) = &self.min_id {
            query = query.filter(FilterExpr::gt("id", min.as_str()));
        }
        if let Some(max) = &self.max_id {
            query = query.filter(FilterExpr::lt("id", max.as_str()));
        }
        query
            .order_by(self.partition_field.as_str(), false)
            .order_by("id", false)
    }

    pub fn feed_options(&self, page_size: usize) -> FeedOptions {
        let options = FeedOptions::default().with_max_item_count(page_size.max(1));
        match (&self.partition_value, self.scoped) {
            (Value::String(pk), true) => options.with_partition_key(pk.as_str()),
            (other, true) => options.with_partition_key(other.to_string()),
            (_, false) => options,
        }
    }
}

/// One page of valid documents matching `query`.
///
/// Documents failing validation are logged and left out of the page.
pub async fn page_documents<TN, TR>(
    client: &DocumentClient<TN, TR>,
    query: &CursorQuery,
    page_size: usize,
) -> StoreResult<CursorPage<TR>>
where
    TN: Schema,
    TR: Schema + Identified,
{
    let mut items = client
        .query_iter(query.to_query(), query.feed_options(page_size))
        .try_flatten()
        .filter_map(|item| match item {
            Ok(Decoded::Valid(doc)) => Some(Ok(doc)),
            Ok(Decoded::Invalid(errors)) => {
                warn!(event = %Event::DecodeFailed, errors = %errors, "skipping invalid document");
                None
            }
            Err(err) => Some(Err(err)),
        })
        .peekable();
    try_fill_page(&mut items, page_size).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iter::from_iter;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    struct Item(&'static str);

    impl Identified for Item {
        fn id(&self) -> &str {
            self.0
        }
    }

    #[tokio::test]
    async fn test_fill_page_cursors() {
        let mut iter = from_iter(vec![vec![Item("c"), Item("b")], vec![], vec![Item("a")]])
            .flatten()
            .peekable();
        let page = fill_page(&mut iter, 2).await;
        assert_eq!(page.prev.as_deref(), Some("c"));
        assert_eq!(page.next.as_deref(), Some("b"));
        assert!(page.has_more);

        let page = fill_page(&mut iter, 2).await;
        assert_eq!(page.items, vec![Item("a")]);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_empty_page_has_no_cursors() {
        let mut iter = from_iter(Vec::<Item>::new()).peekable();
        let page = fill_page(&mut iter, 5).await;
        assert_eq!(page.next, None);
        assert_eq!(page.prev, None);

        let mut iter = from_iter(vec![Item("a")]).peekable();
        let page = fill_page(&mut iter, 0).await;
        assert_eq!(page.next, None);
        assert!(page.has_more);
    }

    #[tokio::test]
    async fn test_try_fill_page_surfaces_errors() {
        let mut iter = from_iter(vec![Ok(Item("a")), Err("boom")]).peekable();
        assert_eq!(try_fill_page(&mut iter, 2).await, Err("boom"));
    }

    #[test]
    fn test_page_response_shape() {
        let response: PageResponse<Value> = CursorPage {
            items: vec![json!({"id": "a"})],
            next: Some("a".into()),
            prev: Some("a".into()),
            has_more: false,
        }
        .into();
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"items": [{"id": "a"}], "items_size": 1, "next": "a", "prev": "a"})
        );

        let empty: PageResponse<Value> = CursorPage {
            items: vec![],
            next: None,
            prev: None,
            has_more: false,
        }
        .into();
        assert_eq!(serde_json::to_value(&empty).unwrap(), json!({"items": [], "items_size": 0}));
    }

    #[test]
    fn test_cursor_query_sql() {
        let spec = CursorQuery::new("serviceId", "svc")
            .with_min_id("a")
            .with_max_id("z")
            .to_query()
            .to_sql_spec();
        assert_eq!(
            spec.query,
            "SELECT * FROM m WHERE m.serviceId = @p0 AND m.id > @p1 AND m.id < @p2 ORDER BY m.serviceId DESC, m.id DESC"
        );
        assert_eq!(spec.parameters.len(), 3);
    }

    #[test]
    fn test_cursor_query_feed_scope() {
        let query = CursorQuery::new("serviceId", "svc");
        assert_eq!(query.feed_options(10).partition_key, None);
        assert_eq!(
            query.within_partition().feed_options(10).partition_key.as_deref(),
            Some("svc")
        );
    }
}
