//! # Generic Document Client
//!
//! Typed create/upsert/read/query over one container. `TN` is the shape
//! written, `TR` the shape read back. Every returned document goes through
//! the explicit decode step; multi-result reads keep per-item decode results
//! so one bad document never hides the rest.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::iter::{try_reduce, AsyncIter, AsyncIterExt, BoxAsyncIter};
use crate::model::{decode, encode, Decoded, Schema, SearchKey};
use crate::observability::{Event, StoreMetrics};
use crate::store::{
    Container, FeedOptions, Query, QueryPages, RequestOptions, StoreError, StoreResult,
};

/// Pages of per-item decode results
pub type DecodedPages<TR> = BoxAsyncIter<'static, StoreResult<Vec<Decoded<TR>>>>;

pub struct DocumentClient<TN, TR> {
    container: Arc<dyn Container>,
    metrics: Arc<StoreMetrics>,
    _shapes: PhantomData<fn() -> (TN, TR)>,
}

impl<TN, TR> Clone for DocumentClient<TN, TR> {
    fn clone(&self) -> Self {
        Self {
            container: Arc::clone(&self.container),
            metrics: Arc::clone(&self.metrics),
            _shapes: PhantomData,
        }
    }
}

impl<TN, TR> fmt::Debug for DocumentClient<TN, TR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentClient")
            .field("container", &self.container)
            .finish()
    }
}

impl<TN: Schema, TR: Schema> DocumentClient<TN, TR> {
    /// Client with its own metrics registry
    pub fn new(container: Arc<dyn Container>) -> Self {
        Self::with_metrics(container, Arc::new(StoreMetrics::new()))
    }

    pub fn with_metrics(container: Arc<dyn Container>, metrics: Arc<StoreMetrics>) -> Self {
        Self {
            container,
            metrics,
            _shapes: PhantomData,
        }
    }

    pub fn container(&self) -> &Arc<dyn Container> {
        &self.container
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }

    /// Inserts `doc`. The id must already be in the document; the store is
    /// never asked to generate one. An existing id fails with 409.
    pub async fn create(&self, doc: &TN, options: &RequestOptions) -> StoreResult<TR> {
        let body = self.encode(doc)?;
        debug!(event = %Event::DocumentCreate, id = body_id(&body));
        self.metrics.increment_creates();

        let options = without_id_generation(options);
        let response = self
            .container
            .create_item(body, &options)
            .await
            .map_err(|e| self.fail(e.into()))?;
        self.decode_resource(response.resource)
    }

    /// Inserts `doc` or replaces the document with the same id
    pub async fn upsert(&self, doc: &TN, options: &RequestOptions) -> StoreResult<TR> {
        let body = self.encode(doc)?;
        debug!(event = %Event::DocumentUpsert, id = body_id(&body));
        self.metrics.increment_upserts();

        let options = without_id_generation(options);
        let response = self
            .container
            .upsert_item(body, &options)
            .await
            .map_err(|e| self.fail(e.into()))?;
        self.decode_resource(response.resource)
    }

    /// Point read. `None` when the store has no such document.
    pub async fn find(&self, key: &SearchKey) -> StoreResult<Option<TR>> {
        debug!(
            event = %Event::DocumentRead,
            id = key.id().as_str(),
            partition_key = key.partition_key()
        );
        self.metrics.increment_reads();

        // A transport may report a miss either as a 404 error or as no resource
        let resource = match self.container.read_item(key.id(), key.partition_key()).await {
            Ok(response) => response.resource,
            Err(err) if err.is_not_found() => None,
            Err(err) => return Err(self.fail(err.into())),
        };
        match resource {
            Some(resource) => self.decode_resource(Some(resource)).map(Some),
            None => {
                debug!(event = %Event::DocumentNotFound, id = key.id().as_str());
                self.metrics.increment_read_misses();
                Ok(None)
            }
        }
    }

    /// Lazy sequence of result pages; nothing is fetched until the first pull
    pub fn query_iter(&self, query: Query, options: FeedOptions) -> DecodedPages<TR> {
        let metrics = Arc::clone(&self.metrics);
        QueryPages::new(Arc::clone(&self.container), query, options)
            .map(move |page| match page {
                Ok(items) => {
                    metrics.increment_query_pages();
                    let decoded: Vec<Decoded<TR>> = items.into_iter().map(decode).collect();
                    let invalid = decoded.iter().filter(|d| !d.is_valid()).count();
                    debug!(event = %Event::QueryPage, items = decoded.len(), invalid);
                    if invalid > 0 {
                        metrics.add_decoding_errors(invalid as u64);
                    }
                    Ok(decoded)
                }
                Err(err) => {
                    let err = StoreError::from(err);
                    metrics.record_error(&err);
                    debug!(event = %Event::ErrorResponse, error = %err);
                    Err(err)
                }
            })
            .boxed()
    }

    /// Every document in the container, page by page
    pub fn collection_iter(&self, options: FeedOptions) -> DecodedPages<TR> {
        self.query_iter(Query::new(), options)
    }

    /// Reads the whole container into memory. Only for collections known to be small.
    pub async fn get_collection(&self, options: FeedOptions) -> StoreResult<Vec<Decoded<TR>>> {
        try_reduce(self.collection_iter(options), Vec::new(), |mut acc, page| {
            acc.extend(page);
            acc
        })
        .await
    }

    /// First item of the first non-empty page.
    ///
    /// An invalid first item is a `DecodingError`; later items are never consulted.
    pub async fn find_one_by_query(
        &self,
        query: Query,
        options: FeedOptions,
    ) -> StoreResult<Option<TR>> {
        let mut pages = self.query_iter(query, options);
        while let Some(page) = pages.next().await {
            if let Some(first) = page?.into_iter().next() {
                return first.into_result().map(Some).map_err(StoreError::from);
            }
        }
        Ok(None)
    }

    fn encode(&self, doc: &TN) -> StoreResult<Value> {
        encode(doc).map_err(|e| self.fail(e.into()))
    }

    fn decode_resource(&self, resource: Option<Value>) -> StoreResult<TR> {
        let resource = resource.ok_or_else(|| self.fail(StoreError::EmptyResponse))?;
        decode::<TR>(resource)
            .into_result()
            .map_err(|e| self.fail(e.into()))
    }

    /// Counts and logs an error on its way out
    fn fail(&self, err: StoreError) -> StoreError {
        self.metrics.record_error(&err);
        debug!(event = %Event::ErrorResponse, kind = err.kind().as_str(), error = %err);
        err
    }
}

fn without_id_generation(options: &RequestOptions) -> RequestOptions {
    RequestOptions {
        disable_automatic_id_generation: true,
        ..options.clone()
    }
}

fn body_id(body: &Value) -> &str {
    body.get("id").and_then(Value::as_str).unwrap_or_default()
}
