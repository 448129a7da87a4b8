//! # Container Trait
//!
//! The remote store boundary. A container is one partitioned collection of
//! JSON documents. Implementations talk to the real service over HTTP or keep
//! documents in process; the clients above only see this trait.
//!
//! Contract shared by every implementation:
//! - create fails with 409 when the id already exists in the partition
//! - read of a missing document answers 404 with no resource, not an error
//! - a batch is atomic: either every operation applies or none does
//! - system fields (`_etag`, `_rid`, `_self`, `_ts`) are assigned on each write

use std::fmt;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ResponseError;
use super::query::Query;
use crate::iter::AsyncIter;

/// Maximum number of operations in one atomic batch
pub const MAX_BATCH_OPERATIONS: usize = 100;

/// Per-request write options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Fail instead of generating an id when the body has none
    pub disable_automatic_id_generation: bool,
    /// Only write when the stored document still carries this etag
    pub if_match: Option<String>,
}

/// Per-query options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedOptions {
    /// Page size requested from the store
    pub max_item_count: Option<usize>,
    /// Restricts the query to one partition; `None` fans out
    pub partition_key: Option<String>,
    /// Resume token returned by a previous page
    pub continuation: Option<String>,
}

impl FeedOptions {
    pub fn with_partition_key(mut self, partition_key: impl Into<String>) -> Self {
        self.partition_key = Some(partition_key.into());
        self
    }

    pub fn with_max_item_count(mut self, max_item_count: usize) -> Self {
        self.max_item_count = Some(max_item_count);
        self
    }
}

/// Response to a single-document call
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResponse {
    pub status_code: u16,
    pub resource: Option<Value>,
}

/// One page of raw query results
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    pub items: Vec<Value>,
    /// Present while more pages remain
    pub continuation: Option<String>,
}

/// JSON patch operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Add or overwrite an object member
    Add,
    /// Overwrite an existing member
    Replace,
    /// Delete an existing member
    Remove,
}

/// A single patch step against a document path such as `/ttl`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub op: PatchOp,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Add,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: path.into(),
            value: Some(value),
        }
    }

    pub fn remove(path: impl Into<String>) -> Self {
        Self {
            op: PatchOp::Remove,
            path: path.into(),
            value: None,
        }
    }
}

/// Patch of one document inside a batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOperation {
    pub id: String,
    pub operations: Vec<PatchOperation>,
}

impl BatchOperation {
    pub fn patch(id: impl Into<String>, operations: Vec<PatchOperation>) -> Self {
        Self {
            id: id.into(),
            operations,
        }
    }
}

/// Per-operation outcome of a batch
#[derive(Debug, Clone, PartialEq)]
pub struct OperationResponse {
    pub status_code: u16,
    pub resource: Option<Value>,
}

/// A partitioned document collection
pub trait Container: Send + Sync + fmt::Debug {
    /// Inserts a new document
    fn create_item(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>>;

    /// Inserts or replaces a document
    fn upsert_item(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>>;

    /// Point read; a missing document is `Ok` with status 404 and no resource
    fn read_item(
        &self,
        id: &str,
        partition_key: &str,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>>;

    /// Fetches one page of query results
    fn query_page(
        &self,
        query: &Query,
        options: &FeedOptions,
    ) -> BoxFuture<'_, Result<FeedPage, ResponseError>>;

    /// Applies up to `MAX_BATCH_OPERATIONS` patches atomically within one partition
    fn batch(
        &self,
        partition_key: &str,
        operations: &[BatchOperation],
    ) -> BoxFuture<'_, Result<Vec<OperationResponse>, ResponseError>>;
}

/// Query results as a sequence of pages, following continuation tokens.
///
/// Ends after the page without a continuation, or right after an error.
pub struct QueryPages {
    container: Arc<dyn Container>,
    query: Query,
    options: FeedOptions,
    finished: bool,
}

impl QueryPages {
    pub fn new(container: Arc<dyn Container>, query: Query, options: FeedOptions) -> Self {
        Self {
            container,
            query,
            options,
            finished: false,
        }
    }
}

impl AsyncIter for QueryPages {
    type Item = Result<Vec<Value>, ResponseError>;

    fn next(&mut self) -> BoxFuture<'_, Option<Self::Item>> {
        Box::pin(async move {
            if self.finished {
                return None;
            }
            match self.container.query_page(&self.query, &self.options).await {
                Ok(page) => {
                    self.finished = page.continuation.is_none();
                    self.options.continuation = page.continuation;
                    Some(Ok(page.items))
                }
                Err(err) => {
                    self.finished = true;
                    Some(Err(err))
                }
            }
        })
    }
}
