//! TTL Propagation Tests
//!
//! Tests for `update_ttl_for_all_versions` over long chains:
//! - Chunks of at most 100 operations, one atomic batch each
//! - A failed chunk fails the whole operation
//! - Chunks committed before the failure stay committed

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use docmodel::client::{derive_id, VersionedKeys, VersionedTtlClient};
use docmodel::model::{NonEmptyString, Schema, SearchKey, Ttl};
use docmodel::store::{
    status, BatchOperation, Container, FeedOptions, FeedPage, ItemResponse, MemoryContainer,
    OperationResponse, Query, RequestOptions, ResponseError, StoreErrorKind, MAX_BATCH_OPERATIONS,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Service {
    service_id: String,
    name: String,
}

impl Schema for Service {}

const SERVICE_ID: &str = "svc-01";

/// How the wrapped container answers one batch call
#[derive(Debug, Clone, Copy)]
enum Sabotage {
    /// Store rejects the batch: nothing applied, first op 400, the rest 424
    Reject,
    /// Store answers success for fewer operations than were sent
    ShortResponse,
}

/// Delegates to a memory container, sabotaging the n-th batch call
#[derive(Debug)]
struct FlakyBatches {
    inner: MemoryContainer,
    fail_on_call: usize,
    sabotage: Sabotage,
    calls: AtomicUsize,
}

impl FlakyBatches {
    fn new(fail_on_call: usize, sabotage: Sabotage) -> Self {
        Self {
            inner: MemoryContainer::new("services", "/serviceId"),
            fail_on_call,
            sabotage,
            calls: AtomicUsize::new(0),
        }
    }
}

impl Container for FlakyBatches {
    fn create_item(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        self.inner.create_item(body, options)
    }

    fn upsert_item(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        self.inner.upsert_item(body, options)
    }

    fn read_item(
        &self,
        id: &str,
        partition_key: &str,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        self.inner.read_item(id, partition_key)
    }

    fn query_page(
        &self,
        query: &Query,
        options: &FeedOptions,
    ) -> BoxFuture<'_, Result<FeedPage, ResponseError>> {
        self.inner.query_page(query, options)
    }

    fn batch(
        &self,
        partition_key: &str,
        operations: &[BatchOperation],
    ) -> BoxFuture<'_, Result<Vec<OperationResponse>, ResponseError>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call != self.fail_on_call {
            return self.inner.batch(partition_key, operations);
        }
        let count = operations.len();
        let sabotage = self.sabotage;
        Box::pin(async move {
            Ok(match sabotage {
                Sabotage::Reject => (0..count)
                    .map(|i| OperationResponse {
                        status_code: if i == 0 {
                            status::BAD_REQUEST
                        } else {
                            status::FAILED_DEPENDENCY
                        },
                        resource: None,
                    })
                    .collect(),
                Sabotage::ShortResponse => (0..count - 1)
                    .map(|_| OperationResponse {
                        status_code: status::OK,
                        resource: None,
                    })
                    .collect(),
            })
        })
    }
}

fn key() -> SearchKey {
    SearchKey::parse(SERVICE_ID, None).unwrap()
}

async fn seed_chain(client: &VersionedTtlClient<Service>, versions: usize) {
    for i in 0..versions {
        let stored = client
            .upsert(Service {
                service_id: SERVICE_ID.into(),
                name: format!("revision {}", i),
            })
            .await
            .unwrap();
        assert_eq!(stored.version(), i as u64);
    }
}

async fn ttl_of(container: &MemoryContainer, version: u64) -> Option<Value> {
    let model_id = NonEmptyString::new(SERVICE_ID).unwrap();
    container
        .item(derive_id(&model_id, version).as_str(), SERVICE_ID)
        .await
        .and_then(|doc| doc.get("ttl").cloned())
}

fn keys() -> VersionedKeys {
    VersionedKeys::partitioned_by_model_id("serviceId")
}

/// 150 versions are patched in two chunks.
#[tokio::test]
async fn test_ttl_update_over_two_chunks() {
    let container = Arc::new(FlakyBatches::new(usize::MAX, Sabotage::Reject));
    let client = VersionedTtlClient::new(container.clone(), keys());
    seed_chain(&client, 150).await;

    let ttl = Ttl::seconds(86_400).unwrap();
    let patched = client.update_ttl_for_all_versions(&key(), ttl).await.unwrap();

    assert_eq!(patched, 150);
    assert_eq!(container.calls.load(Ordering::SeqCst), 2);
    assert_eq!(MAX_BATCH_OPERATIONS, 100);
    for version in [0, 99, 100, 149] {
        assert_eq!(ttl_of(&container.inner, version).await, Some(Value::from(86_400)));
    }

    let snapshot = client.versioned().documents().metrics().snapshot();
    assert_eq!(snapshot.batches, 2);
    assert_eq!(snapshot.patched_items, 150);
}

/// A rejected second chunk fails the call; the first chunk stays applied.
#[tokio::test]
async fn test_second_chunk_failure_is_reported() {
    let container = Arc::new(FlakyBatches::new(2, Sabotage::Reject));
    let client = VersionedTtlClient::new(container.clone(), keys());
    seed_chain(&client, 150).await;

    let err = client
        .update_ttl_for_all_versions(&key(), Ttl::Never)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), StoreErrorKind::ErrorResponse);
    assert_eq!(err.status_code(), Some(status::BAD_REQUEST));

    // No rollback across chunks
    assert_eq!(ttl_of(&container.inner, 0).await, Some(Value::from(-1)));
    assert_eq!(ttl_of(&container.inner, 99).await, Some(Value::from(-1)));
    assert_eq!(ttl_of(&container.inner, 100).await, None);
    assert_eq!(ttl_of(&container.inner, 149).await, None);
}

/// Fewer successes than valid documents is an error, never a partial count.
#[tokio::test]
async fn test_count_mismatch_is_reported() {
    let container = Arc::new(FlakyBatches::new(1, Sabotage::ShortResponse));
    let client = VersionedTtlClient::new(container, keys());
    seed_chain(&client, 5).await;

    let err = client
        .update_ttl_for_all_versions(&key(), Ttl::Never)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), StoreErrorKind::ErrorResponse);
    assert!(err.to_string().contains("4 of 5"));
}
