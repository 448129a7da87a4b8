//! # Versioned Client with TTL Propagation
//!
//! Adds whole-chain operations on top of `VersionedClient`: reading every
//! snapshot of a model and setting the same `ttl` on all of them.
//!
//! TTL propagation runs one atomic batch per chunk of
//! `MAX_BATCH_OPERATIONS` documents, chunks in sequence. A chunk either
//! applies fully or not at all, but chunks already committed stay committed
//! when a later one fails. Any such partial outcome is reported as an error,
//! never as a smaller success count.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info, warn};

use super::versioned::{
    string_field, VersionedClient, VersionedDocument, VersionedKeys, VERSION_FIELD,
};
use crate::iter::try_reduce;
use crate::model::{Decoded, Schema, SearchKey, Ttl, ValidationDetails};
use crate::observability::{Event, StoreMetrics};
use crate::store::{
    status, BatchOperation, Container, OperationResponse, PatchOperation, StoreError, StoreResult,
    MAX_BATCH_OPERATIONS,
};

/// Path patched on every snapshot
const TTL_PATH: &str = "/ttl";

pub struct VersionedTtlClient<T> {
    versioned: VersionedClient<T>,
}

impl<T> Clone for VersionedTtlClient<T> {
    fn clone(&self) -> Self {
        Self {
            versioned: self.versioned.clone(),
        }
    }
}

impl<T: Schema> VersionedTtlClient<T> {
    pub fn new(container: Arc<dyn Container>, keys: VersionedKeys) -> Self {
        Self {
            versioned: VersionedClient::new(container, keys),
        }
    }

    pub fn with_metrics(
        container: Arc<dyn Container>,
        keys: VersionedKeys,
        metrics: Arc<StoreMetrics>,
    ) -> Self {
        Self {
            versioned: VersionedClient::with_metrics(container, keys, metrics),
        }
    }

    pub fn versioned(&self) -> &VersionedClient<T> {
        &self.versioned
    }

    pub async fn create(&self, model: T) -> StoreResult<VersionedDocument<T>> {
        self.versioned.create(model).await
    }

    pub async fn upsert(&self, model: T) -> StoreResult<VersionedDocument<T>> {
        self.versioned.upsert(model).await
    }

    pub async fn find_last_version(
        &self,
        key: &SearchKey,
    ) -> StoreResult<Option<VersionedDocument<T>>> {
        self.versioned.find_last_version(key).await
    }

    pub async fn find_version(
        &self,
        key: &SearchKey,
        version: u64,
    ) -> StoreResult<Option<VersionedDocument<T>>> {
        self.versioned.find_version(key, version).await
    }

    /// Every snapshot of the model, oldest first, with per-item decode results.
    ///
    /// Reads the whole chain; there is no page limit.
    pub async fn find_all_versions(
        &self,
        key: &SearchKey,
    ) -> StoreResult<Vec<Decoded<VersionedDocument<T>>>> {
        let query = self.versioned.chain_query(key).order_by(VERSION_FIELD, true);
        let pages = self.versioned.documents().query_iter(query, self.versioned.feed_options(key));
        try_reduce(pages, Vec::new(), |mut acc, page| {
            acc.extend(page);
            acc
        })
        .await
    }

    /// Sets `ttl` on every valid snapshot of the model and returns how many
    /// were patched. Snapshots that fail validation are skipped.
    pub async fn update_ttl_for_all_versions(
        &self,
        key: &SearchKey,
        ttl: Ttl,
    ) -> StoreResult<usize> {
        info!(event = %Event::TtlUpdateBegin, id = key.id().as_str(), ttl = %ttl);

        let documents: Vec<VersionedDocument<T>> = self
            .find_all_versions(key)
            .await?
            .into_iter()
            .filter_map(|decoded| match decoded {
                Decoded::Valid(doc) => Some(doc),
                Decoded::Invalid(errors) => {
                    warn!(
                        event = %Event::DecodeFailed,
                        id = key.id().as_str(),
                        errors = %errors,
                        "skipping invalid snapshot"
                    );
                    None
                }
            })
            .collect();

        if documents.is_empty() {
            info!(event = %Event::TtlUpdateComplete, id = key.id().as_str(), patched = 0);
            return Ok(0);
        }

        let partition_key = self.batch_partition_key(key, &documents[0])?;
        let operations: Vec<BatchOperation> = documents
            .iter()
            .map(|doc| {
                let patch = PatchOperation::add(TTL_PATH, json!(ttl));
                BatchOperation::patch(doc.id.as_str(), vec![patch])
            })
            .collect();

        let container = self.versioned.documents().container();
        let metrics = self.versioned.documents().metrics();
        let chunks = operations.chunks(MAX_BATCH_OPERATIONS).count();
        let mut patched = 0usize;

        for (index, chunk) in operations.chunks(MAX_BATCH_OPERATIONS).enumerate() {
            metrics.increment_batches();
            let responses = match container.batch(&partition_key, chunk).await {
                Ok(responses) => responses,
                Err(err) => {
                    error!(
                        event = %Event::TtlBatchFailed,
                        id = key.id().as_str(),
                        chunk = index,
                        patched,
                        error = %err
                    );
                    let err = StoreError::from(err);
                    metrics.record_error(&err);
                    return Err(err);
                }
            };

            if let Some(code) = failing_status(&responses) {
                error!(
                    event = %Event::TtlBatchFailed,
                    id = key.id().as_str(),
                    chunk = index,
                    status = code,
                    patched
                );
                let err = StoreError::response(
                    Some(code),
                    format!(
                        "ttl batch {} of {} failed with status {}; {} of {} snapshots were patched",
                        index + 1,
                        chunks,
                        code,
                        patched,
                        documents.len()
                    ),
                );
                metrics.record_error(&err);
                return Err(err);
            }

            let committed = responses.iter().filter(|r| r.status_code == status::OK).count();
            patched += committed;
            metrics.add_patched_items(committed as u64);
            debug!(
                event = %Event::TtlBatchCommit,
                id = key.id().as_str(),
                chunk = index,
                committed
            );
        }

        if patched != documents.len() {
            error!(
                event = %Event::TtlBatchFailed,
                id = key.id().as_str(),
                patched,
                expected = documents.len()
            );
            let err = StoreError::response(
                None,
                format!("ttl update patched {} of {} snapshots", patched, documents.len()),
            );
            metrics.record_error(&err);
            return Err(err);
        }

        info!(event = %Event::TtlUpdateComplete, id = key.id().as_str(), patched);
        Ok(patched)
    }

    /// Partition shared by the chain: explicit key, else the partition field
    /// of a stored snapshot, else the model id.
    fn batch_partition_key(
        &self,
        key: &SearchKey,
        sample: &VersionedDocument<T>,
    ) -> StoreResult<String> {
        if let Some(pk) = key.explicit_partition_key() {
            return Ok(pk.to_string());
        }
        match &self.versioned.keys().partition_key_field {
            Some(field) => {
                let encoded = serde_json::to_value(sample)
                    .map_err(|e| StoreError::decoding(ValidationDetails::from_serde(&e)))?;
                Ok(string_field(&encoded, field)?.into_inner())
            }
            None => Ok(key.id().to_string()),
        }
    }
}

/// Status of the operation that failed a batch.
///
/// Operations rolled back because of another one report 424; the root cause
/// is preferred when present.
fn failing_status(responses: &[OperationResponse]) -> Option<u16> {
    let mut failures = responses.iter().filter(|r| !status::is_success(r.status_code));
    let first = failures.next()?.status_code;
    if first != status::FAILED_DEPENDENCY {
        return Some(first);
    }
    Some(
        failures
            .map(|r| r.status_code)
            .find(|&code| code != status::FAILED_DEPENDENCY)
            .unwrap_or(first),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryContainer;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Service {
        service_id: String,
        name: String,
    }

    impl Schema for Service {}

    fn service(name: &str) -> Service {
        Service {
            service_id: "svc-1".into(),
            name: name.into(),
        }
    }

    fn setup() -> (Arc<MemoryContainer>, VersionedTtlClient<Service>) {
        let container = Arc::new(MemoryContainer::new("services", "/serviceId"));
        let keys = VersionedKeys::partitioned_by_model_id("serviceId");
        let client = VersionedTtlClient::new(container.clone(), keys);
        (container, client)
    }

    fn key() -> SearchKey {
        SearchKey::parse("svc-1", None).unwrap()
    }

    #[tokio::test]
    async fn test_find_all_versions_ascending() {
        let (_, client) = setup();
        for name in ["a", "b", "c"] {
            client.upsert(service(name)).await.unwrap();
        }
        let versions: Vec<u64> = client
            .find_all_versions(&key())
            .await
            .unwrap()
            .into_iter()
            .filter_map(Decoded::valid)
            .map(|doc| doc.version())
            .collect();
        assert_eq!(versions, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_update_ttl_on_empty_chain() {
        let (_, client) = setup();
        assert_eq!(client.update_ttl_for_all_versions(&key(), Ttl::Never).await.unwrap(), 0);
        assert_eq!(client.versioned().documents().metrics().snapshot().batches, 0);
    }

    #[tokio::test]
    async fn test_update_ttl_patches_every_version() {
        let (_, client) = setup();
        for name in ["a", "b", "c"] {
            client.upsert(service(name)).await.unwrap();
        }
        let ttl = Ttl::seconds(3600).unwrap();
        assert_eq!(client.update_ttl_for_all_versions(&key(), ttl).await.unwrap(), 3);

        for doc in client.find_all_versions(&key()).await.unwrap() {
            assert_eq!(doc.valid().unwrap().ttl(), Some(ttl));
        }
    }

    #[tokio::test]
    async fn test_update_ttl_skips_invalid_snapshots() {
        let (container, client) = setup();
        client.upsert(service("a")).await.unwrap();
        container
            .create_item(
                json!({"id": "svc-1-0000000000000001", "serviceId": "svc-1", "version": 1}),
                &Default::default(),
            )
            .await
            .unwrap();

        assert_eq!(client.update_ttl_for_all_versions(&key(), Ttl::Never).await.unwrap(), 1);
        let untouched = container.item("svc-1-0000000000000001", "svc-1").await.unwrap();
        assert!(untouched.get("ttl").is_none());
    }

    #[test]
    fn test_failing_status_prefers_root_cause() {
        let responses = [
            OperationResponse {
                status_code: 424,
                resource: None,
            },
            OperationResponse {
                status_code: 404,
                resource: None,
            },
        ];
        assert_eq!(failing_status(&responses), Some(404));
        assert_eq!(failing_status(&responses[..1]), Some(424));
        assert_eq!(failing_status(&[]), None);
    }
}
