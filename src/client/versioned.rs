//! # Versioned Document Client
//!
//! Stores every update of a logical model as a new immutable document. The
//! store id of each snapshot is derived from the logical id and the version,
//! so the store's uniqueness check on create is what serializes writers.
//!
//! `upsert` reads the latest version and then creates the next one. Two
//! concurrent upserts of the same model can read the same latest version;
//! exactly one create wins and the other fails with 409. Callers needing
//! linearizable updates must serialize upserts themselves.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use super::document::DocumentClient;
use crate::model::{
    encode, json_type_name, NewDocument, NonEmptyString, RetrievedDocument, Schema, SearchKey,
    ValidationDetails, Versioned,
};
use crate::observability::{Event, StoreMetrics};
use crate::store::{Container, FeedOptions, Query, RequestOptions, StoreError, StoreResult};

/// Name of the version field in stored documents
pub const VERSION_FIELD: &str = "version";

/// Keys owned by the snapshot envelope, never by the payload
const RESERVED_FIELDS: [&str; 3] = ["id", VERSION_FIELD, "ttl"];

/// A stored snapshot of `T`
pub type VersionedDocument<T> = RetrievedDocument<Versioned<T>>;

/// Generic client over versioned snapshots of `T`
pub type VersionedDocumentClient<T> =
    DocumentClient<NewDocument<Versioned<T>>, VersionedDocument<T>>;

/// Fields that locate a model's version chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedKeys {
    /// Payload field holding the logical id shared by all versions
    pub model_id_field: String,
    /// Payload field holding the container partition key, when there is one
    pub partition_key_field: Option<String>,
}

impl VersionedKeys {
    pub fn new(model_id_field: impl Into<String>) -> Self {
        Self {
            model_id_field: model_id_field.into(),
            partition_key_field: None,
        }
    }

    pub fn with_partition_key_field(mut self, field: impl Into<String>) -> Self {
        self.partition_key_field = Some(field.into());
        self
    }

    /// Chain partitioned by the logical id itself
    pub fn partitioned_by_model_id(model_id_field: impl Into<String>) -> Self {
        let field = model_id_field.into();
        Self::new(field.clone()).with_partition_key_field(field)
    }
}

/// Store id of `version` of `model_id`.
///
/// The version is zero-padded to 16 digits so ids of one chain sort by
/// version. Everything after the last `-` is always the version, which keeps
/// the mapping injective even when the model id contains dashes.
pub fn derive_id(model_id: &NonEmptyString, version: u64) -> NonEmptyString {
    NonEmptyString::from_nonempty(format!("{}-{:016}", model_id, version))
}

pub struct VersionedClient<T> {
    documents: VersionedDocumentClient<T>,
    keys: VersionedKeys,
}

impl<T> Clone for VersionedClient<T> {
    fn clone(&self) -> Self {
        Self {
            documents: self.documents.clone(),
            keys: self.keys.clone(),
        }
    }
}

impl<T: Schema> VersionedClient<T> {
    pub fn new(container: Arc<dyn Container>, keys: VersionedKeys) -> Self {
        Self {
            documents: DocumentClient::new(container),
            keys,
        }
    }

    pub fn with_metrics(
        container: Arc<dyn Container>,
        keys: VersionedKeys,
        metrics: Arc<StoreMetrics>,
    ) -> Self {
        Self {
            documents: DocumentClient::with_metrics(container, metrics),
            keys,
        }
    }

    /// The wrapped generic client
    pub fn documents(&self) -> &VersionedDocumentClient<T> {
        &self.documents
    }

    pub fn keys(&self) -> &VersionedKeys {
        &self.keys
    }

    /// Latest snapshot, `None` for an unknown model.
    ///
    /// Only the top row is considered: if it fails validation the result is a
    /// `DecodingError`, even when older versions are valid.
    pub async fn find_last_version(
        &self,
        key: &SearchKey,
    ) -> StoreResult<Option<VersionedDocument<T>>> {
        let query = self.chain_query(key).order_by(VERSION_FIELD, false).top(1);
        self.documents.find_one_by_query(query, self.feed_options(key)).await
    }

    /// One specific snapshot.
    ///
    /// A point read of the derived id when the chain's partition is known,
    /// otherwise a cross-partition query on the version field.
    pub async fn find_version(
        &self,
        key: &SearchKey,
        version: u64,
    ) -> StoreResult<Option<VersionedDocument<T>>> {
        let options = self.feed_options(key);
        let partition_key = options
            .partition_key
            .as_deref()
            .and_then(|pk| NonEmptyString::new(pk).ok());
        match partition_key {
            Some(partition_key) => {
                let id = derive_id(key.id(), version);
                self.documents
                    .find(&SearchKey::with_partition_key(id, partition_key))
                    .await
            }
            None => {
                let query = self.chain_query(key).where_eq(VERSION_FIELD, version).top(1);
                self.documents.find_one_by_query(query, options).await
            }
        }
    }

    /// Writes version 0 of a new model. Fails with 409 if the chain exists.
    pub async fn create(&self, model: T) -> StoreResult<VersionedDocument<T>> {
        let key = self.search_key_of(&model)?;
        self.create_version(key.id(), 0, model).await
    }

    /// Appends the next version of the model
    pub async fn upsert(&self, model: T) -> StoreResult<VersionedDocument<T>> {
        let key = self.search_key_of(&model)?;
        let next = match self.find_last_version(&key).await? {
            Some(last) => last.version() + 1,
            None => 0,
        };
        self.create_version(key.id(), next, model).await
    }

    async fn create_version(
        &self,
        model_id: &NonEmptyString,
        version: u64,
        model: T,
    ) -> StoreResult<VersionedDocument<T>> {
        let doc = NewDocument::new(
            derive_id(model_id, version),
            Versioned {
                version,
                payload: model,
            },
        );
        debug!(event = %Event::VersionCreate, id = model_id.as_str(), version);

        match self.documents.create(&doc, &RequestOptions::default()).await {
            Ok(created) => {
                info!(
                    event = %Event::VersionCreate,
                    id = model_id.as_str(),
                    version,
                    "version stored"
                );
                Ok(created)
            }
            Err(err) if err.is_conflict() => {
                info!(
                    event = %Event::VersionConflict,
                    id = model_id.as_str(),
                    version,
                    "version already taken"
                );
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Query selecting every snapshot of the model in `key`
    pub(crate) fn chain_query(&self, key: &SearchKey) -> Query {
        Query::new().where_eq(self.keys.model_id_field.as_str(), key.id().as_str())
    }

    /// Scopes chain queries to one partition when it is known
    pub(crate) fn feed_options(&self, key: &SearchKey) -> FeedOptions {
        let by_model_id =
            self.keys.partition_key_field.as_deref() == Some(self.keys.model_id_field.as_str());
        let partition_key = match key.explicit_partition_key() {
            Some(pk) => Some(pk.to_string()),
            None if by_model_id => Some(key.id().to_string()),
            None => None,
        };
        FeedOptions {
            partition_key,
            ..FeedOptions::default()
        }
    }

    /// Logical id and partition key of a model, read from its encoded form.
    ///
    /// Payloads carrying a field the stored snapshot reserves are rejected,
    /// since flattening would let them override the derived id or version.
    pub fn search_key_of(&self, model: &T) -> StoreResult<SearchKey> {
        let encoded = encode(model)?;
        if let Some(field) = reserved_field(&encoded) {
            return Err(StoreError::decoding(ValidationDetails::new(
                field,
                "no reserved field in the payload",
                "reserved field present",
            )));
        }
        let model_id = string_field(&encoded, &self.keys.model_id_field)?;
        match &self.keys.partition_key_field {
            Some(field) => {
                let partition_key = string_field(&encoded, field)?;
                Ok(SearchKey::with_partition_key(model_id, partition_key))
            }
            None => Ok(SearchKey::new(model_id)),
        }
    }
}

/// First payload key that collides with the snapshot envelope
fn reserved_field(encoded: &Value) -> Option<&str> {
    encoded.as_object().and_then(|fields| {
        fields
            .keys()
            .map(String::as_str)
            .find(|key| RESERVED_FIELDS.contains(key) || key.starts_with('_'))
    })
}

/// Reads a non-empty string field from an encoded payload
pub(crate) fn string_field(encoded: &Value, field: &str) -> StoreResult<NonEmptyString> {
    match encoded.get(field) {
        Some(Value::String(s)) => NonEmptyString::new(s.as_str()).map_err(|_| {
            StoreError::decoding(ValidationDetails::new(field, "non-empty string", "empty string"))
        }),
        Some(other) => Err(StoreError::decoding(ValidationDetails::type_mismatch(
            field,
            "string",
            json_type_name(other),
        ))),
        None => Err(StoreError::decoding(ValidationDetails::missing_field(field))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryContainer, StoreErrorKind};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Profile {
        fiscal_code: String,
        email: String,
    }

    impl Schema for Profile {}

    fn profile(email: &str) -> Profile {
        Profile {
            fiscal_code: "AAAAAA00A00A000A".into(),
            email: email.into(),
        }
    }

    fn client() -> VersionedClient<Profile> {
        let container = Arc::new(MemoryContainer::new("profiles", "/fiscalCode"));
        VersionedClient::new(container, VersionedKeys::partitioned_by_model_id("fiscalCode"))
    }

    fn key() -> SearchKey {
        SearchKey::parse("AAAAAA00A00A000A", None).unwrap()
    }

    #[test]
    fn test_derive_id_is_padded_and_ordered() {
        let id = NonEmptyString::new("A-B").unwrap();
        assert_eq!(derive_id(&id, 2).as_str(), "A-B-0000000000000002");
        assert!(derive_id(&id, 9).as_str() < derive_id(&id, 10).as_str());
        assert_eq!(derive_id(&id, 7), derive_id(&id, 7));
    }

    #[test]
    fn test_derive_id_is_injective_for_dashed_ids() {
        let a = derive_id(&NonEmptyString::new("x-1").unwrap(), 2);
        let b = derive_id(&NonEmptyString::new("x").unwrap(), 12);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_create_writes_version_zero() {
        let client = client();
        let created = client.create(profile("a@example.com")).await.unwrap();
        assert_eq!(created.version(), 0);
        assert_eq!(created.id.as_str(), "AAAAAA00A00A000A-0000000000000000");
    }

    #[tokio::test]
    async fn test_create_twice_conflicts() {
        let client = client();
        client.create(profile("a@example.com")).await.unwrap();
        let err = client.create(profile("b@example.com")).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_upsert_without_chain_starts_at_zero() {
        let client = client();
        let first = client.upsert(profile("a@example.com")).await.unwrap();
        assert_eq!(first.version(), 0);
    }

    #[tokio::test]
    async fn test_find_last_and_specific_version() {
        let client = client();
        client.create(profile("v0@example.com")).await.unwrap();
        client.upsert(profile("v1@example.com")).await.unwrap();
        client.upsert(profile("v2@example.com")).await.unwrap();

        let last = client.find_last_version(&key()).await.unwrap().unwrap();
        assert_eq!(last.version(), 2);
        assert_eq!(last.model().email, "v2@example.com");

        let first = client.find_version(&key(), 0).await.unwrap().unwrap();
        assert_eq!(first.model().email, "v0@example.com");
        assert!(client.find_version(&key(), 9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_last_version_of_unknown_model() {
        let client = client();
        assert!(client.find_last_version(&key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_model_id_is_decoding_error() {
        let container = Arc::new(MemoryContainer::new("profiles", "/fiscalCode"));
        let client: VersionedClient<Profile> =
            VersionedClient::new(container, VersionedKeys::new("taxCode"));
        let err = client.create(profile("a@example.com")).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::DecodingError);
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Tagged {
        model_id: String,
        id: String,
    }

    impl Schema for Tagged {}

    #[tokio::test]
    async fn test_payload_id_is_rejected_before_write() {
        let container = Arc::new(MemoryContainer::new("tagged", "/modelId"));
        let keys = VersionedKeys::partitioned_by_model_id("modelId");
        let client: VersionedClient<Tagged> = VersionedClient::new(container.clone(), keys);
        let tagged = Tagged {
            model_id: "m".into(),
            id: "x".into(),
        };

        let err = client.create(tagged.clone()).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::DecodingError);
        assert!(err.to_string().contains("'id'"));

        let err = client.upsert(tagged).await.unwrap_err();
        assert_eq!(err.kind(), StoreErrorKind::DecodingError);
        assert!(container.is_empty().await);
    }

    #[test]
    fn test_reserved_fields() {
        assert_eq!(reserved_field(&serde_json::json!({"a": 1, "version": 2})), Some("version"));
        assert_eq!(reserved_field(&serde_json::json!({"_etag": "x"})), Some("_etag"));
        assert_eq!(reserved_field(&serde_json::json!({"ttl": 5})), Some("ttl"));
        assert_eq!(reserved_field(&serde_json::json!({"modelId": "m", "idx": 1})), None);
    }

    #[tokio::test]
    async fn test_find_version_without_known_partition_queries() {
        let container = Arc::new(MemoryContainer::new("profiles", "/email"));
        let client: VersionedClient<Profile> = VersionedClient::new(
            container,
            VersionedKeys::new("fiscalCode").with_partition_key_field("email"),
        );
        client.create(profile("a@example.com")).await.unwrap();

        let found = client.find_version(&key(), 0).await.unwrap().unwrap();
        assert_eq!(found.model().email, "a@example.com");
        assert!(client.find_version(&key(), 1).await.unwrap().is_none());
    }

    #[test]
    fn test_feed_options_scope() {
        let client = client();
        assert_eq!(client.feed_options(&key()).partition_key.as_deref(), Some("AAAAAA00A00A000A"));

        let container = Arc::new(MemoryContainer::partitioned_by_id("profiles"));
        let unscoped: VersionedClient<Profile> =
            VersionedClient::new(container, VersionedKeys::new("fiscalCode"));
        assert_eq!(unscoped.feed_options(&key()).partition_key, None);
    }
}
