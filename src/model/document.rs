//! Document shapes at each stage of the lifecycle
//!
//! - `NewDocument<T>`: payload plus the identity required before first write
//! - `RetrievedDocument<T>`: payload plus everything the store assigned
//! - `Versioned<T>`: payload plus its position in a version chain
//!
//! Versioned shapes compose: a stored snapshot is `RetrievedDocument<Versioned<T>>`.

use serde::{Deserialize, Serialize};

use super::codec::{DecodeErrors, Schema};
use super::types::{EmptyString, NonEmptyString, Ttl};

/// A document that has not been persisted yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument<T> {
    pub id: NonEmptyString,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> NewDocument<T> {
    pub fn new(id: NonEmptyString, payload: T) -> Self {
        Self { id, payload }
    }
}

impl<T: Schema> Schema for NewDocument<T> {
    fn validate(&self) -> Result<(), DecodeErrors> {
        self.payload.validate()
    }
}

/// System fields the store attaches to every persisted document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMeta {
    /// Concurrency tag, changes on every write
    #[serde(rename = "_etag")]
    pub etag: String,
    #[serde(rename = "_rid")]
    pub rid: String,
    #[serde(rename = "_self")]
    pub self_link: String,
    /// Last modification, unix seconds
    #[serde(rename = "_ts")]
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<Ttl>,
}

/// A document as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDocument<T> {
    pub id: NonEmptyString,
    #[serde(flatten)]
    pub meta: ResourceMeta,
    #[serde(flatten)]
    pub payload: T,
}

impl<T> RetrievedDocument<T> {
    #[inline]
    pub fn etag(&self) -> &str {
        &self.meta.etag
    }

    #[inline]
    pub fn ttl(&self) -> Option<Ttl> {
        self.meta.ttl
    }
}

impl<T: Schema> Schema for RetrievedDocument<T> {
    fn validate(&self) -> Result<(), DecodeErrors> {
        self.payload.validate()
    }
}

/// Payload wrapper carrying the chain position.
///
/// `version` is zero-based and dense per logical id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    #[serde(flatten)]
    pub payload: T,
}

impl<T: Schema> Schema for Versioned<T> {
    fn validate(&self) -> Result<(), DecodeErrors> {
        self.payload.validate()
    }
}

impl<T> RetrievedDocument<Versioned<T>> {
    #[inline]
    pub fn version(&self) -> u64 {
        self.payload.version
    }

    /// The caller's payload, without versioning or system fields
    #[inline]
    pub fn model(&self) -> &T {
        &self.payload.payload
    }
}

/// Anything carrying a store-level id, usable as a paging cursor
pub trait Identified {
    fn id(&self) -> &str;
}

impl<T> Identified for RetrievedDocument<T> {
    fn id(&self) -> &str {
        self.id.as_str()
    }
}

/// Point-lookup key: `[id]` or `[id, partition_key]`.
///
/// When no partition key is given the id doubles as the partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchKey {
    id: NonEmptyString,
    partition_key: Option<NonEmptyString>,
}

impl SearchKey {
    pub fn new(id: NonEmptyString) -> Self {
        Self { id, partition_key: None }
    }

    pub fn with_partition_key(id: NonEmptyString, partition_key: NonEmptyString) -> Self {
        Self {
            id,
            partition_key: Some(partition_key),
        }
    }

    /// Builds a key from borrowed strings, rejecting empty parts.
    pub fn parse(id: &str, partition_key: Option<&str>) -> Result<Self, EmptyString> {
        let id = NonEmptyString::new(id)?;
        match partition_key {
            Some(pk) => Ok(Self::with_partition_key(id, NonEmptyString::new(pk)?)),
            None => Ok(Self::new(id)),
        }
    }

    #[inline]
    pub fn id(&self) -> &NonEmptyString {
        &self.id
    }

    /// Partition key, defaulting to the id
    #[inline]
    pub fn partition_key(&self) -> &str {
        self.partition_key.as_deref().unwrap_or(self.id.as_str())
    }

    /// Partition key only when one was given explicitly
    #[inline]
    pub fn explicit_partition_key(&self) -> Option<&str> {
        self.partition_key.as_deref()
    }
}

impl From<NonEmptyString> for SearchKey {
    fn from(id: NonEmptyString) -> Self {
        Self::new(id)
    }
}

impl TryFrom<&str> for SearchKey {
    type Error = EmptyString;

    fn try_from(id: &str) -> Result<Self, Self::Error> {
        Self::parse(id, None)
    }
}
