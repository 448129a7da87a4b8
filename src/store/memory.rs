//! # In-Process Container
//!
//! Keeps documents in memory with the observable behavior of the remote
//! store: system fields on every write, 409 on duplicate create, 404 reads,
//! continuation paging and atomic batches. Items are never expired; `ttl` is
//! stored like any other field.

use std::collections::BTreeMap;

use chrono::Utc;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::container::{
    BatchOperation, Container, FeedOptions, FeedPage, ItemResponse, OperationResponse, PatchOp,
    PatchOperation, RequestOptions, MAX_BATCH_OPERATIONS,
};
use super::errors::{status, ResponseError};
use super::query::Query;

/// Page size used when the query does not ask for one
const DEFAULT_PAGE_SIZE: usize = 100;

/// Fields owned by the store, replaced on every write
const SYSTEM_FIELDS: [&str; 5] = ["_rid", "_self", "_etag", "_ts", "_attachments"];

/// Documents keyed by (partition key, id)
type Documents = BTreeMap<(String, String), Value>;

/// In-memory container
#[derive(Debug)]
pub struct MemoryContainer {
    name: String,
    partition_key_path: String,
    documents: RwLock<Documents>,
}

impl MemoryContainer {
    /// Creates an empty container partitioned by the given JSON path (e.g. `/serviceId`)
    pub fn new(name: impl Into<String>, partition_key_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partition_key_path: partition_key_path.into(),
            documents: RwLock::new(BTreeMap::new()),
        }
    }

    /// Creates an empty container partitioned by `/id`
    pub fn partitioned_by_id(name: impl Into<String>) -> Self {
        Self::new(name, "/id")
    }

    pub fn partition_key_path(&self) -> &str {
        &self.partition_key_path
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Raw stored document, system fields included
    pub async fn item(&self, id: &str, partition_key: &str) -> Option<Value> {
        self.documents
            .read()
            .await
            .get(&(partition_key.to_string(), id.to_string()))
            .cloned()
    }

    /// Partition key value at `partition_key_path` (a JSON pointer) in `body`
    fn partition_key_of(&self, body: &Map<String, Value>) -> Result<String, ResponseError> {
        let path = self.partition_key_path.trim_start_matches('/');
        let (head, rest) = match path.split_once('/') {
            Some((head, rest)) => (head, Some(rest)),
            None => (path, None),
        };
        let head = head.replace("~1", "/").replace("~0", "~");
        let value = body.get(&head).and_then(|value| match rest {
            Some(rest) => value.pointer(&format!("/{}", rest)),
            None => Some(value),
        });
        match value {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(ResponseError::with_status(
                status::BAD_REQUEST,
                format!(
                    "PartitionKey extracted from document doesn't match the one specified in the header ({})",
                    self.partition_key_path
                ),
            )),
        }
    }

    /// Adds system fields, keeping `rid` when the document already had one
    fn stamp(&self, mut body: Map<String, Value>, rid: Option<String>) -> Value {
        for field in SYSTEM_FIELDS {
            body.remove(field);
        }
        let rid = rid.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        body.insert(
            "_self".into(),
            Value::String(format!("dbs/memory/colls/{}/docs/{}/", self.name, rid)),
        );
        body.insert("_rid".into(), Value::String(rid));
        body.insert("_etag".into(), Value::String(format!("\"{}\"", Uuid::new_v4())));
        body.insert("_ts".into(), Value::from(Utc::now().timestamp()));
        body.insert("_attachments".into(), Value::String("attachments/".into()));
        Value::Object(body)
    }

    /// Validates the body and returns it with (partition key, id)
    fn prepare(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> Result<(Map<String, Value>, (String, String)), ResponseError> {
        let mut body = match body {
            Value::Object(map) => map,
            _ => {
                return Err(ResponseError::with_status(
                    status::BAD_REQUEST,
                    "The input content is invalid because it is not a JSON object.",
                ))
            }
        };

        let id = match body.get("id") {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(_) => {
                return Err(ResponseError::with_status(
                    status::BAD_REQUEST,
                    "The input content is invalid because the property id is not a non-empty string.",
                ))
            }
            None if options.disable_automatic_id_generation => {
                return Err(ResponseError::with_status(
                    status::BAD_REQUEST,
                    "The input content is invalid because the required property, id, is missing.",
                ))
            }
            None => {
                let id = Uuid::new_v4().to_string();
                body.insert("id".into(), Value::String(id.clone()));
                id
            }
        };

        let partition_key = self.partition_key_of(&body)?;
        Ok((body, (partition_key, id)))
    }
}

impl Container for MemoryContainer {
    fn create_item(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        let prepared = self.prepare(body, options);
        Box::pin(async move {
            let (body, key) = prepared?;
            let mut documents = self.documents.write().await;
            if documents.contains_key(&key) {
                return Err(ResponseError::with_status(
                    status::CONFLICT,
                    "Entity with the specified id already exists in the system.",
                ));
            }
            let stored = self.stamp(body, None);
            documents.insert(key, stored.clone());
            Ok(ItemResponse {
                status_code: status::CREATED,
                resource: Some(stored),
            })
        })
    }

    fn upsert_item(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        let prepared = self.prepare(body, options);
        let if_match = options.if_match.clone();
        Box::pin(async move {
            let (body, key) = prepared?;
            let mut documents = self.documents.write().await;
            let existing = documents.get(&key);

            if let Some(expected) = if_match {
                let current = existing.and_then(|doc| doc.get("_etag")).and_then(Value::as_str);
                if current != Some(expected.as_str()) {
                    return Err(ResponseError::with_status(
                        status::PRECONDITION_FAILED,
                        "Operation cannot be performed because one of the specified precondition is not met.",
                    ));
                }
            }

            let rid = existing
                .and_then(|doc| doc.get("_rid"))
                .and_then(Value::as_str)
                .map(str::to_string);
            let status_code = if rid.is_some() { status::OK } else { status::CREATED };
            let stored = self.stamp(body, rid);
            documents.insert(key, stored.clone());
            Ok(ItemResponse {
                status_code,
                resource: Some(stored),
            })
        })
    }

    fn read_item(
        &self,
        id: &str,
        partition_key: &str,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        let key = (partition_key.to_string(), id.to_string());
        Box::pin(async move {
            let documents = self.documents.read().await;
            Ok(match documents.get(&key) {
                Some(doc) => ItemResponse {
                    status_code: status::OK,
                    resource: Some(doc.clone()),
                },
                None => ItemResponse {
                    status_code: status::NOT_FOUND,
                    resource: None,
                },
            })
        })
    }

    fn query_page(
        &self,
        query: &Query,
        options: &FeedOptions,
    ) -> BoxFuture<'_, Result<FeedPage, ResponseError>> {
        let query = query.clone();
        let options = options.clone();
        Box::pin(async move {
            let offset = match options.continuation.as_deref() {
                None => 0,
                Some(token) => token.parse::<usize>().map_err(|_| {
                    ResponseError::with_status(
                        status::BAD_REQUEST,
                        format!("Invalid continuation token '{}'", token),
                    )
                })?,
            };

            let mut matched: Vec<Value> = {
                let documents = self.documents.read().await;
                documents
                    .iter()
                    .filter(|((pk, _), _)| options.partition_key.as_ref().map_or(true, |p| p == pk))
                    .map(|(_, doc)| doc)
                    .filter(|doc| query.matches(doc))
                    .cloned()
                    .collect()
            };
            query.sort(&mut matched);
            if let Some(top) = query.limit() {
                matched.truncate(top);
            }

            let page_size = options.max_item_count.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
            let end = offset.saturating_add(page_size).min(matched.len());
            let items = matched.get(offset..end).map(<[Value]>::to_vec).unwrap_or_default();
            let continuation = (end < matched.len()).then(|| end.to_string());
            Ok(FeedPage { items, continuation })
        })
    }

    fn batch(
        &self,
        partition_key: &str,
        operations: &[BatchOperation],
    ) -> BoxFuture<'_, Result<Vec<OperationResponse>, ResponseError>> {
        let partition_key = partition_key.to_string();
        let operations = operations.to_vec();
        Box::pin(async move {
            if operations.is_empty() {
                return Err(ResponseError::with_status(
                    status::BAD_REQUEST,
                    "Batch request has no operations.",
                ));
            }
            if operations.len() > MAX_BATCH_OPERATIONS {
                return Err(ResponseError::with_status(
                    status::BAD_REQUEST,
                    format!(
                        "Batch request has more operations than what is supported ({}).",
                        MAX_BATCH_OPERATIONS
                    ),
                ));
            }

            let mut documents = self.documents.write().await;
            let mut staged: Vec<(String, Map<String, Value>)> =
                Vec::with_capacity(operations.len());
            let mut failure = None;

            for (index, operation) in operations.iter().enumerate() {
                let current = staged
                    .iter()
                    .rev()
                    .find(|(id, _)| id == &operation.id)
                    .map(|(_, doc)| Value::Object(doc.clone()))
                    .or_else(|| {
                        documents
                            .get(&(partition_key.clone(), operation.id.clone()))
                            .cloned()
                    });

                let mut doc = match current {
                    Some(doc) => doc,
                    None => {
                        failure = Some((index, status::NOT_FOUND));
                        break;
                    }
                };
                if let Err(code) = apply_patch(&mut doc, &operation.operations) {
                    failure = Some((index, code));
                    break;
                }
                match doc {
                    Value::Object(map) => staged.push((operation.id.clone(), map)),
                    _ => {
                        failure = Some((index, status::BAD_REQUEST));
                        break;
                    }
                }
            }

            if let Some((failed, code)) = failure {
                return Ok((0..operations.len())
                    .map(|index| OperationResponse {
                        status_code: if index == failed { code } else { status::FAILED_DEPENDENCY },
                        resource: None,
                    })
                    .collect());
            }

            let mut responses = Vec::with_capacity(staged.len());
            for (id, body) in staged {
                let rid = body.get("_rid").and_then(Value::as_str).map(str::to_string);
                let stored = self.stamp(body, rid);
                documents.insert((partition_key.clone(), id), stored.clone());
                responses.push(OperationResponse {
                    status_code: status::OK,
                    resource: Some(stored),
                });
            }
            Ok(responses)
        })
    }
}

/// Applies patch steps to a document; returns the failing status code
fn apply_patch(doc: &mut Value, operations: &[PatchOperation]) -> Result<(), u16> {
    for operation in operations {
        let split = operation.path.rfind('/').ok_or(status::BAD_REQUEST)?;
        let (parent_path, member) = operation.path.split_at(split);
        let member = member[1..].replace("~1", "/").replace("~0", "~");
        let reserved = parent_path.is_empty() && (member == "id" || member.starts_with('_'));
        if member.is_empty() || reserved {
            return Err(status::BAD_REQUEST);
        }

        let parent = doc
            .pointer_mut(parent_path)
            .and_then(Value::as_object_mut)
            .ok_or(status::BAD_REQUEST)?;

        match operation.op {
            PatchOp::Add => {
                let value = operation.value.clone().ok_or(status::BAD_REQUEST)?;
                parent.insert(member, value);
            }
            PatchOp::Replace => {
                let value = operation.value.clone().ok_or(status::BAD_REQUEST)?;
                match parent.get_mut(&member) {
                    Some(slot) => *slot = value,
                    None => return Err(status::BAD_REQUEST),
                }
            }
            PatchOp::Remove => {
                parent.remove(&member).ok_or(status::BAD_REQUEST)?;
            }
        }
    }
    Ok(())
}
