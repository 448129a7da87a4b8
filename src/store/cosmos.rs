//! # HTTP Container
//!
//! `Container` implementation over the document store's REST API. Requests
//! are signed with the account master key; queries page through
//! `x-ms-continuation`; batches are sent as atomic transactional batches.

use std::fmt;

use chrono::Utc;
use futures_util::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::auth::{MasterKey, API_VERSION};
use super::container::{
    BatchOperation, Container, FeedOptions, FeedPage, ItemResponse, OperationResponse,
    RequestOptions,
};
use super::errors::{status, ResponseError};
use super::query::Query;
use crate::config::{ConfigError, StoreConfig};

const HEADER_DATE: &str = "x-ms-date";
const HEADER_VERSION: &str = "x-ms-version";
const HEADER_PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
const HEADER_IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
const HEADER_IS_QUERY: &str = "x-ms-documentdb-isquery";
const HEADER_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
const HEADER_MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
const HEADER_CONTINUATION: &str = "x-ms-continuation";
const HEADER_IS_BATCH: &str = "x-ms-cosmos-is-batch-request";
const HEADER_BATCH_ATOMIC: &str = "x-ms-cosmos-batch-atomic";

/// Error body returned by the service
#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Query response body
#[derive(Debug, Deserialize)]
struct QueryBody {
    #[serde(rename = "Documents", default)]
    documents: Vec<Value>,
}

/// One entry of a batch response body
#[derive(Debug, Deserialize)]
struct BatchResult {
    #[serde(rename = "statusCode")]
    status_code: u16,
    #[serde(rename = "resourceBody", default)]
    resource_body: Option<Value>,
}

/// Container reached over HTTPS
pub struct CosmosContainer {
    client: Client,
    base_url: String,
    key: MasterKey,
    collection_link: String,
    partition_key_path: String,
    max_item_count: usize,
}

impl CosmosContainer {
    /// Builds the HTTP client for one configured container
    pub fn new(config: &StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ConfigError::Invalid(format!("build http client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url().to_string(),
            key: config.master_key()?,
            collection_link: format!("dbs/{}/colls/{}", config.database, config.container),
            partition_key_path: config.partition_key_path.clone(),
            max_item_count: config.max_item_count,
        })
    }

    pub fn collection_link(&self) -> &str {
        &self.collection_link
    }

    /// Signed request against `path`; `resource_link` is what the signature covers
    fn request(&self, method: Method, path: &str, resource_link: &str) -> RequestBuilder {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let authorization = self.key.authorization(method.as_str(), "docs", resource_link, &date);
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
            .header("authorization", authorization)
            .header(HEADER_DATE, date)
            .header(HEADER_VERSION, API_VERSION)
    }

    fn docs_path(&self) -> String {
        format!("{}/docs", self.collection_link)
    }

    fn partition_key_header(partition_key: &Value) -> String {
        json!([partition_key]).to_string()
    }

    fn partition_key_of<'a>(&self, body: &'a Value) -> Result<&'a Value, ResponseError> {
        match body.pointer(&self.partition_key_path) {
            Some(value @ (Value::String(_) | Value::Number(_))) => Ok(value),
            _ => Err(ResponseError::with_status(
                status::BAD_REQUEST,
                format!("document has no partition key at {}", self.partition_key_path),
            )),
        }
    }

    /// Assigns a client-side id unless the caller disabled it
    fn with_id(mut body: Value, options: &RequestOptions) -> Value {
        if !options.disable_automatic_id_generation {
            if let Some(map) = body.as_object_mut() {
                map.entry("id")
                    .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
            }
        }
        body
    }

    async fn send(request: RequestBuilder) -> Result<Response, ResponseError> {
        request.send().await.map_err(|e| ResponseError::transport(e.to_string()))
    }

    async fn error_from(response: Response) -> ResponseError {
        let code = response.status().as_u16();
        let message = match response.text().await {
            Ok(text) => match serde_json::from_str::<ServiceError>(&text) {
                Ok(ServiceError {
                    message: Some(message), ..
                }) => message,
                Ok(ServiceError { code: Some(code), .. }) => code,
                _ => text,
            },
            Err(e) => format!("unreadable error body: {}", e),
        };
        ResponseError::with_status(code, message)
    }

    async fn item_response(response: Response) -> Result<ItemResponse, ResponseError> {
        let status_code = response.status().as_u16();
        if !status::is_success(status_code) {
            return Err(Self::error_from(response).await);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ResponseError::transport(e.to_string()))?;
        let resource = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(&bytes).map_err(|e| {
                ResponseError::with_status(status_code, format!("invalid response body: {}", e))
            })?)
        };
        Ok(ItemResponse { status_code, resource })
    }

    async fn write(
        &self,
        body: Value,
        options: RequestOptions,
        upsert: bool,
    ) -> Result<ItemResponse, ResponseError> {
        let body = Self::with_id(body, &options);
        let partition_key = Self::partition_key_header(self.partition_key_of(&body)?);

        let mut request = self
            .request(Method::POST, &self.docs_path(), &self.collection_link)
            .header(HEADER_PARTITION_KEY, partition_key)
            .json(&body);
        if upsert {
            request = request.header(HEADER_IS_UPSERT, "True");
        }
        if let Some(etag) = options.if_match {
            request = request.header("If-Match", etag);
        }
        Self::item_response(Self::send(request).await?).await
    }
}

impl fmt::Debug for CosmosContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosmosContainer")
            .field("base_url", &self.base_url)
            .field("collection_link", &self.collection_link)
            .field("partition_key_path", &self.partition_key_path)
            .finish()
    }
}

impl Container for CosmosContainer {
    fn create_item(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        let options = options.clone();
        Box::pin(async move { self.write(body, options, false).await })
    }

    fn upsert_item(
        &self,
        body: Value,
        options: &RequestOptions,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        let options = options.clone();
        Box::pin(async move { self.write(body, options, true).await })
    }

    fn read_item(
        &self,
        id: &str,
        partition_key: &str,
    ) -> BoxFuture<'_, Result<ItemResponse, ResponseError>> {
        let link = format!("{}/{}", self.docs_path(), id);
        let partition_key = Self::partition_key_header(&Value::String(partition_key.to_string()));
        Box::pin(async move {
            let request = self
                .request(Method::GET, &link, &link)
                .header(HEADER_PARTITION_KEY, partition_key);
            let response = Self::send(request).await?;
            if response.status().as_u16() == status::NOT_FOUND {
                return Ok(ItemResponse {
                    status_code: status::NOT_FOUND,
                    resource: None,
                });
            }
            Self::item_response(response).await
        })
    }

    fn query_page(
        &self,
        query: &Query,
        options: &FeedOptions,
    ) -> BoxFuture<'_, Result<FeedPage, ResponseError>> {
        let spec = query.to_sql_spec();
        let options = options.clone();
        Box::pin(async move {
            let body = serde_json::to_vec(&spec)
                .map_err(|e| ResponseError::transport(format!("encode query: {}", e)))?;
            let max_item_count = options.max_item_count.unwrap_or(self.max_item_count);

            let mut request = self
                .request(Method::POST, &self.docs_path(), &self.collection_link)
                .header("content-type", "application/query+json")
                .header(HEADER_IS_QUERY, "True")
                .header(HEADER_MAX_ITEM_COUNT, max_item_count.to_string())
                .body(body);
            request = match options.partition_key {
                Some(pk) => request.header(
                    HEADER_PARTITION_KEY,
                    Self::partition_key_header(&Value::String(pk)),
                ),
                None => request.header(HEADER_CROSS_PARTITION, "True"),
            };
            if let Some(token) = options.continuation {
                request = request.header(HEADER_CONTINUATION, token);
            }

            let response = Self::send(request).await?;
            if !response.status().is_success() {
                return Err(Self::error_from(response).await);
            }
            let continuation = response
                .headers()
                .get(HEADER_CONTINUATION)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            let body: QueryBody = response
                .json()
                .await
                .map_err(|e| ResponseError::transport(format!("decode query page: {}", e)))?;

            Ok(FeedPage {
                items: body.documents,
                continuation,
            })
        })
    }

    fn batch(
        &self,
        partition_key: &str,
        operations: &[BatchOperation],
    ) -> BoxFuture<'_, Result<Vec<OperationResponse>, ResponseError>> {
        let partition_key = Self::partition_key_header(&Value::String(partition_key.to_string()));
        let body: Vec<Value> = operations
            .iter()
            .map(|op| {
                json!({
                    "operationType": "Patch",
                    "id": op.id,
                    "resourceBody": { "operations": op.operations },
                })
            })
            .collect();
        Box::pin(async move {
            let request = self
                .request(Method::POST, &self.docs_path(), &self.collection_link)
                .header(HEADER_PARTITION_KEY, partition_key)
                .header(HEADER_IS_BATCH, "True")
                .header(HEADER_BATCH_ATOMIC, "True")
                .json(&body);

            let response = Self::send(request).await?;
            let code = response.status().as_u16();
            // 207 carries per-operation failures in the body
            if !status::is_success(code) {
                return Err(Self::error_from(response).await);
            }
            let results: Vec<BatchResult> = response
                .json()
                .await
                .map_err(|e| {
                    ResponseError::with_status(code, format!("decode batch response: {}", e))
                })?;

            Ok(results
                .into_iter()
                .map(|r| OperationResponse {
                    status_code: r.status_code,
                    resource: r.resource_body,
                })
                .collect())
        })
    }
}
