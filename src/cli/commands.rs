//! CLI command implementations
//!
//! Commands work on raw JSON payloads: the CLI knows nothing about the
//! models stored in the container, only the field names passed as flags.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::info;

use super::args::{ChainArgs, Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};
use crate::client::{DocumentClient, VersionedKeys, VersionedTtlClient};
use crate::config::StoreConfig;
use crate::model::{Decoded, RetrievedDocument, Schema, SearchKey};
use crate::observability::{init_logging, Event};
use crate::pagination::{page_documents, CursorQuery, PageResponse};
use crate::store::{Container, CosmosContainer};

/// Any JSON object, accepted without validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDocument(pub Map<String, Value>);

impl Schema for RawDocument {}

/// Parse arguments, run the command, print the response
pub async fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(cli.log_format);

    match run_command(&cli.config, cli.command).await {
        Ok(data) => write_response(data),
        Err(err) => {
            write_error(err.code_str(), err.message())?;
            Err(err)
        }
    }
}

/// Loads the config and runs one command against the configured container
pub async fn run_command(config_path: &Path, command: Command) -> CliResult<Value> {
    let config = StoreConfig::load(config_path)?;
    info!(
        event = %Event::ConfigLoaded,
        path = %config_path.display(),
        database = config.database.as_str(),
        container = config.container.as_str()
    );
    let container: Arc<dyn Container> = Arc::new(CosmosContainer::new(&config)?);
    execute(container, command).await
}

/// Runs one command and returns the `data` of the response
pub async fn execute(container: Arc<dyn Container>, command: Command) -> CliResult<Value> {
    match command {
        Command::Get { id, partition_key } => get(container, &id, partition_key.as_deref()).await,
        Command::Latest { chain } => latest(container, &chain).await,
        Command::Versions { chain } => versions(container, &chain).await,
        Command::UpdateTtl { chain, ttl } => {
            let (client, key) = chain_client(container, &chain)?;
            let patched = client.update_ttl_for_all_versions(&key, ttl).await?;
            Ok(json!({ "patched": patched, "ttl": ttl }))
        }
        Command::List {
            partition_field,
            partition_value,
            page_size,
            after,
            before,
        } => {
            let mut query = CursorQuery::new(partition_field, partition_value);
            if let Some(cursor) = after {
                query = query.with_max_id(cursor);
            }
            if let Some(cursor) = before {
                query = query.with_min_id(cursor);
            }
            list(container, &query, page_size).await
        }
    }
}

async fn get(
    container: Arc<dyn Container>,
    id: &str,
    partition_key: Option<&str>,
) -> CliResult<Value> {
    let key = SearchKey::parse(id, partition_key)
        .map_err(|e| CliError::invalid_argument(e.to_string()))?;
    let client: DocumentClient<RawDocument, RawDocument> = DocumentClient::new(container);
    let found = client.find(&key).await?;
    Ok(serde_json::to_value(found)?)
}

async fn latest(container: Arc<dyn Container>, chain: &ChainArgs) -> CliResult<Value> {
    let (client, key) = chain_client(container, chain)?;
    let last = client.find_last_version(&key).await?;
    Ok(serde_json::to_value(last)?)
}

async fn versions(container: Arc<dyn Container>, chain: &ChainArgs) -> CliResult<Value> {
    let (client, key) = chain_client(container, chain)?;
    let mut items = Vec::new();
    let mut invalid = Vec::new();
    for decoded in client.find_all_versions(&key).await? {
        match decoded {
            Decoded::Valid(doc) => items.push(serde_json::to_value(doc)?),
            Decoded::Invalid(errors) => invalid.push(errors.to_string()),
        }
    }
    Ok(json!({ "items": items, "invalid": invalid }))
}

async fn list(
    container: Arc<dyn Container>,
    query: &CursorQuery,
    page_size: usize,
) -> CliResult<Value> {
    let client: DocumentClient<RawDocument, RetrievedDocument<RawDocument>> =
        DocumentClient::new(container);
    let page = page_documents(&client, query, page_size).await?;
    Ok(serde_json::to_value(PageResponse::from(page))?)
}

fn chain_client(
    container: Arc<dyn Container>,
    chain: &ChainArgs,
) -> CliResult<(VersionedTtlClient<RawDocument>, SearchKey)> {
    let key = SearchKey::parse(&chain.id, chain.partition_key.as_deref())
        .map_err(|e| CliError::invalid_argument(e.to_string()))?;
    let mut keys = VersionedKeys::new(chain.model_field.as_str());
    if let Some(field) = &chain.partition_field {
        keys = keys.with_partition_key_field(field.as_str());
    }
    Ok((VersionedTtlClient::new(container, keys), key))
}
