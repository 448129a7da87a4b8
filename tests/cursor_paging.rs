//! Cursor Paging Tests
//!
//! Walks a partition page by page through `page_documents`:
//! - Pages are ordered by id, newest first
//! - `next` of one page is the `--after` cursor of the following one
//! - Invalid documents are skipped without shrinking the page

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use docmodel::client::DocumentClient;
use docmodel::model::{NewDocument, RetrievedDocument, Schema};
use docmodel::pagination::{page_documents, CursorQuery, PageResponse};
use docmodel::store::{Container, MemoryContainer, RequestOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    recipient: String,
    subject: String,
}

impl Schema for Message {}

type MessageClient = DocumentClient<NewDocument<Message>, RetrievedDocument<Message>>;

async fn seed(container: &MemoryContainer) {
    for i in 1..=9 {
        let body = if i % 4 == 0 {
            // missing subject
            json!({ "id": format!("msg-{}", i), "recipient": "alice" })
        } else {
            json!({
                "id": format!("msg-{}", i),
                "recipient": "alice",
                "subject": format!("hello {}", i)
            })
        };
        container.create_item(body, &RequestOptions::default()).await.unwrap();
    }
    container
        .create_item(
            json!({ "id": "msg-5b", "recipient": "bob", "subject": "other inbox" }),
            &RequestOptions::default(),
        )
        .await
        .unwrap();
}

fn ids(page: &[RetrievedDocument<Message>]) -> Vec<&str> {
    page.iter().map(|doc| doc.id.as_str()).collect()
}

// =============================================================================
// Walking a partition
// =============================================================================

/// Three pages of valid messages, skipping msg-4 and msg-8.
#[tokio::test]
async fn test_walk_partition_newest_first() {
    let container = Arc::new(MemoryContainer::partitioned_by_id("messages"));
    seed(&container).await;
    let client: MessageClient = DocumentClient::new(container);

    let query = CursorQuery::new("recipient", "alice");
    let first = page_documents(&client, &query, 3).await.unwrap();
    assert_eq!(ids(&first.items), vec!["msg-9", "msg-7", "msg-6"]);
    assert!(first.has_more);
    assert_eq!(first.prev.as_deref(), Some("msg-9"));
    assert_eq!(first.next.as_deref(), Some("msg-6"));

    let query = CursorQuery::new("recipient", "alice").with_max_id(first.next.clone().unwrap());
    let second = page_documents(&client, &query, 3).await.unwrap();
    assert_eq!(ids(&second.items), vec!["msg-5", "msg-3", "msg-2"]);
    assert!(second.has_more);

    let query = CursorQuery::new("recipient", "alice").with_max_id(second.next.clone().unwrap());
    let last = page_documents(&client, &query, 3).await.unwrap();
    assert_eq!(ids(&last.items), vec!["msg-1"]);
    assert!(!last.has_more);

    // msg-4 is decoded by both the first and the second walk
    let metrics = client.metrics().snapshot();
    assert_eq!(metrics.decoding_errors, 3);
}

/// `min_id` bounds the page from below.
#[tokio::test]
async fn test_min_id_returns_newer_items() {
    let container = Arc::new(MemoryContainer::partitioned_by_id("messages"));
    seed(&container).await;
    let client: MessageClient = DocumentClient::new(container);

    let query = CursorQuery::new("recipient", "alice").with_min_id("msg-6");
    let page = page_documents(&client, &query, 10).await.unwrap();
    assert_eq!(ids(&page.items), vec!["msg-9", "msg-7"]);
    assert!(!page.has_more);
}

/// An empty partition gives an empty page without cursors.
#[tokio::test]
async fn test_empty_partition() {
    let container = Arc::new(MemoryContainer::partitioned_by_id("messages"));
    seed(&container).await;
    let client: MessageClient = DocumentClient::new(container);

    let page = page_documents(&client, &CursorQuery::new("recipient", "carol"), 5)
        .await
        .unwrap();
    assert!(page.items.is_empty());
    assert!(!page.has_more);
    assert_eq!(page.next, None);

    let response = PageResponse::from(page);
    assert_eq!(response.items_size, 0);
}
