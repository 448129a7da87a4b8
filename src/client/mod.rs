//! Typed clients over a `Container`
//!
//! Layered by composition: `VersionedTtlClient` wraps `VersionedClient`,
//! which wraps the generic `DocumentClient`. Each layer takes the container
//! explicitly; nothing is global.

mod document;
mod ttl;
mod versioned;

pub use document::{DecodedPages, DocumentClient};
pub use ttl::VersionedTtlClient;
pub use versioned::{
    derive_id, VersionedClient, VersionedDocument, VersionedDocumentClient, VersionedKeys,
    VERSION_FIELD,
};
