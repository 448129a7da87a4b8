//! Document model layer
//!
//! Typed shapes for documents before and after persistence, the scalar types
//! they are built from, and the explicit decode step between raw store JSON
//! and those shapes.

mod codec;
mod document;
mod types;

pub use codec::{decode, encode, json_type_name, Decoded, DecodeErrors, Schema, ValidationDetails};
pub use document::{Identified, NewDocument, ResourceMeta, RetrievedDocument, SearchKey, Versioned};
pub use types::{EmptyString, InvalidTtl, NonEmptyString, Ttl};
