//! Observable events at the store boundary
//!
//! Every log line emitted by the clients carries one of these names in its
//! `event` field, so log queries never depend on message wording.

use std::fmt;

/// Store-boundary events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    ConfigLoaded,

    // Single-document operations
    DocumentCreate,
    DocumentUpsert,
    DocumentRead,
    /// Point read answered 404
    DocumentNotFound,

    // Queries
    QueryPage,

    // Versioning
    VersionCreate,
    /// Another writer took the next version first
    VersionConflict,

    // TTL propagation
    TtlUpdateBegin,
    TtlBatchCommit,
    TtlBatchFailed,
    TtlUpdateComplete,

    // Failures
    /// Item skipped or rejected by schema validation
    DecodeFailed,
    /// Store or transport failure
    ErrorResponse,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::DocumentCreate => "DOCUMENT_CREATE",
            Event::DocumentUpsert => "DOCUMENT_UPSERT",
            Event::DocumentRead => "DOCUMENT_READ",
            Event::DocumentNotFound => "DOCUMENT_NOT_FOUND",

            Event::QueryPage => "QUERY_PAGE",

            Event::VersionCreate => "VERSION_CREATE",
            Event::VersionConflict => "VERSION_CONFLICT",

            Event::TtlUpdateBegin => "TTL_UPDATE_BEGIN",
            Event::TtlBatchCommit => "TTL_BATCH_COMMIT",
            Event::TtlBatchFailed => "TTL_BATCH_FAILED",
            Event::TtlUpdateComplete => "TTL_UPDATE_COMPLETE",

            Event::DecodeFailed => "DECODE_FAILED",
            Event::ErrorResponse => "STORE_ERROR_RESPONSE",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [Event; 14] = [
        Event::ConfigLoaded,
        Event::DocumentCreate,
        Event::DocumentUpsert,
        Event::DocumentRead,
        Event::DocumentNotFound,
        Event::QueryPage,
        Event::VersionCreate,
        Event::VersionConflict,
        Event::TtlUpdateBegin,
        Event::TtlBatchCommit,
        Event::TtlBatchFailed,
        Event::TtlUpdateComplete,
        Event::DecodeFailed,
        Event::ErrorResponse,
    ];

    #[test]
    fn test_event_names_are_unique_upper_snake() {
        let names: HashSet<&str> = ALL.iter().map(Event::as_str).collect();
        assert_eq!(names.len(), ALL.len());
        for name in names {
            assert!(name.chars().all(|c| c.is_ascii_uppercase() || c == '_'), "{}", name);
        }
    }

    #[test]
    fn test_display_matches_name() {
        assert_eq!(Event::ErrorResponse.to_string(), "STORE_ERROR_RESPONSE");
    }
}
