//! Decode/encode boundary between raw store JSON and typed documents
//!
//! Decoding never coerces:
//! - A value that does not deserialize is `Invalid`
//! - A value that deserializes but fails `Schema::validate` is `Invalid`
//! - Only values passing both steps are `Valid`

use std::fmt;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Validation failure details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationDetails {
    /// Field path (e.g., "payload.status")
    pub field: String,
    /// Expected type or condition
    pub expected: String,
    /// Actual value or type found
    pub actual: String,
}

impl ValidationDetails {
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            expected: "field to be present".into(),
            actual: "missing".into(),
        }
    }

    pub fn type_mismatch(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::new(field, expected, actual)
    }

    /// Builds details from a serde_json failure.
    ///
    /// serde_json reports missing fields as "missing field `name`"; those are
    /// mapped to `missing_field`, everything else is reported against `$root`.
    pub fn from_serde(err: &serde_json::Error) -> Self {
        let message = err.to_string();
        if let Some(rest) = message.strip_prefix("missing field `") {
            if let Some(end) = rest.find('`') {
                return Self::missing_field(&rest[..end]);
            }
        }
        Self::new("$root", "value matching document schema", message)
    }
}

impl fmt::Display for ValidationDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "field '{}': expected {}, got {}", self.field, self.expected, self.actual)
    }
}

/// Non-empty set of validation failures for one value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeErrors(Vec<ValidationDetails>);

impl DecodeErrors {
    pub fn single(details: ValidationDetails) -> Self {
        Self(vec![details])
    }

    pub fn push(&mut self, details: ValidationDetails) {
        self.0.push(details);
    }

    /// Field paths that failed, in reporting order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|d| d.field.as_str())
    }
}

impl fmt::Display for DecodeErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, details) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for DecodeErrors {}

/// Per-item decode result.
///
/// Query pages carry one `Decoded` per raw item so that a single malformed
/// document never aborts the page it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Valid(T),
    Invalid(DecodeErrors),
}

impl<T> Decoded<T> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Decoded::Valid(_))
    }

    pub fn valid(self) -> Option<T> {
        match self {
            Decoded::Valid(doc) => Some(doc),
            Decoded::Invalid(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, DecodeErrors> {
        match self {
            Decoded::Valid(doc) => Ok(doc),
            Decoded::Invalid(errors) => Err(errors),
        }
    }
}

/// A document shape that can cross the store boundary.
///
/// Structural validity comes from serde. `validate` holds refinements serde
/// cannot express (value ranges, cross-field rules). Tagged enum payloads
/// should use `#[serde(tag = "...")]` so the discriminant survives a round trip.
pub trait Schema: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn validate(&self) -> Result<(), DecodeErrors> {
        Ok(())
    }
}

/// Decodes one raw store item.
pub fn decode<T: Schema>(value: Value) -> Decoded<T> {
    match serde_json::from_value::<T>(value) {
        Ok(doc) => match doc.validate() {
            Ok(()) => Decoded::Valid(doc),
            Err(errors) => Decoded::Invalid(errors),
        },
        Err(err) => Decoded::Invalid(DecodeErrors::single(ValidationDetails::from_serde(&err))),
    }
}

/// Validates and encodes a document for submission.
pub fn encode<T: Schema>(doc: &T) -> Result<Value, DecodeErrors> {
    doc.validate()?;
    let value = serde_json::to_value(doc)
        .map_err(|err| DecodeErrors::single(ValidationDetails::from_serde(&err)))?;
    if !value.is_object() {
        return Err(DecodeErrors::single(ValidationDetails::type_mismatch(
            "$root",
            "object",
            json_type_name(&value),
        )));
    }
    Ok(value)
}

/// Returns the JSON type name of a value
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Service {
        name: String,
        max_allowed_payment: u64,
    }

    impl Schema for Service {
        fn validate(&self) -> Result<(), DecodeErrors> {
            if self.max_allowed_payment > 1_000_000 {
                return Err(DecodeErrors::single(ValidationDetails::new(
                    "max_allowed_payment",
                    "at most 1000000",
                    self.max_allowed_payment.to_string(),
                )));
            }
            Ok(())
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
    enum Status {
        Processed { processed_at: i64 },
        Rejected { reason: String },
    }

    impl Schema for Status {}

    #[test]
    fn test_decode_valid() {
        let decoded = decode::<Service>(json!({"name": "svc", "max_allowed_payment": 10}));
        assert!(decoded.is_valid());
    }

    #[test]
    fn test_decode_missing_field_names_field() {
        let decoded = decode::<Service>(json!({"name": "svc"}));
        let errors = decoded.into_result().unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["max_allowed_payment"]);
    }

    #[test]
    fn test_decode_type_mismatch_is_invalid() {
        let decoded = decode::<Service>(json!({"name": "svc", "max_allowed_payment": "ten"}));
        assert!(!decoded.is_valid());
    }

    #[test]
    fn test_decode_runs_refinement() {
        let decoded = decode::<Service>(json!({"name": "svc", "max_allowed_payment": 2_000_000}));
        let errors = decoded.into_result().unwrap_err();
        assert!(errors.to_string().contains("at most 1000000"));
    }

    #[test]
    fn test_tagged_union_discriminant_round_trips() {
        let status = Status::Rejected { reason: "blocked".into() };
        let encoded = encode(&status).unwrap();
        assert_eq!(encoded["kind"], "REJECTED");

        let decoded = decode::<Status>(encoded).valid().unwrap();
        assert_eq!(decoded, status);
    }

    #[test]
    fn test_unknown_discriminant_is_invalid() {
        let decoded = decode::<Status>(json!({"kind": "ACCEPTED"}));
        assert!(!decoded.is_valid());
    }

    #[test]
    fn test_encode_rejects_failed_refinement() {
        let service = Service {
            name: "svc".into(),
            max_allowed_payment: 5_000_000,
        };
        assert!(encode(&service).is_err());
    }

    #[test]
    fn test_decode_errors_display_joins_details() {
        let mut errors = DecodeErrors::single(ValidationDetails::missing_field("a"));
        errors.push(ValidationDetails::missing_field("b"));
        let display = errors.to_string();
        assert!(display.contains("field 'a'"));
        assert!(display.contains("; field 'b'"));
    }
}
