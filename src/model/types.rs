//! Scalar types shared by every document shape

use std::fmt;
use std::num::NonZeroU32;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raised when an empty string is used where an identity is required
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("string must not be empty")]
pub struct EmptyString;

/// A string guaranteed to contain at least one character.
///
/// Document ids, logical model ids and partition keys are all `NonEmptyString`,
/// so a malformed search key cannot be built in the first place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

impl NonEmptyString {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyString> {
        let value = value.into();
        if value.is_empty() {
            Err(EmptyString)
        } else {
            Ok(Self(value))
        }
    }

    /// Wraps a string the caller has already proven non-empty.
    pub(crate) fn from_nonempty(value: String) -> Self {
        debug_assert!(!value.is_empty());
        Self(value)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyString;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyString;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonEmptyString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raised for TTL values the store would not accept
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid ttl '{0}': expected a positive number of seconds or -1 (never)")]
pub struct InvalidTtl(pub String);

/// Per-document time to live.
///
/// Encoded as a positive integer number of seconds, or `-1` for "never
/// expire". A document without a `ttl` field has no TTL set, which is not the
/// same as any `Ttl` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Ttl {
    Seconds(NonZeroU32),
    Never,
}

impl Ttl {
    /// Wire value of `Ttl::Never`
    pub const NEVER_SENTINEL: i64 = -1;

    /// Largest accepted number of seconds (the store stores TTL as int32)
    pub const MAX_SECONDS: u32 = i32::MAX as u32;

    pub fn seconds(seconds: u32) -> Result<Self, InvalidTtl> {
        match NonZeroU32::new(seconds) {
            Some(n) if seconds <= Self::MAX_SECONDS => Ok(Ttl::Seconds(n)),
            _ => Err(InvalidTtl(seconds.to_string())),
        }
    }

    pub fn as_i64(&self) -> i64 {
        match self {
            Ttl::Seconds(n) => i64::from(n.get()),
            Ttl::Never => Self::NEVER_SENTINEL,
        }
    }
}

impl TryFrom<i64> for Ttl {
    type Error = InvalidTtl;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == Self::NEVER_SENTINEL {
            return Ok(Ttl::Never);
        }
        u32::try_from(value)
            .map_err(|_| InvalidTtl(value.to_string()))
            .and_then(Ttl::seconds)
    }
}

impl From<Ttl> for i64 {
    fn from(ttl: Ttl) -> Self {
        ttl.as_i64()
    }
}

impl FromStr for Ttl {
    type Err = InvalidTtl;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("never") {
            return Ok(Ttl::Never);
        }
        let value: i64 = s.trim().parse().map_err(|_| InvalidTtl(s.to_string()))?;
        Ttl::try_from(value)
    }
}

impl fmt::Display for Ttl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ttl::Seconds(n) => write!(f, "{}s", n),
            Ttl::Never => write!(f, "never"),
        }
    }
}
