//! Composite entity tag.
//!
//! The validator has the shape `"<build>-<token>[-<suffix>]"`, always in
//! HTTP quoted-string form. Same build, same token and same suffix give
//! byte-identical tags; the whole scheme relies on that.
//!
//! Backend tokens are strong validators, so comparison against
//! `If-None-Match` is plain string equality. Weak (`W/`) validators and
//! validator lists are never matched.

use std::fmt;

use http::HeaderValue;
use http::header::InvalidHeaderValue;

use crate::{BuildId, FreshnessToken};

/// A strong entity tag built from a build id, a freshness token and an
/// optional caller suffix.
///
/// # Example
/// ```
/// use revalid_core::{BuildId, ETag, FreshnessToken};
///
/// let build = BuildId::new("638");
/// let token = FreshnessToken::new("1042");
///
/// let plain = ETag::build(&build, &token, None);
/// assert_eq!(plain.as_str(), "\"638-1042\"");
///
/// let scoped = ETag::build(&build, &token, Some("tenant-7"));
/// assert_eq!(scoped.as_str(), "\"638-1042-tenant-7\"");
/// assert!(scoped.matches("\"638-1042-tenant-7\""));
/// assert!(!scoped.matches("W/\"638-1042-tenant-7\""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ETag(String);

impl ETag {
    /// Builds the quoted validator, omitting the suffix segment when absent.
    pub fn build(build: &BuildId, token: &FreshnessToken, suffix: Option<&str>) -> Self {
        let value = match suffix {
            Some(suffix) => format!("\"{}-{}-{}\"", build, token, suffix),
            None => format!("\"{}-{}\"", build, token),
        };
        Self(value)
    }

    /// Compares against a raw `If-None-Match` value.
    #[inline]
    pub fn matches(&self, if_none_match: &str) -> bool {
        self.0 == if_none_match
    }

    /// Extracts the token segment, given the build id and suffix the tag was
    /// built with.
    ///
    /// Returns `None` when the tag was not built from `build` and `suffix`.
    pub fn token_segment(&self, build: &BuildId, suffix: Option<&str>) -> Option<&str> {
        let inner = self.0.strip_prefix('"')?.strip_suffix('"')?;
        let rest = inner.strip_prefix(build.as_str())?.strip_prefix('-')?;
        match suffix {
            Some(suffix) => rest.strip_suffix(suffix)?.strip_suffix('-'),
            None => Some(rest),
        }
    }

    /// Returns the quoted validator.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Converts the validator into a header value.
    ///
    /// # Errors
    ///
    /// Fails when the token or suffix contain bytes not allowed in a header.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.0)
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for ETag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
