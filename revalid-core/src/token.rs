//! Freshness token type.
//!
//! A [`FreshnessToken`] summarizes a backend's write state at the moment it
//! was read. Two reads with no committed write in between produce equal
//! tokens; a committed write the strategy observes produces a different one.
//!
//! Tokens carry no ordering. They are compared for equality only, and only
//! against tokens produced by the same strategy.

use std::fmt;

/// Opaque marker of a backend's last observed write.
///
/// The empty token is a valid value: strategies reading from a log return it
/// while the log has no qualifying entry yet. It is equal only to itself.
///
/// # Example
/// ```
/// use revalid_core::FreshnessToken;
///
/// let first = FreshnessToken::new("0x00000000000007D1");
/// let second = FreshnessToken::new("0x00000000000007D1");
/// assert_eq!(first, second);
/// assert_ne!(first, FreshnessToken::empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FreshnessToken(String);

impl FreshnessToken {
    /// Sentinel returned when the backend feature a strategy reads from is
    /// switched off, so it never collides with the empty-log token.
    pub const UNAVAILABLE: &'static str = "unavailable";

    /// Creates a token from a backend-produced value.
    #[inline]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The token read from a log with no qualifying entries.
    #[inline]
    pub fn empty() -> Self {
        Self(String::new())
    }

    /// The token signalling that the underlying feature is disabled.
    #[inline]
    pub fn unavailable() -> Self {
        Self(Self::UNAVAILABLE.to_owned())
    }

    /// Returns `true` for the empty-log token.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the token as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the token, returning the inner string.
    #[inline]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for FreshnessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for FreshnessToken {
    #[inline]
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for FreshnessToken {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl AsRef<str> for FreshnessToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
