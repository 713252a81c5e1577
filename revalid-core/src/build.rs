//! Build identifier embedded in every validator.

use std::fmt;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use smol_str::SmolStr;

/// Identifies the running build.
///
/// The value is fixed for the lifetime of the process and forms the first
/// segment of every [`ETag`](crate::ETag), so a redeploy invalidates every
/// validator handed out by the previous build even when the data is unchanged.
///
/// # Example
/// ```
/// use revalid_core::BuildId;
///
/// let build = BuildId::new("2024.06.1");
/// assert_eq!(build.as_str(), "2024.06.1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildId(SmolStr);

impl BuildId {
    /// Creates a build identifier from an externally supplied value.
    #[inline]
    pub fn new(value: impl Into<SmolStr>) -> Self {
        Self(value.into())
    }

    /// Derives the identifier from the modification time of the running
    /// executable.
    ///
    /// # Errors
    ///
    /// Returns an error when the executable path or its metadata cannot be read.
    pub fn from_executable() -> io::Result<Self> {
        let exe = std::env::current_exe()?;
        Self::from_file(&exe)
    }

    /// Derives the identifier from the modification time of `path`.
    ///
    /// The value is the UTC modification time in microseconds since the epoch.
    pub fn from_file(path: &Path) -> io::Result<Self> {
        let modified = std::fs::metadata(path)?.modified()?;
        let modified: DateTime<Utc> = modified.into();
        Ok(Self(SmolStr::from(modified.timestamp_micros().to_string())))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BuildId {
    fn from(value: &str) -> Self {
        Self(SmolStr::new(value))
    }
}

impl From<String> for BuildId {
    fn from(value: String) -> Self {
        Self(SmolStr::from(value))
    }
}
