//! `Cache-Control` helpers.
//!
//! The evaluator only ever applies [`no_cache`](CacheControlExt::no_cache),
//! to its own 304 responses. The other directives are for handlers: mark
//! per-user or sensitive payloads with `no_store`, and content-addressed
//! assets with `cache_forever`. A response marked forever is never
//! revalidated, so the evaluator skips it without querying the backend.

use http::header::CACHE_CONTROL;
use http::{HeaderMap, HeaderValue};

/// `no-store, max-age=0`
pub const NO_STORE: HeaderValue = HeaderValue::from_static("no-store, max-age=0");

/// `no-cache`
pub const NO_CACHE: HeaderValue = HeaderValue::from_static("no-cache");

/// `public, max-age=31536000, immutable`
pub const CACHE_FOREVER: HeaderValue =
    HeaderValue::from_static("public, max-age=31536000, immutable");

/// Cache-control directives on a header map.
///
/// # Example
/// ```
/// use http::HeaderMap;
/// use revalid_http::CacheControlExt;
///
/// let mut headers = HeaderMap::new();
/// assert!(!headers.is_immutable());
///
/// headers.cache_forever();
/// assert!(headers.is_immutable());
/// ```
pub trait CacheControlExt {
    /// Appends `no-store, max-age=0`.
    fn no_store(&mut self);

    /// Appends `no-cache`.
    fn no_cache(&mut self);

    /// Appends `public, max-age=31536000, immutable`.
    fn cache_forever(&mut self);

    /// Returns `true` when any `Cache-Control` value carries the `immutable`
    /// directive, in any letter case.
    fn is_immutable(&self) -> bool;
}

impl CacheControlExt for HeaderMap {
    fn no_store(&mut self) {
        self.append(CACHE_CONTROL, NO_STORE);
    }

    fn no_cache(&mut self) {
        self.append(CACHE_CONTROL, NO_CACHE);
    }

    fn cache_forever(&mut self) {
        self.append(CACHE_CONTROL, CACHE_FOREVER);
    }

    fn is_immutable(&self) -> bool {
        self.get_all(CACHE_CONTROL)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(','))
            .any(|directive| directive.trim().eq_ignore_ascii_case("immutable"))
    }
}
