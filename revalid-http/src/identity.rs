use http::request::Parts;
use smol_str::SmolStr;

/// A verified caller identity.
///
/// Authentication layers insert it into the request extensions once the
/// caller is verified. A request without one is anonymous.
///
/// # Example
/// ```
/// use revalid_http::Principal;
///
/// let mut request = http::Request::new(());
/// request
///     .extensions_mut()
///     .insert(Principal::new("alice").with_claim("tenant", "7"));
///
/// let (parts, _) = request.into_parts();
/// let principal = Principal::from_request(&parts).unwrap();
/// assert_eq!(principal.name(), "alice");
/// assert_eq!(principal.claim("tenant"), Some("7"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    name: SmolStr,
    claims: Vec<(SmolStr, SmolStr)>,
}

impl Principal {
    /// Creates an identity without claims.
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            claims: Vec::new(),
        }
    }

    /// Adds a claim.
    pub fn with_claim(mut self, kind: impl Into<SmolStr>, value: impl Into<SmolStr>) -> Self {
        self.claims.push((kind.into(), value.into()));
        self
    }

    /// The identity's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// First claim value of `kind`.
    pub fn claim(&self, kind: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, value)| value.as_str())
    }

    /// All claims, in insertion order.
    pub fn claims(&self) -> impl Iterator<Item = (&str, &str)> {
        self.claims.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Identity attached to `request`, if any.
    pub fn from_request(request: &Parts) -> Option<&Principal> {
        request.extensions.get::<Principal>()
    }
}
