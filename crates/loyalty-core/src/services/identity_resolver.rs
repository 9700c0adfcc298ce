// ============================================================================
// Loyalty Core - Identity Resolver
// File: crates/loyalty-core/src/services/identity_resolver.rs
// ============================================================================
//! Decodes a scanned payload (scan URL or bare identifier) into a customer key.

use regex::Regex;
use url::Url;

use loyalty_shared::constants::{CANONICAL_UUID_PATTERN, DEFAULT_IDENTITY_QUERY_PARAM};

use crate::domain::CustomerKey;
use crate::error::DomainError;

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    query_param: String,
    shape: Regex,
}

impl IdentityResolver {
    pub fn new(query_param: &str, identifier_pattern: &str) -> Result<Self, DomainError> {
        let query_param = query_param.trim();
        if query_param.is_empty() {
            return Err(DomainError::ConfigurationError("identity query parameter must not be empty".into()));
        }
        let shape = Regex::new(identifier_pattern).map_err(|e| {
            DomainError::ConfigurationError(format!("invalid identifier pattern: {}", e))
        })?;
        Ok(Self { query_param: query_param.to_string(), shape })
    }

    /// `?customer=<key>` links and canonical UUID keys.
    pub fn with_defaults() -> Result<Self, DomainError> {
        Self::new(DEFAULT_IDENTITY_QUERY_PARAM, CANONICAL_UUID_PATTERN)
    }

    /// URL parameter first, then the bare identifier shape. `None` means not found.
    pub fn resolve(&self, payload: &str) -> Option<CustomerKey> {
        let payload = payload.trim();
        if payload.is_empty() {
            return None;
        }
        self.from_url(payload).or_else(|| self.from_shape(payload))
    }

    /// Scan link for a customer, the inverse of [`IdentityResolver::resolve`].
    pub fn scan_link(&self, base_url: &str, key: &CustomerKey) -> Result<String, DomainError> {
        let mut url = Url::parse(base_url)
            .map_err(|e| DomainError::ConfigurationError(format!("invalid scan base url {}: {}", base_url, e)))?;
        url.query_pairs_mut().append_pair(&self.query_param, key.as_str());
        Ok(url.to_string())
    }

    fn from_url(&self, payload: &str) -> Option<CustomerKey> {
        let url = Url::parse(payload).ok()?;
        url.query_pairs()
            .find(|(name, _)| name == self.query_param.as_str())
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(CustomerKey::new)
    }

    fn from_shape(&self, payload: &str) -> Option<CustomerKey> {
        self.shape.is_match(payload).then(|| CustomerKey::new(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_keys() -> IdentityResolver {
        IdentityResolver::new("customer", r"^[a-z]+[0-9]+$").unwrap()
    }

    #[test]
    fn test_resolves_url_parameter() {
        let resolver = short_keys();
        assert_eq!(
            resolver.resolve("https://x/y?customer=abc123"),
            Some(CustomerKey::from("abc123"))
        );
    }

    #[test]
    fn test_url_parameter_wins_over_shape() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        assert_eq!(
            resolver.resolve("https://shop.example/scan?ref=qr&customer=not-a-uuid"),
            Some(CustomerKey::from("not-a-uuid"))
        );
    }

    #[test]
    fn test_resolves_bare_identifier() {
        assert_eq!(short_keys().resolve("  abc123 "), Some(CustomerKey::from("abc123")));

        let uuid = "3F2504E0-4F89-11D3-9A0C-0305E82C3301";
        assert_eq!(
            IdentityResolver::with_defaults().unwrap().resolve(uuid),
            Some(CustomerKey::from(uuid))
        );
    }

    #[test]
    fn test_garbage_is_not_found() {
        let resolver = short_keys();
        assert_eq!(resolver.resolve("garbage"), None);
        assert_eq!(resolver.resolve(""), None);
        assert_eq!(resolver.resolve("https://x/y?other=abc123"), None);
        assert_eq!(resolver.resolve("https://x/y?customer="), None);

        let defaults = IdentityResolver::with_defaults().unwrap();
        assert_eq!(defaults.resolve("abc123"), None);
        assert_eq!(defaults.resolve("3f2504e0-4f89-11d3-9a0c-0305e82c330"), None);
    }

    #[test]
    fn test_url_without_parameter_falls_back_to_shape() {
        let resolver = IdentityResolver::new("customer", r"^loyalty:[a-z0-9]+$").unwrap();
        assert_eq!(resolver.resolve("loyalty:abc123"), Some(CustomerKey::from("loyalty:abc123")));
    }

    #[test]
    fn test_scan_link_round_trips() {
        let resolver = IdentityResolver::with_defaults().unwrap();
        let key = CustomerKey::generate();
        let link = resolver.scan_link("https://loyalty.example.com/scan", &key).unwrap();
        assert_eq!(resolver.resolve(&link), Some(key));
    }

    #[test]
    fn test_rejects_bad_configuration() {
        assert!(matches!(IdentityResolver::new("customer", "(unclosed"), Err(DomainError::ConfigurationError(_))));
        assert!(matches!(IdentityResolver::new(" ", ".*"), Err(DomainError::ConfigurationError(_))));
    }
}
