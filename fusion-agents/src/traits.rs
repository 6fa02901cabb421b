//! Common traits for threat intelligence providers

use async_trait::async_trait;
use fusion_core::{IndicatorType, Payload};
use fusion_net::HttpError;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors from provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] HttpError),

    #[error("Unexpected response: {0}")]
    Parse(String),

    #[error("Unsupported indicator type: {0}")]
    Unsupported(IndicatorType),
}

/// Common interface for all threat intelligence providers
#[async_trait]
pub trait ThreatIntelProvider: Send + Sync {
    /// Provider identity, also used as the rate limiter key
    fn name(&self) -> &str;

    /// Indicator types this provider understands (empty = all)
    fn supported_types(&self) -> &[IndicatorType];

    fn supports(&self, indicator_type: IndicatorType) -> bool {
        let supported = self.supported_types();
        supported.is_empty() || supported.contains(&indicator_type)
    }

    /// Requests per minute allowed when no override is configured
    fn default_rate_per_minute(&self) -> u32;

    /// Query the provider and return a normalized payload
    async fn enrich(
        &self,
        indicator: &str,
        indicator_type: IndicatorType,
    ) -> Result<Payload, ProviderError>;
}

/// Provider handle shared across orchestration tasks
pub type SharedProvider = Arc<dyn ThreatIntelProvider>;

/// Convert a JSON object literal into a payload
pub(crate) fn into_payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// First `n` elements of a JSON array field (empty if absent)
pub(crate) fn take_array(value: &Value, n: usize) -> Vec<Value> {
    value
        .as_array()
        .map(|items| items.iter().take(n).cloned().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct HashOnly;

    #[async_trait]
    impl ThreatIntelProvider for HashOnly {
        fn name(&self) -> &str {
            "hash-only"
        }

        fn supported_types(&self) -> &[IndicatorType] {
            &[IndicatorType::HashMd5, IndicatorType::HashSha256]
        }

        fn default_rate_per_minute(&self) -> u32 {
            1
        }

        async fn enrich(&self, _: &str, t: IndicatorType) -> Result<Payload, ProviderError> {
            Err(ProviderError::Unsupported(t))
        }
    }

    struct Everything;

    #[async_trait]
    impl ThreatIntelProvider for Everything {
        fn name(&self) -> &str {
            "everything"
        }

        fn supported_types(&self) -> &[IndicatorType] {
            &[]
        }

        fn default_rate_per_minute(&self) -> u32 {
            1
        }

        async fn enrich(&self, _: &str, _: IndicatorType) -> Result<Payload, ProviderError> {
            Ok(Payload::new())
        }
    }

    #[test]
    fn test_supports() {
        assert!(HashOnly.supports(IndicatorType::HashMd5));
        assert!(!HashOnly.supports(IndicatorType::IpV4));
        for t in IndicatorType::ALL {
            assert!(Everything.supports(t));
        }
    }

    #[test]
    fn test_payload_helpers() {
        assert!(into_payload(json!([1, 2])).is_empty());
        assert_eq!(into_payload(json!({"a": 1}))["a"], json!(1));
        assert_eq!(take_array(&json!([1, 2, 3]), 2), vec![json!(1), json!(2)]);
        assert!(take_array(&json!(null), 2).is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::Unsupported(IndicatorType::Email);
        assert_eq!(err.to_string(), "Unsupported indicator type: email");
    }
}
