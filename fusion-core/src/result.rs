//! Per-provider enrichment results and the result set they are collected into

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::time::Duration;

/// Normalized provider payload (opaque to the orchestrator)
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Outcome of a single provider call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Success,
    Error,
}

/// Result from a single provider for one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    /// Provider that produced the result
    pub provider_name: String,
    /// Indicator value that was queried
    pub indicator: String,
    pub status: ProviderStatus,
    /// Normalized provider data (empty on error)
    #[serde(default)]
    pub payload: Payload,
    /// Error description when `status` is `Error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ProviderResult {
    pub fn success(provider_name: &str, indicator: &str, payload: Payload) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            indicator: indicator.to_string(),
            status: ProviderStatus::Success,
            payload,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(provider_name: &str, indicator: &str, message: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.to_string(),
            indicator: indicator.to_string(),
            status: ProviderStatus::Error,
            payload: Payload::new(),
            error_message: Some(message.into()),
            timestamp: Utc::now(),
        }
    }

    /// Error result for a call that did not finish within `limit`
    pub fn timeout(provider_name: &str, indicator: &str, limit: Duration) -> Self {
        Self::error(
            provider_name,
            indicator,
            format!("Provider timeout (>{}s)", format_secs(limit)),
        )
    }

    pub fn is_success(&self) -> bool {
        self.status == ProviderStatus::Success
    }
}

fn format_secs(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{:.2}", secs)
    }
}

/// Summary attached to a result set once orchestration finishes
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultMetadata {
    /// Wall-clock time spent in orchestration
    #[serde(rename = "execution_time", serialize_with = "serialize_secs")]
    pub total_execution_time: Duration,
    /// Number of applicable providers
    pub providers_queried: usize,
    /// Number of providers that returned a success result
    pub providers_succeeded: usize,
}

fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64((d.as_secs_f64() * 100.0).round() / 100.0)
}

/// Provider results for one enrichment request, in completion order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultSet {
    results: Vec<ProviderResult>,
    metadata: ResultMetadata,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. A provider is recorded at most once; later results
    /// for the same provider are discarded and `false` is returned.
    pub fn insert(&mut self, result: ProviderResult) -> bool {
        if self.contains(&result.provider_name) {
            return false;
        }
        self.results.push(result);
        true
    }

    /// Attach final metadata; `providers_succeeded` is derived from the results
    pub fn finalize(mut self, total_execution_time: Duration, providers_queried: usize) -> Self {
        self.metadata = ResultMetadata {
            total_execution_time,
            providers_queried,
            providers_succeeded: self.successful().count(),
        };
        self
    }

    pub fn get(&self, provider_name: &str) -> Option<&ProviderResult> {
        self.results.iter().find(|r| r.provider_name == provider_name)
    }

    pub fn contains(&self, provider_name: &str) -> bool {
        self.get(provider_name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderResult> {
        self.results.iter()
    }

    pub fn successful(&self) -> impl Iterator<Item = &ProviderResult> {
        self.results.iter().filter(|r| r.is_success())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn metadata(&self) -> &ResultMetadata {
        &self.metadata
    }

    /// No provider supported the indicator type
    pub fn no_applicable_providers(&self) -> bool {
        self.metadata.providers_queried == 0
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a ProviderResult;
    type IntoIter = std::slice::Iter<'a, ProviderResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_insert_keeps_first_result() {
        let mut set = ResultSet::new();
        assert!(set.insert(ProviderResult::success("OTX", "8.8.8.8", Payload::new())));
        assert!(!set.insert(ProviderResult::error("OTX", "8.8.8.8", "late")));

        assert_eq!(set.len(), 1);
        assert!(set.get("OTX").unwrap().is_success());
    }

    #[test]
    fn test_finalize_counts_successes() {
        let mut set = ResultSet::new();
        set.insert(ProviderResult::success(
            "VirusTotal",
            "8.8.8.8",
            payload(json!({"detections": 1, "total": 70})),
        ));
        set.insert(ProviderResult::error("Shodan", "8.8.8.8", "HTTP 500"));
        set.insert(ProviderResult::timeout("Censys", "8.8.8.8", Duration::from_secs(5)));

        let set = set.finalize(Duration::from_millis(1234), 3);
        assert_eq!(set.metadata().providers_queried, 3);
        assert_eq!(set.metadata().providers_succeeded, 1);
        assert!(!set.no_applicable_providers());

        // completion order is preserved
        let names: Vec<_> = set.iter().map(|r| r.provider_name.as_str()).collect();
        assert_eq!(names, vec!["VirusTotal", "Shodan", "Censys"]);
    }

    #[test]
    fn test_timeout_message() {
        let result = ProviderResult::timeout("Shodan", "1.2.3.4", Duration::from_secs(5));
        assert!(!result.is_success());
        assert!(result.error_message.unwrap().contains("timeout (>5s)"));
    }

    #[test]
    fn test_empty_set_has_no_applicable_providers() {
        let set = ResultSet::new().finalize(Duration::ZERO, 0);
        assert!(set.is_empty());
        assert!(set.no_applicable_providers());
    }

    #[test]
    fn test_serialized_metadata() {
        let set = ResultSet::new().finalize(Duration::from_millis(1500), 0);
        let value = serde_json::to_value(&set).unwrap();
        assert_eq!(value["metadata"]["execution_time"], json!(1.5));
        assert_eq!(value["metadata"]["providers_queried"], json!(0));
    }
}
