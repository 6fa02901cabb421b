//! Censys provider - host services and certificate transparency

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use fusion_core::{IndicatorType, Payload};
use fusion_net::{HttpClient, HttpError};

use crate::traits::{into_payload, take_array};
use crate::{ProviderError, ThreatIntelProvider};

pub const CENSYS: &str = "Censys";

const BASE_URL: &str = "https://search.censys.io/api/v2";

const MAX_SERVICES: usize = 10;
const MAX_CERTIFICATES: usize = 5;

const SUPPORTED: &[IndicatorType] = &[IndicatorType::IpV4, IndicatorType::Domain];

/// Censys search provider (API id + secret, basic auth)
pub struct CensysProvider {
    api_id: String,
    api_secret: String,
    http: HttpClient,
}

impl CensysProvider {
    pub fn new(api_id: &str, api_secret: &str, http: HttpClient) -> Self {
        Self {
            api_id: api_id.to_string(),
            api_secret: api_secret.to_string(),
            http,
        }
    }

    async fn fetch(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, HttpError> {
        let request = self
            .http
            .client()
            .get(format!("{}/{}", BASE_URL, path))
            .basic_auth(&self.api_id, Some(&self.api_secret))
            .query(query);
        self.http.get_json(request).await
    }
}

#[async_trait]
impl ThreatIntelProvider for CensysProvider {
    fn name(&self) -> &str {
        CENSYS
    }

    fn supported_types(&self) -> &[IndicatorType] {
        SUPPORTED
    }

    fn default_rate_per_minute(&self) -> u32 {
        2
    }

    async fn enrich(
        &self,
        indicator: &str,
        indicator_type: IndicatorType,
    ) -> Result<Payload, ProviderError> {
        let (result, not_found) = match indicator_type {
            IndicatorType::IpV4 => (
                self.fetch(&format!("hosts/{}", indicator), &[])
                    .await
                    .map(|body| normalize_host(&body)),
                "Host not found in Censys database",
            ),
            IndicatorType::Domain => {
                let query = format!("names: {}", indicator);
                let per_page = MAX_CERTIFICATES.to_string();
                (
                    self.fetch(
                        "certificates/search",
                        &[("q", query.as_str()), ("per_page", per_page.as_str())],
                    )
                    .await
                    .map(|body| normalize_certificates(&body)),
                    "No certificates found for domain",
                )
            }
            other => return Err(ProviderError::Unsupported(other)),
        };

        match result {
            Ok(payload) => Ok(payload),
            Err(HttpError::NotFound) => {
                debug!("Censys has no data for {}", indicator);
                Ok(into_payload(json!({"status": "not_found", "message": not_found})))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn normalize_host(body: &Value) -> Payload {
    let result = &body["result"];
    let services: Vec<Value> = take_array(&result["services"], MAX_SERVICES)
        .iter()
        .map(|s| {
            json!({
                "port": s.get("port"),
                "service_name": s.get("service_name"),
                "transport_protocol": s.get("transport_protocol"),
            })
        })
        .collect();
    let location = &result["location"];

    into_payload(json!({
        "ip": result.get("ip"),
        "services": services,
        "location": {
            "country": location.get("country"),
            "city": location.get("city"),
            "coordinates": location.get("coordinates").cloned().unwrap_or_else(|| json!({})),
        },
        "autonomous_system": result.get("autonomous_system").cloned().unwrap_or_else(|| json!({})),
        "last_updated": result.get("last_updated_at"),
    }))
}

fn normalize_certificates(body: &Value) -> Payload {
    let result = &body["result"];
    let certificates: Vec<Value> = take_array(&result["hits"], MAX_CERTIFICATES)
        .iter()
        .map(|hit| {
            let parsed = &hit["parsed"];
            json!({
                "fingerprint": hit.get("fingerprint_sha256"),
                "issuer": parsed["issuer"].get("common_name").cloned().unwrap_or_else(|| json!([])),
                "subject": parsed["subject"].get("common_name").cloned().unwrap_or_else(|| json!([])),
                "validity": parsed.get("validity").cloned().unwrap_or_else(|| json!({})),
                "names": take_array(&parsed["names"], 10),
            })
        })
        .collect();

    into_payload(json!({
        "total_certificates": result["total"].as_u64().unwrap_or(0),
        "certificates": certificates,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        let body = json!({
            "result": {
                "ip": "203.0.113.7",
                "services": [
                    {"port": 445, "service_name": "SMB", "transport_protocol": "TCP"},
                    {"port": 443, "service_name": "HTTP", "transport_protocol": "TCP"}
                ],
                "location": {"country": "Romania", "city": "Bucharest"}
            }
        });

        let payload = normalize_host(&body);
        assert_eq!(payload["ip"], json!("203.0.113.7"));
        assert_eq!(payload["services"][0]["port"], json!(445));
        assert_eq!(payload["location"]["city"], json!("Bucharest"));
        assert_eq!(payload["autonomous_system"], json!({}));
    }

    #[test]
    fn test_normalize_certificates() {
        let body = json!({
            "result": {
                "total": 42,
                "hits": [{
                    "fingerprint_sha256": "abc",
                    "parsed": {
                        "issuer": {"common_name": ["R3"]},
                        "names": ["evil.example", "www.evil.example"]
                    }
                }]
            }
        });

        let payload = normalize_certificates(&body);
        assert_eq!(payload["total_certificates"], json!(42));
        assert_eq!(payload["certificates"][0]["issuer"], json!(["R3"]));
        assert_eq!(payload["certificates"][0]["subject"], json!([]));
    }
}
