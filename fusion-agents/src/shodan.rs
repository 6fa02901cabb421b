//! Shodan provider - exposed services and known vulnerabilities (IPv4 only)

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use fusion_core::{IndicatorType, Payload};
use fusion_net::{HttpClient, HttpError};

use crate::traits::{into_payload, take_array};
use crate::{ProviderError, ThreatIntelProvider};

pub const SHODAN: &str = "Shodan";

const BASE_URL: &str = "https://api.shodan.io";

const MAX_SERVICES: usize = 10;
const MAX_VULNS: usize = 10;
const MAX_BANNER_CHARS: usize = 200;

/// Shodan host intelligence provider
pub struct ShodanProvider {
    api_key: String,
    http: HttpClient,
}

impl ShodanProvider {
    pub fn new(api_key: &str, http: HttpClient) -> Self {
        Self {
            api_key: api_key.to_string(),
            http,
        }
    }
}

#[async_trait]
impl ThreatIntelProvider for ShodanProvider {
    fn name(&self) -> &str {
        SHODAN
    }

    fn supported_types(&self) -> &[IndicatorType] {
        &[IndicatorType::IpV4]
    }

    fn default_rate_per_minute(&self) -> u32 {
        1
    }

    async fn enrich(
        &self,
        indicator: &str,
        indicator_type: IndicatorType,
    ) -> Result<Payload, ProviderError> {
        if indicator_type != IndicatorType::IpV4 {
            return Err(ProviderError::Unsupported(indicator_type));
        }

        let request = self
            .http
            .client()
            .get(format!("{}/shodan/host/{}", BASE_URL, indicator))
            .query(&[("key", self.api_key.as_str())]);

        match self.http.get_json(request).await {
            Ok(body) => Ok(normalize_host(&body)),
            Err(HttpError::NotFound) => {
                debug!("IP not found in Shodan: {}", indicator);
                Ok(into_payload(json!({
                    "status": "not_found",
                    "message": "IP not found in Shodan database",
                })))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Vulnerability identifiers; the API returns either a list or a map keyed by CVE
fn vuln_ids(vulns: &Value) -> Vec<Value> {
    match vulns {
        Value::Array(items) => items.iter().take(MAX_VULNS).cloned().collect(),
        Value::Object(map) => map.keys().take(MAX_VULNS).map(|k| json!(k)).collect(),
        _ => Vec::new(),
    }
}

fn normalize_service(item: &Value) -> Value {
    let banner: String = item["data"]
        .as_str()
        .unwrap_or_default()
        .chars()
        .take(MAX_BANNER_CHARS)
        .collect();

    json!({
        "port": item.get("port"),
        "transport": item.get("transport"),
        "product": item.get("product"),
        "version": item.get("version"),
        "banner": banner,
    })
}

fn normalize_host(body: &Value) -> Payload {
    let services: Vec<Value> = take_array(&body["data"], MAX_SERVICES)
        .iter()
        .map(normalize_service)
        .collect();

    into_payload(json!({
        "hostnames": body.get("hostnames").cloned().unwrap_or_else(|| json!([])),
        "country": body.get("country_name"),
        "country_code": body.get("country_code"),
        "city": body.get("city"),
        "org": body.get("org"),
        "isp": body.get("isp"),
        "asn": body.get("asn"),
        "ports": body.get("ports").cloned().unwrap_or_else(|| json!([])),
        "vulns": vuln_ids(&body["vulns"]),
        "tags": body.get("tags").cloned().unwrap_or_else(|| json!([])),
        "services": services,
        "last_update": body.get("last_update"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        let body = json!({
            "country_name": "Netherlands",
            "org": "Bulletproof Hosting",
            "ports": [22, 80, 3389],
            "vulns": {"CVE-2019-0708": {}, "CVE-2021-44228": {}},
            "data": [
                {"port": 22, "transport": "tcp", "product": "OpenSSH", "data": "SSH-2.0-OpenSSH_7.4"},
                {"port": 3389, "transport": "tcp", "data": "x".repeat(500)}
            ]
        });

        let payload = normalize_host(&body);
        assert_eq!(payload["country"], json!("Netherlands"));
        assert_eq!(payload["vulns"].as_array().unwrap().len(), 2);
        assert_eq!(payload["services"][0]["port"], json!(22));
        assert_eq!(payload["services"][0]["product"], json!("OpenSSH"));
        assert_eq!(
            payload["services"][1]["banner"].as_str().unwrap().len(),
            MAX_BANNER_CHARS
        );
    }

    #[test]
    fn test_vulns_as_list() {
        let ids = vuln_ids(&json!(["CVE-1", "CVE-2"]));
        assert_eq!(ids, vec![json!("CVE-1"), json!("CVE-2")]);
        assert!(vuln_ids(&Value::Null).is_empty());
    }

    #[test]
    fn test_empty_host() {
        let payload = normalize_host(&json!({}));
        assert_eq!(payload["vulns"], json!([]));
        assert_eq!(payload["services"], json!([]));
    }
}
