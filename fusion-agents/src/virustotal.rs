//! VirusTotal provider - multi-engine malware detection ratios
//!
//! Queries the v3 API for file hashes, IPv4 addresses, domains and URLs.
//! The normalized payload always carries `detections` and `total`, which
//! feed the malware-detection component of the risk score.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde_json::{json, Value};
use tracing::debug;

use fusion_core::{IndicatorType, Payload};
use fusion_net::{HttpClient, HttpError};

use crate::traits::{into_payload, take_array};
use crate::{ProviderError, ThreatIntelProvider};

pub const VIRUSTOTAL: &str = "VirusTotal";

const BASE_URL: &str = "https://www.virustotal.com/api/v3";

const SUPPORTED: &[IndicatorType] = &[
    IndicatorType::HashMd5,
    IndicatorType::HashSha1,
    IndicatorType::HashSha256,
    IndicatorType::IpV4,
    IndicatorType::Domain,
    IndicatorType::Url,
];

/// VirusTotal threat intelligence provider
pub struct VirusTotalProvider {
    api_key: String,
    http: HttpClient,
}

impl VirusTotalProvider {
    pub fn new(api_key: &str, http: HttpClient) -> Self {
        Self {
            api_key: api_key.to_string(),
            http,
        }
    }

    async fn fetch(&self, path: &str) -> Result<Value, HttpError> {
        let request = self
            .http
            .client()
            .get(format!("{}/{}", BASE_URL, path))
            .header("x-apikey", &self.api_key);
        self.http.get_json(request).await
    }
}

#[async_trait]
impl ThreatIntelProvider for VirusTotalProvider {
    fn name(&self) -> &str {
        VIRUSTOTAL
    }

    fn supported_types(&self) -> &[IndicatorType] {
        SUPPORTED
    }

    fn default_rate_per_minute(&self) -> u32 {
        // 500/day public quota
        4
    }

    async fn enrich(
        &self,
        indicator: &str,
        indicator_type: IndicatorType,
    ) -> Result<Payload, ProviderError> {
        match indicator_type {
            t if t.is_hash() => match self.fetch(&format!("files/{}", indicator)).await {
                Ok(body) => normalize_file(&body),
                Err(HttpError::NotFound) => {
                    debug!("Hash not found in VirusTotal: {}", indicator);
                    Ok(not_found_payload())
                }
                Err(e) => Err(e.into()),
            },
            IndicatorType::IpV4 => {
                let body = self.fetch(&format!("ip_addresses/{}", indicator)).await?;
                normalize_ip(&body)
            }
            IndicatorType::Domain => {
                let body = self.fetch(&format!("domains/{}", indicator)).await?;
                normalize_domain(&body)
            }
            IndicatorType::Url => {
                let body = self.fetch(&format!("urls/{}", url_id(indicator))).await?;
                normalize_url(&body)
            }
            other => Err(ProviderError::Unsupported(other)),
        }
    }
}

/// URL identifier: unpadded URL-safe base64 of the URL
pub fn url_id(url: &str) -> String {
    URL_SAFE_NO_PAD.encode(url.as_bytes())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct AnalysisStats {
    malicious: u64,
    suspicious: u64,
    undetected: u64,
    total: u64,
}

fn attributes(body: &Value) -> Result<&Value, ProviderError> {
    body.pointer("/data/attributes")
        .ok_or_else(|| ProviderError::Parse("missing data.attributes".to_string()))
}

fn analysis_stats(attrs: &Value) -> AnalysisStats {
    let Some(stats) = attrs.get("last_analysis_stats").and_then(Value::as_object) else {
        return AnalysisStats::default();
    };
    let count = |key: &str| stats.get(key).and_then(Value::as_u64).unwrap_or(0);

    AnalysisStats {
        malicious: count("malicious"),
        suspicious: count("suspicious"),
        undetected: count("undetected"),
        total: stats.values().filter_map(Value::as_u64).sum(),
    }
}

fn detection_fields(stats: &AnalysisStats) -> Value {
    json!({
        "detections": stats.malicious,
        "suspicious": stats.suspicious,
        "total": stats.total,
        "detection_ratio": format!("{}/{}", stats.malicious, stats.total),
    })
}

fn merge(base: Value, extra: Value) -> Payload {
    let mut payload = into_payload(base);
    payload.extend(into_payload(extra));
    payload
}

fn not_found_payload() -> Payload {
    into_payload(json!({
        "detections": 0,
        "total": 0,
        "status": "not_found",
        "message": "Hash not found in VirusTotal database",
    }))
}

fn normalize_file(body: &Value) -> Result<Payload, ProviderError> {
    let attrs = attributes(body)?;
    let stats = analysis_stats(attrs);

    Ok(merge(
        detection_fields(&stats),
        json!({
            "undetected": stats.undetected,
            "names": take_array(&attrs["names"], 5),
            "first_seen": attrs.get("first_submission_date"),
            "last_analyzed": attrs.get("last_analysis_date"),
            "file_type": attrs.get("type_description"),
            "size": attrs.get("size"),
            "md5": attrs.get("md5"),
            "sha1": attrs.get("sha1"),
            "sha256": attrs.get("sha256"),
        }),
    ))
}

fn normalize_ip(body: &Value) -> Result<Payload, ProviderError> {
    let attrs = attributes(body)?;
    let stats = analysis_stats(attrs);

    Ok(merge(
        detection_fields(&stats),
        json!({
            "country": attrs.get("country"),
            "asn": attrs.get("asn"),
            "as_owner": attrs.get("as_owner"),
            "network": attrs.get("network"),
        }),
    ))
}

fn normalize_domain(body: &Value) -> Result<Payload, ProviderError> {
    let attrs = attributes(body)?;
    let stats = analysis_stats(attrs);

    Ok(merge(
        detection_fields(&stats),
        json!({
            "categories": attrs.get("categories").cloned().unwrap_or_else(|| json!({})),
            "creation_date": attrs.get("creation_date"),
            "registrar": attrs.get("registrar"),
        }),
    ))
}

fn normalize_url(body: &Value) -> Result<Payload, ProviderError> {
    let attrs = attributes(body)?;
    Ok(into_payload(detection_fields(&analysis_stats(attrs))))
}
