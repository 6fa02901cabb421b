//! AlienVault OTX provider - community threat intelligence pulses

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use fusion_core::{IndicatorType, Payload};
use fusion_net::{HttpClient, HttpError};

use crate::traits::{into_payload, take_array};
use crate::{ProviderError, ThreatIntelProvider};

pub const OTX: &str = "OTX";

const BASE_URL: &str = "https://otx.alienvault.com/api/v1";

/// Pulses kept in the payload
const MAX_PULSES: usize = 10;

/// AlienVault OTX provider (supports every indicator type)
pub struct OtxProvider {
    api_key: String,
    http: HttpClient,
}

impl OtxProvider {
    pub fn new(api_key: &str, http: HttpClient) -> Self {
        Self {
            api_key: api_key.to_string(),
            http,
        }
    }
}

/// OTX indicator section for an indicator type
pub fn section(indicator_type: IndicatorType) -> &'static str {
    match indicator_type {
        IndicatorType::HashMd5 | IndicatorType::HashSha1 | IndicatorType::HashSha256 => "file",
        IndicatorType::IpV4 => "IPv4",
        IndicatorType::IpV6 => "IPv6",
        IndicatorType::Domain => "domain",
        IndicatorType::Url => "url",
        IndicatorType::Email => "email",
    }
}

#[async_trait]
impl ThreatIntelProvider for OtxProvider {
    fn name(&self) -> &str {
        OTX
    }

    fn supported_types(&self) -> &[IndicatorType] {
        &[]
    }

    fn default_rate_per_minute(&self) -> u32 {
        10
    }

    async fn enrich(
        &self,
        indicator: &str,
        indicator_type: IndicatorType,
    ) -> Result<Payload, ProviderError> {
        let section = section(indicator_type);
        let request = self
            .http
            .client()
            .get(format!("{}/indicators/{}/{}/general", BASE_URL, section, indicator))
            .header("X-OTX-API-KEY", &self.api_key);

        match self.http.get_json(request).await {
            Ok(body) => Ok(normalize_general(&body, section)),
            Err(HttpError::NotFound) => {
                debug!("No OTX data for {}", indicator);
                Ok(empty_payload())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn normalize_pulse(pulse: &Value) -> Value {
    json!({
        "name": pulse.get("name"),
        "created": pulse.get("created"),
        "modified": pulse.get("modified"),
        "author": pulse.get("author_name"),
        "tags": take_array(&pulse["tags"], 5),
        "adversary": pulse.get("adversary"),
        "targeted_countries": take_array(&pulse["targeted_countries"], 5),
        "malware_families": take_array(&pulse["malware_families"], 5),
        "attack_ids": take_array(&pulse["attack_ids"], 5),
    })
}

fn normalize_general(body: &Value, section: &str) -> Payload {
    let pulse_info = &body["pulse_info"];
    let pulse_count = pulse_info["count"].as_u64().unwrap_or(0);
    let pulses: Vec<Value> = take_array(&pulse_info["pulses"], MAX_PULSES)
        .iter()
        .map(normalize_pulse)
        .collect();

    into_payload(json!({
        "pulse_count": pulse_count,
        "pulses": pulses,
        "validation": take_array(&body["validation"], 5),
        "indicator_type": section,
        "has_threat_intel": pulse_count > 0,
    }))
}

fn empty_payload() -> Payload {
    into_payload(json!({
        "pulse_count": 0,
        "pulses": [],
        "has_threat_intel": false,
        "message": "No threat intelligence found for indicator",
    }))
}
