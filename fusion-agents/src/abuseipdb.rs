//! AbuseIPDB provider - IP abuse reports and confidence score

use async_trait::async_trait;
use serde_json::{json, Value};

use fusion_core::{IndicatorType, Payload};
use fusion_net::HttpClient;

use crate::traits::into_payload;
use crate::{ProviderError, ThreatIntelProvider};

pub const ABUSEIPDB: &str = "AbuseIPDB";

const BASE_URL: &str = "https://api.abuseipdb.com/api/v2";

/// Report window queried
const MAX_AGE_DAYS: u32 = 90;

const SUPPORTED: &[IndicatorType] = &[IndicatorType::IpV4, IndicatorType::IpV6];

/// AbuseIPDB IP reputation provider
pub struct AbuseIpDbProvider {
    api_key: String,
    http: HttpClient,
}

impl AbuseIpDbProvider {
    pub fn new(api_key: &str, http: HttpClient) -> Self {
        Self {
            api_key: api_key.to_string(),
            http,
        }
    }
}

#[async_trait]
impl ThreatIntelProvider for AbuseIpDbProvider {
    fn name(&self) -> &str {
        ABUSEIPDB
    }

    fn supported_types(&self) -> &[IndicatorType] {
        SUPPORTED
    }

    fn default_rate_per_minute(&self) -> u32 {
        // 1000/day free tier
        16
    }

    async fn enrich(
        &self,
        indicator: &str,
        indicator_type: IndicatorType,
    ) -> Result<Payload, ProviderError> {
        if !indicator_type.is_ip() {
            return Err(ProviderError::Unsupported(indicator_type));
        }

        let max_age = MAX_AGE_DAYS.to_string();
        let request = self
            .http
            .client()
            .get(format!("{}/check", BASE_URL))
            .header("Key", &self.api_key)
            .header("Accept", "application/json")
            .query(&[
                ("ipAddress", indicator),
                ("maxAgeInDays", max_age.as_str()),
                ("verbose", "true"),
            ]);

        let body = self.http.get_json(request).await?;
        normalize_check(&body)
    }
}

fn normalize_check(body: &Value) -> Result<Payload, ProviderError> {
    let data = body
        .get("data")
        .ok_or_else(|| ProviderError::Parse("missing data".to_string()))?;

    Ok(into_payload(json!({
        "abuse_confidence_score": data["abuseConfidenceScore"].as_u64().unwrap_or(0),
        "country_code": data.get("countryCode"),
        "country_name": data.get("countryName"),
        "usage_type": data.get("usageType"),
        "isp": data.get("isp"),
        "domain": data.get("domain"),
        "total_reports": data["totalReports"].as_u64().unwrap_or(0),
        "num_distinct_users": data["numDistinctUsers"].as_u64().unwrap_or(0),
        "last_reported_at": data.get("lastReportedAt"),
        "is_public": data["isPublic"].as_bool().unwrap_or(true),
        "is_whitelisted": data["isWhitelisted"].as_bool().unwrap_or(false),
        "is_tor": data["isTor"].as_bool().unwrap_or(false),
    })))
}
