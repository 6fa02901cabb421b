//! Provider construction from configuration

use std::sync::Arc;
use tracing::{debug, info};

use fusion_net::{HttpClient, HttpConfig};

use crate::{
    AbuseIpDbProvider, ApiKeys, CensysProvider, OtxProvider, ProviderError, SharedProvider,
    ShodanProvider, VirusTotalProvider,
};

/// Instantiate every provider whose credentials are present
pub fn build_providers(
    keys: &ApiKeys,
    http_config: &HttpConfig,
) -> Result<Vec<SharedProvider>, ProviderError> {
    let http = HttpClient::new(http_config.clone())?;
    let mut providers: Vec<SharedProvider> = Vec::new();

    if let Some(key) = &keys.virustotal {
        providers.push(Arc::new(VirusTotalProvider::new(key, http.clone())));
    }
    if let Some(key) = &keys.shodan {
        providers.push(Arc::new(ShodanProvider::new(key, http.clone())));
    }
    if let (Some(id), Some(secret)) = (&keys.censys_id, &keys.censys_secret) {
        providers.push(Arc::new(CensysProvider::new(id, secret, http.clone())));
    } else if keys.censys_id.is_some() || keys.censys_secret.is_some() {
        debug!("Censys needs both an API id and secret, skipping");
    }
    if let Some(key) = &keys.otx {
        providers.push(Arc::new(OtxProvider::new(key, http.clone())));
    }
    if let Some(key) = &keys.abuseipdb {
        providers.push(Arc::new(AbuseIpDbProvider::new(key, http)));
    }

    info!(
        "Initialized {} providers: {}",
        providers.len(),
        providers
            .iter()
            .map(|p| p.name().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ABUSEIPDB, CENSYS, OTX, SHODAN, VIRUSTOTAL};

    fn names(providers: &[SharedProvider]) -> Vec<String> {
        providers.iter().map(|p| p.name().to_string()).collect()
    }

    #[test]
    fn test_no_keys_no_providers() {
        let providers = build_providers(&ApiKeys::default(), &HttpConfig::default()).unwrap();
        assert!(providers.is_empty());
    }

    #[test]
    fn test_all_providers() {
        let keys = ApiKeys {
            virustotal: Some("a".to_string()),
            shodan: Some("b".to_string()),
            censys_id: Some("c".to_string()),
            censys_secret: Some("d".to_string()),
            otx: Some("e".to_string()),
            abuseipdb: Some("f".to_string()),
        };
        let providers = build_providers(&keys, &HttpConfig::default()).unwrap();
        assert_eq!(names(&providers), vec![VIRUSTOTAL, SHODAN, CENSYS, OTX, ABUSEIPDB]);
    }

    #[test]
    fn test_missing_keys_are_skipped() {
        let keys = ApiKeys {
            virustotal: Some("a".to_string()),
            abuseipdb: Some("f".to_string()),
            ..Default::default()
        };
        let providers = build_providers(&keys, &HttpConfig::default()).unwrap();
        assert_eq!(names(&providers), vec![VIRUSTOTAL, ABUSEIPDB]);
    }

    #[test]
    fn test_partial_censys_credentials() {
        let keys = ApiKeys {
            censys_id: Some("c".to_string()),
            otx: Some("e".to_string()),
            ..Default::default()
        };
        let providers = build_providers(&keys, &HttpConfig::default()).unwrap();
        assert_eq!(names(&providers), vec![OTX]);
    }
}
