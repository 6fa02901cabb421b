//! Risk Fusion Engine
//!
//! Folds a result set into one 0-10 score. Each source role contributes a
//! bounded number of points:
//!
//! | Role                    | Default source | Max  |
//! |-------------------------|----------------|------|
//! | Malware detection       | VirusTotal     | 5.0  |
//! | Community pulses        | OTX            | 2.0  |
//! | Exposed vulnerabilities | Shodan         | 2.0  |
//! | Abuse confidence        | AbuseIPDB      | 1.0  |
//! | Infrastructure exposure | Censys         | 0.5  |
//!
//! Sources that are absent, failed, or returned an empty payload contribute
//! nothing. Malformed payload fields read as zero.

use serde_json::Value;
use tracing::debug;

use fusion_agents::{ABUSEIPDB, CENSYS, OTX, SHODAN, VIRUSTOTAL};
use fusion_core::{round_to, Payload, ResultSet, RiskScore, ScoreComponent};

/// Ports that count as suspicious infrastructure exposure
pub const SUSPICIOUS_PORTS: [u64; 4] = [22, 23, 3389, 445];

/// Contribution category a provider fills in the fused score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceRole {
    MalwareDetection,
    CommunityPulse,
    ExposedVulnerability,
    AbuseConfidence,
    InfrastructureExposure,
}

impl SourceRole {
    /// Fixed evaluation order; also the order of score components
    pub const ORDER: [SourceRole; 5] = [
        SourceRole::MalwareDetection,
        SourceRole::CommunityPulse,
        SourceRole::ExposedVulnerability,
        SourceRole::AbuseConfidence,
        SourceRole::InfrastructureExposure,
    ];

    pub fn max_points(&self) -> f64 {
        match self {
            SourceRole::MalwareDetection => 5.0,
            SourceRole::CommunityPulse => 2.0,
            SourceRole::ExposedVulnerability => 2.0,
            SourceRole::AbuseConfidence => 1.0,
            SourceRole::InfrastructureExposure => 0.5,
        }
    }

    /// Points and explanation for a successful payload, if the role applies
    fn evaluate(&self, payload: &Payload) -> Option<(f64, String)> {
        match self {
            SourceRole::MalwareDetection => {
                let total = number(payload, "total");
                if total <= 0.0 {
                    return None;
                }
                let detections = number(payload, "detections");
                let ratio = (detections / total).min(1.0);
                Some((
                    ratio * self.max_points(),
                    format!(
                        "{}/{} engines flagged as malicious",
                        display_number(detections),
                        display_number(total)
                    ),
                ))
            }
            SourceRole::CommunityPulse => {
                let pulses = number(payload, "pulse_count");
                let points = (pulses / 10.0 * self.max_points()).min(self.max_points());
                Some((
                    points,
                    format!("{} threat intelligence pulses", display_number(pulses)),
                ))
            }
            SourceRole::ExposedVulnerability => {
                let vulns = payload
                    .get("vulns")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                if vulns == 0 {
                    return None;
                }
                let points = (vulns as f64 / 3.0 * self.max_points()).min(self.max_points());
                Some((points, format!("{} known vulnerabilities detected", vulns)))
            }
            SourceRole::AbuseConfidence => {
                let confidence = number(payload, "abuse_confidence_score").min(100.0);
                if confidence <= 0.0 {
                    return None;
                }
                Some((
                    confidence / 100.0 * self.max_points(),
                    format!("{}% abuse confidence", display_number(confidence)),
                ))
            }
            SourceRole::InfrastructureExposure => {
                if !exposes_suspicious_port(payload) {
                    return None;
                }
                Some((self.max_points(), "Suspicious services exposed".to_string()))
            }
        }
    }
}

/// Non-negative numeric field; missing or malformed reads as zero
fn number(payload: &Payload, key: &str) -> f64 {
    payload
        .get(key)
        .and_then(Value::as_f64)
        .filter(|v| v.is_finite())
        .map_or(0.0, |v| v.max(0.0))
}

fn display_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", round_to(value, 2))
    }
}

/// Any `services[*].port` in the suspicious set
fn exposes_suspicious_port(payload: &Payload) -> bool {
    payload
        .get("services")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|service| service.get("port").and_then(Value::as_u64))
        .any(|port| SUSPICIOUS_PORTS.contains(&port))
}

/// Share of providers that succeeded, quantized to four levels
pub fn calculate_confidence(results: &ResultSet) -> f64 {
    let total = results.len();
    if total == 0 {
        return 0.0;
    }

    let ratio = results.successful().count() as f64 / total as f64;
    if ratio >= 0.75 {
        0.9
    } else if ratio >= 0.5 {
        0.7
    } else if ratio >= 0.25 {
        0.5
    } else {
        0.3
    }
}

/// Maps source roles to provider names and fuses their results
#[derive(Debug, Clone)]
pub struct RiskScorer {
    sources: Vec<(SourceRole, String)>,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            sources: vec![
                (SourceRole::MalwareDetection, VIRUSTOTAL.to_string()),
                (SourceRole::CommunityPulse, OTX.to_string()),
                (SourceRole::ExposedVulnerability, SHODAN.to_string()),
                (SourceRole::AbuseConfidence, ABUSEIPDB.to_string()),
                (SourceRole::InfrastructureExposure, CENSYS.to_string()),
            ],
        }
    }
}

impl RiskScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a provider to a role, replacing the current one
    pub fn with_source(mut self, role: SourceRole, provider: &str) -> Self {
        self.sources.retain(|(r, _)| *r != role);
        self.sources.push((role, provider.to_string()));
        self
    }

    pub fn source_for(&self, role: SourceRole) -> Option<&str> {
        self.sources
            .iter()
            .find(|(r, _)| *r == role)
            .map(|(_, name)| name.as_str())
    }

    /// Fuse a result set into a risk score. Pure and deterministic.
    pub fn calculate_risk(&self, results: &ResultSet) -> RiskScore {
        let mut total = 0.0;
        let mut components = Vec::new();

        for role in SourceRole::ORDER {
            let Some(source) = self.source_for(role) else {
                continue;
            };
            let Some(result) = results.get(source) else {
                continue;
            };
            if !result.is_success() || result.payload.is_empty() {
                continue;
            }

            if let Some((points, explanation)) = role.evaluate(&result.payload) {
                debug!("{} contributes {:.2} points: {}", source, points, explanation);
                total += points;
                components.push(ScoreComponent {
                    source: source.to_string(),
                    points: round_to(points, 2),
                    max_points: role.max_points(),
                    explanation,
                });
            }
        }

        RiskScore::new(total, calculate_confidence(results), components)
    }
}

/// Score with the default role mapping
pub fn calculate_risk(results: &ResultSet) -> RiskScore {
    RiskScorer::default().calculate_risk(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fusion_core::{ProviderResult, SeverityTier};
    use serde_json::json;
    use std::time::Duration;

    fn obj(value: Value) -> Payload {
        match value {
            Value::Object(map) => map,
            _ => Payload::new(),
        }
    }

    fn success(name: &str, value: Value) -> ProviderResult {
        ProviderResult::success(name, "8.8.8.8", obj(value))
    }

    fn set(results: Vec<ProviderResult>) -> ResultSet {
        let queried = results.len();
        let mut set = ResultSet::new();
        for r in results {
            set.insert(r);
        }
        set.finalize(Duration::from_millis(10), queried)
    }

    #[test]
    fn test_single_virustotal_source() {
        let results = set(vec![success(
            VIRUSTOTAL,
            json!({ "detections": 3, "total": 10 }),
        )]);
        let risk = calculate_risk(&results);

        assert_eq!(risk.score, 1.5);
        assert_eq!(risk.severity, SeverityTier::Low);
        assert_eq!(risk.confidence, 0.9);
        assert_eq!(risk.components.len(), 1);
        assert_eq!(
            risk.components[0].explanation,
            "3/10 engines flagged as malicious"
        );
    }

    #[test]
    fn test_combined_sources_medium() {
        let results = set(vec![
            success(VIRUSTOTAL, json!({ "detections": 5, "total": 10 })),
            success(OTX, json!({ "pulse_count": 4 })),
            success(ABUSEIPDB, json!({ "abuse_confidence_score": 80 })),
            success(SHODAN, json!({ "vulns": ["CVE-2021-1", "CVE-2021-2"] })),
        ]);
        let risk = calculate_risk(&results);

        // 2.5 + 0.8 + 0.8 + 1.333 = 5.43
        assert_eq!(risk.score, 5.4);
        assert_eq!(risk.severity, SeverityTier::Medium);
        assert_eq!(risk.confidence, 0.9);

        let sources: Vec<_> = risk.components.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec![VIRUSTOTAL, OTX, SHODAN, ABUSEIPDB]);
        assert_eq!(risk.components[2].points, 1.33);
        assert_eq!(risk.components[3].explanation, "80% abuse confidence");
    }

    #[test]
    fn test_severity_from_unrounded_total() {
        let results = set(vec![success(
            VIRUSTOTAL,
            json!({ "detections": 396, "total": 500 }),
        )]);
        let risk = calculate_risk(&results);

        assert_eq!(risk.score, 4.0);
        assert_eq!(risk.severity, SeverityTier::Low);
    }

    #[test]
    fn test_malware_and_abuse_medium() {
        let results = set(vec![
            success(VIRUSTOTAL, json!({ "detections": 9, "total": 10 })),
            success(ABUSEIPDB, json!({ "abuse_confidence_score": 90 })),
        ]);
        let risk = calculate_risk(&results);

        assert_eq!(risk.score, 5.4);
        assert_eq!(risk.severity, SeverityTier::Medium);
        assert_eq!(risk.components[0].points, 4.5);
        assert_eq!(risk.components[1].points, 0.9);
        assert_eq!(risk.components[1].explanation, "90% abuse confidence");
    }

    #[test]
    fn test_failed_sources_contribute_nothing() {
        let results = set(vec![
            success(VIRUSTOTAL, json!({ "detections": 2, "total": 10 })),
            ProviderResult::error(OTX, "8.8.8.8", "HTTP 500"),
            ProviderResult::error(SHODAN, "8.8.8.8", "Provider timeout (>5s)"),
            ProviderResult::error(ABUSEIPDB, "8.8.8.8", "HTTP 429"),
        ]);
        let risk = calculate_risk(&results);

        assert_eq!(risk.score, 1.0);
        assert_eq!(risk.components.len(), 1);
        assert_eq!(risk.confidence, 0.5);
    }

    #[test]
    fn test_empty_result_set() {
        let risk = calculate_risk(&ResultSet::new().finalize(Duration::ZERO, 0));
        assert_eq!(risk.score, 0.0);
        assert_eq!(risk.severity, SeverityTier::Low);
        assert_eq!(risk.confidence, 0.0);
        assert!(risk.components.is_empty());
    }

    #[test]
    fn test_score_clamped_to_maximum() {
        let results = set(vec![
            success(VIRUSTOTAL, json!({ "detections": 70, "total": 70 })),
            success(OTX, json!({ "pulse_count": 50 })),
            success(SHODAN, json!({ "vulns": ["a", "b", "c", "d", "e"] })),
            success(ABUSEIPDB, json!({ "abuse_confidence_score": 100 })),
            success(CENSYS, json!({ "services": [{ "port": 3389 }] })),
        ]);
        let risk = calculate_risk(&results);

        assert_eq!(risk.score, 10.0);
        assert_eq!(risk.max, 10.0);
        assert_eq!(risk.severity, SeverityTier::Critical);
        assert_eq!(risk.components.len(), 5);
        for component in &risk.components {
            assert!(component.points <= component.max_points);
        }
    }

    #[test]
    fn test_malformed_fields_read_as_zero() {
        let results = set(vec![
            success(VIRUSTOTAL, json!({ "detections": "many", "total": 10 })),
            success(OTX, json!({ "pulse_count": null })),
            success(SHODAN, json!({ "vulns": "CVE-2021-44228" })),
            success(ABUSEIPDB, json!({ "abuse_confidence_score": -20 })),
            success(CENSYS, json!({ "services": { "port": 22 } })),
        ]);
        let risk = calculate_risk(&results);

        assert_eq!(risk.score, 0.0);
        let sources: Vec<_> = risk.components.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(sources, vec![VIRUSTOTAL, OTX]);
        assert_eq!(risk.components[1].explanation, "0 threat intelligence pulses");
    }

    #[test]
    fn test_zero_total_engines_skipped() {
        let results = set(vec![success(
            VIRUSTOTAL,
            json!({ "detections": 0, "total": 0 }),
        )]);
        assert!(calculate_risk(&results).components.is_empty());
    }

    #[test]
    fn test_empty_payload_skipped() {
        let results = set(vec![success(OTX, json!({}))]);
        let risk = calculate_risk(&results);
        assert!(risk.components.is_empty());
        assert_eq!(risk.confidence, 0.9);
    }

    #[test]
    fn test_infrastructure_exposure() {
        let results = set(vec![success(
            CENSYS,
            json!({ "services": [
                { "port": 443 },
                { "port": 22 },
                { "port": 3389 },
                { "port": 22 }
            ] }),
        )]);
        let risk = calculate_risk(&results);

        assert_eq!(risk.score, 0.5);
        assert_eq!(risk.components[0].points, 0.5);
        assert_eq!(risk.components[0].explanation, "Suspicious services exposed");

        let benign = set(vec![success(CENSYS, json!({ "services": [{ "port": 443 }] }))]);
        assert!(calculate_risk(&benign).components.is_empty());
    }

    #[test]
    fn test_monotonic_in_detections() {
        let mut previous = 0.0;
        for detections in 0..=70 {
            let results = set(vec![success(
                VIRUSTOTAL,
                json!({ "detections": detections, "total": 70 }),
            )]);
            let score = calculate_risk(&results).score;
            assert!(score >= previous, "{} < {}", score, previous);
            previous = score;
        }
        assert_eq!(previous, 5.0);
    }

    #[test]
    fn test_deterministic() {
        let results = set(vec![
            success(VIRUSTOTAL, json!({ "detections": 7, "total": 65 })),
            success(OTX, json!({ "pulse_count": 3 })),
        ]);
        assert_eq!(calculate_risk(&results), calculate_risk(&results));
    }

    #[test]
    fn test_component_order_independent_of_completion_order() {
        let results = set(vec![
            success(ABUSEIPDB, json!({ "abuse_confidence_score": 50 })),
            success(VIRUSTOTAL, json!({ "detections": 1, "total": 10 })),
        ]);
        let sources: Vec<_> = calculate_risk(&results)
            .components
            .into_iter()
            .map(|c| c.source)
            .collect();
        assert_eq!(sources, vec![VIRUSTOTAL.to_string(), ABUSEIPDB.to_string()]);
    }

    #[test]
    fn test_custom_source_mapping() {
        let scorer = RiskScorer::new().with_source(SourceRole::MalwareDetection, "HybridAnalysis");
        assert_eq!(
            scorer.source_for(SourceRole::MalwareDetection),
            Some("HybridAnalysis")
        );

        let results = set(vec![
            success("HybridAnalysis", json!({ "detections": 10, "total": 10 })),
            success(VIRUSTOTAL, json!({ "detections": 10, "total": 10 })),
        ]);
        let risk = scorer.calculate_risk(&results);
        assert_eq!(risk.score, 5.0);
        assert_eq!(risk.components[0].source, "HybridAnalysis");
    }

    #[test]
    fn test_confidence_levels() {
        let mixed = |ok: usize, failed: usize| {
            let mut results = Vec::new();
            for i in 0..ok {
                results.push(success(&format!("ok{}", i), json!({ "x": 1 })));
            }
            for i in 0..failed {
                results.push(ProviderResult::error(&format!("bad{}", i), "8.8.8.8", "boom"));
            }
            calculate_confidence(&set(results))
        };

        assert_eq!(mixed(4, 0), 0.9);
        assert_eq!(mixed(1, 0), 0.9);
        assert_eq!(mixed(4, 1), 0.9);
        assert_eq!(mixed(3, 1), 0.9);
        assert_eq!(mixed(2, 1), 0.7);
        assert_eq!(mixed(2, 2), 0.7);
        assert_eq!(mixed(1, 1), 0.7);
        assert_eq!(mixed(1, 2), 0.5);
        assert_eq!(mixed(1, 3), 0.5);
        assert_eq!(mixed(1, 4), 0.3);
        assert_eq!(mixed(0, 3), 0.3);
    }
}
