//! Fused risk score types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::MAX_RISK_SCORE;

/// Coarse human-facing risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityTier {
    /// Inclusive lower bounds, evaluated highest first
    pub fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            SeverityTier::Critical
        } else if score >= 6.0 {
            SeverityTier::High
        } else if score >= 4.0 {
            SeverityTier::Medium
        } else {
            SeverityTier::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SeverityTier::Low => "LOW",
            SeverityTier::Medium => "MEDIUM",
            SeverityTier::High => "HIGH",
            SeverityTier::Critical => "CRITICAL",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SeverityTier::Low => "🟢",
            SeverityTier::Medium => "🟡",
            SeverityTier::High => "🟠",
            SeverityTier::Critical => "🔴",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One source's contribution to the fused score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    /// Provider the points came from
    pub source: String,
    /// Points awarded, rounded to two decimals
    pub points: f64,
    /// Maximum points this source can award
    pub max_points: f64,
    /// One-line explanation built from the raw payload
    pub explanation: String,
}

/// Unified risk score for one indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Clamped to [0, 10], one decimal
    pub score: f64,
    pub max: f64,
    pub severity: SeverityTier,
    /// Quantized coverage estimate in [0, 1]
    pub confidence: f64,
    /// Breakdown in fixed source-role order
    pub components: Vec<ScoreComponent>,
}

impl RiskScore {
    /// Severity is taken from the clamped score before rounding
    pub fn new(score: f64, confidence: f64, components: Vec<ScoreComponent>) -> Self {
        let clamped = score.clamp(0.0, MAX_RISK_SCORE);
        Self {
            score: round_to(clamped, 1),
            max: MAX_RISK_SCORE,
            severity: SeverityTier::from_score(clamped),
            confidence,
            components,
        }
    }
}

/// Round half away from zero to `decimals` places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_thresholds() {
        assert_eq!(SeverityTier::from_score(0.0), SeverityTier::Low);
        assert_eq!(SeverityTier::from_score(3.9), SeverityTier::Low);
        assert_eq!(SeverityTier::from_score(4.0), SeverityTier::Medium);
        assert_eq!(SeverityTier::from_score(6.0), SeverityTier::High);
        assert_eq!(SeverityTier::from_score(7.99), SeverityTier::High);
        assert_eq!(SeverityTier::from_score(8.0), SeverityTier::Critical);
        assert_eq!(SeverityTier::from_score(10.0), SeverityTier::Critical);
    }

    #[test]
    fn test_score_is_clamped() {
        assert_eq!(RiskScore::new(12.3, 0.9, vec![]).score, 10.0);
        assert_eq!(RiskScore::new(-1.0, 0.9, vec![]).score, 0.0);
        assert_eq!(RiskScore::new(12.3, 0.9, vec![]).severity, SeverityTier::Critical);
    }

    #[test]
    fn test_severity_uses_unrounded_score() {
        let risk = RiskScore::new(3.96, 0.5, vec![]);
        assert_eq!(risk.score, 4.0);
        assert_eq!(risk.severity, SeverityTier::Low);

        let risk = RiskScore::new(7.96, 0.5, vec![]);
        assert_eq!(risk.score, 8.0);
        assert_eq!(risk.severity, SeverityTier::High);
    }

    #[test]
    fn test_severity_serialization() {
        assert_eq!(serde_json::to_string(&SeverityTier::Critical).unwrap(), "\"CRITICAL\"");
        assert_eq!(SeverityTier::High.to_string(), "HIGH");
    }
}
