//! ThreatFusion Core - Indicator and result types for threat intelligence fusion
//!
//! This crate provides the foundational data model:
//! - Indicator types and classification
//! - Per-provider results and the result set built during orchestration
//! - The fused risk score with severity tier and confidence

pub mod indicator;
pub mod result;
pub mod risk;

pub use indicator::*;
pub use result::*;
pub use risk::*;

/// Upper bound of the fused risk score
pub const MAX_RISK_SCORE: f64 = 10.0;

/// Default per-call provider timeout in seconds
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 5;

/// Default global enrichment timeout in seconds
pub const DEFAULT_GLOBAL_TIMEOUT_SECS: u64 = 30;

/// Default number of concurrent provider calls
pub const DEFAULT_MAX_WORKERS: usize = 8;
