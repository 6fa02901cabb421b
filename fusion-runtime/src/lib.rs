//! ThreatFusion Runtime - Parallel enrichment and risk fusion
//!
//! Turns one indicator into a scored report:
//! - **Governor**: per-provider token buckets shared by all callers
//! - **Orchestrator**: bounded, deadline-driven fan-out to providers
//! - **Scorer**: weighted fusion of provider results into a 0-10 risk score
//! - **Report**: text, JSON and HTML renderings

pub mod governor;
pub mod orchestrator;
pub mod report;
pub mod scorer;

pub use governor::*;
pub use orchestrator::*;
pub use report::*;
pub use scorer::*;
