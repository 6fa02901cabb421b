//! ThreatFusion Agents
//!
//! Threat intelligence providers behind one capability trait:
//! - **VirusTotal**: multi-engine detection ratios (hashes, IPv4, domains, URLs)
//! - **OTX**: AlienVault community pulses (all indicator types)
//! - **AbuseIPDB**: IP abuse confidence scores
//! - **Shodan**: exposed services and known vulnerabilities (IPv4)
//! - **Censys**: host services and certificates (IPv4, domains)
//!
//! ## Configuration
//!
//! Credentials and engine settings come from a TOML file and environment
//! variables. See [`config::FusionConfig`].

pub mod abuseipdb;
pub mod censys;
pub mod config;
pub mod otx;
pub mod registry;
pub mod shodan;
pub mod traits;
pub mod virustotal;

pub use abuseipdb::*;
pub use censys::*;
pub use config::*;
pub use otx::*;
pub use registry::*;
pub use shodan::*;
pub use traits::*;
pub use virustotal::*;
