//! ThreatFusion Network Layer
//!
//! Provides the HTTP transport used by provider clients:
//! - Client construction with timeout, user agent and optional proxy
//! - JSON requests with bounded retry and exponential backoff

pub mod client;

pub use client::*;
