//! Threat indicators and their classification
//!
//! Supported indicator kinds:
//! - File hashes (MD5, SHA1, SHA256)
//! - IPv4 / IPv6 addresses
//! - Domains, email addresses, URLs

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;
use thiserror::Error;

/// Kinds of indicator a provider can be asked about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorType {
    HashMd5,
    HashSha1,
    HashSha256,
    IpV4,
    IpV6,
    Domain,
    Email,
    Url,
}

impl IndicatorType {
    pub const ALL: [IndicatorType; 8] = [
        IndicatorType::HashMd5,
        IndicatorType::HashSha1,
        IndicatorType::HashSha256,
        IndicatorType::IpV4,
        IndicatorType::IpV6,
        IndicatorType::Domain,
        IndicatorType::Email,
        IndicatorType::Url,
    ];

    /// Wire name, identical to the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorType::HashMd5 => "hash_md5",
            IndicatorType::HashSha1 => "hash_sha1",
            IndicatorType::HashSha256 => "hash_sha256",
            IndicatorType::IpV4 => "ip_v4",
            IndicatorType::IpV6 => "ip_v6",
            IndicatorType::Domain => "domain",
            IndicatorType::Email => "email",
            IndicatorType::Url => "url",
        }
    }

    pub fn is_hash(&self) -> bool {
        matches!(
            self,
            IndicatorType::HashMd5 | IndicatorType::HashSha1 | IndicatorType::HashSha256
        )
    }

    pub fn is_ip(&self) -> bool {
        matches!(self, IndicatorType::IpV4 | IndicatorType::IpV6)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from indicator classification
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Indicator cannot be empty")]
    Empty,

    #[error("Unknown indicator type: {0}")]
    Unrecognized(String),
}

/// A classified indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    /// Trimmed indicator value
    pub value: String,
    /// Detected type
    #[serde(rename = "type")]
    pub indicator_type: IndicatorType,
    /// Private / non-routable address (IPs only)
    pub is_private: bool,
}

impl Indicator {
    /// Validate and classify a raw indicator string
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(ValidationError::Empty);
        }

        let indicator_type = detect_type(value)?;
        let is_private = indicator_type.is_ip()
            && value.parse::<IpAddr>().map(is_private_ip).unwrap_or(false);

        Ok(Self {
            value: value.to_string(),
            indicator_type,
            is_private,
        })
    }
}

// Anchored, case-insensitive patterns
static SHA256_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-f0-9]{64}$").unwrap());

static SHA1_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-f0-9]{40}$").unwrap());

static MD5_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-f0-9]{32}$").unwrap());

static URL_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^https?://").unwrap());

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[^@]+@[^@]+\.[a-z]{2,}$").unwrap());

static DOMAIN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[a-z0-9.-]+\.[a-z]{2,}$").unwrap());

/// Detect the indicator type of a value
///
/// Order matters: hashes first (most specific), then IP literals, URLs,
/// emails and finally bare domains.
pub fn detect_type(value: &str) -> Result<IndicatorType, ValidationError> {
    let value = value.trim();

    if SHA256_REGEX.is_match(value) {
        return Ok(IndicatorType::HashSha256);
    }
    if SHA1_REGEX.is_match(value) {
        return Ok(IndicatorType::HashSha1);
    }
    if MD5_REGEX.is_match(value) {
        return Ok(IndicatorType::HashMd5);
    }

    if let Ok(ip) = value.parse::<IpAddr>() {
        return Ok(match ip {
            IpAddr::V4(_) => IndicatorType::IpV4,
            IpAddr::V6(_) => IndicatorType::IpV6,
        });
    }

    if URL_REGEX.is_match(value) {
        return Ok(IndicatorType::Url);
    }
    if EMAIL_REGEX.is_match(value) {
        return Ok(IndicatorType::Email);
    }
    if DOMAIN_REGEX.is_match(value) {
        return Ok(IndicatorType::Domain);
    }

    Err(ValidationError::Unrecognized(value.to_string()))
}

/// Private, loopback or otherwise non-routable address
pub fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_private_v4(v4),
        IpAddr::V6(v6) => is_private_v6(v6),
    }
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        // 240.0.0.0/4
        || ip.octets()[0] >= 240
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        // fc00::/7 unique local
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 link local
        || (first & 0xffc0) == 0xfe80
}
