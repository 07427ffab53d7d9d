//! Canonical price domain types
//!
//! `PriceRecord` is both the unit of storage and the unit of reply. Identity
//! is (token, network, timestamp); the provenance tag says which pipeline
//! tier produced the value.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of supported blockchain networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    Polygon,
    Bsc,
    Avalanche,
    Arbitrum,
    Optimism,
}

impl Network {
    pub fn all() -> &'static [Network] {
        &[
            Network::Ethereum,
            Network::Polygon,
            Network::Bsc,
            Network::Avalanche,
            Network::Arbitrum,
            Network::Optimism,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Ethereum => "ethereum",
            Network::Polygon => "polygon",
            Network::Bsc => "bsc",
            Network::Avalanche => "avalanche",
            Network::Arbitrum => "arbitrum",
            Network::Optimism => "optimism",
        }
    }
}

impl FromStr for Network {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ethereum" => Ok(Network::Ethereum),
            "polygon" => Ok(Network::Polygon),
            "bsc" => Ok(Network::Bsc),
            "avalanche" => Ok(Network::Avalanche),
            "arbitrum" => Ok(Network::Arbitrum),
            "optimism" => Ok(Network::Optimism),
            other => Err(format!("unsupported network: {}", other)),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated, lowercase ERC-20 contract address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenAddress(String);

impl TokenAddress {
    /// Accepts any casing, rejects anything not matching 0x + 40 hex chars,
    /// and normalizes to lowercase. Mixed-case addresses would otherwise
    /// fragment cache keys and silently miss.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.len() != 42 || !trimmed.starts_with("0x") {
            return Err(format!(
                "invalid token address '{}': expected 0x followed by 40 hex characters",
                raw
            ));
        }
        if !trimmed[2..].chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "invalid token address '{}': non-hex characters after 0x",
                raw
            ));
        }
        Ok(TokenAddress(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which pipeline tier produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    #[serde(rename = "fromCache")]
    FromCache,
    #[serde(rename = "fromDB")]
    FromDb,
    #[serde(rename = "fromAPI")]
    FromApi,
    #[serde(rename = "interpolated")]
    Interpolated,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::FromCache => "fromCache",
            Provenance::FromDb => "fromDB",
            Provenance::FromApi => "fromAPI",
            Provenance::Interpolated => "interpolated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    Linear,
    Extrapolation,
}

/// A slim (timestamp, usd) observation, used in rollups and as the
/// dataPointsUsed payload of interpolated records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub usd: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationDetails {
    pub method: InterpolationMethod,
    pub confidence: f64,
    pub data_points_used: Vec<PricePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecord {
    pub token: String,
    pub network: Network,
    pub timestamp: DateTime<Utc>,
    pub usd: f64,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decimals: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_uri: Option<String>,
    pub provenance: Provenance,
    #[serde(flatten)]
    pub interpolation: Option<InterpolationDetails>,
}

impl PriceRecord {
    pub fn is_interpolated(&self) -> bool {
        self.interpolation.is_some()
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

/// RFC-3339 / ISO-8601 timestamp parsing for request inputs.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", raw, e))
}
