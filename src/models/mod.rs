//! Core data models for the feed pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of indicator a feed publishes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    #[serde(rename = "IP")]
    Ip,
    #[serde(rename = "domain")]
    Domain,
    /// Declared by a feed but not understood; normalized without enrichment
    #[serde(rename = "unknown")]
    Unknown,
}

impl IndicatorType {
    /// Parse a feed's declared type. Never fails; anything unrecognized
    /// lands in `Unknown` and flows through without enrichment.
    pub fn parse(value: &str) -> Self {
        match value {
            "IP" => IndicatorType::Ip,
            "domain" => IndicatorType::Domain,
            _ => IndicatorType::Unknown,
        }
    }
}

impl std::fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndicatorType::Ip => write!(f, "IP"),
            IndicatorType::Domain => write!(f, "domain"),
            IndicatorType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Composite deduplication key. Value and type stay separate fields so
/// distinct pairs can never collapse into the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndicatorKey {
    pub value: String,
    pub indicator_type: IndicatorType,
}

/// Unified indicator record, one per deduplicated observable
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Indicator {
    pub indicator: String,
    #[serde(rename = "type")]
    pub indicator_type: IndicatorType,
    pub threat_type: String,
    pub source: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub confidence: u8,
    /// Lookup context; an empty object when no provider produced data
    pub enrichment: serde_json::Value,
}

impl Indicator {
    pub fn key(&self) -> IndicatorKey {
        IndicatorKey {
            value: self.indicator.clone(),
            indicator_type: self.indicator_type,
        }
    }
}

/// Geolocation and network ownership context for an address
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AddressEnrichment {
    pub geolocation: Geolocation,
    pub asn: Option<String>,
    pub isp: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Geolocation {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

/// Registration context for a domain
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DomainEnrichment {
    pub whois: WhoisSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct WhoisSummary {
    pub registrant: Option<String>,
    pub creation_date: Option<String>,
}
