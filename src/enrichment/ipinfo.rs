//! Address enrichment via the IPinfo lookup API

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::enrichment::Enricher;
use crate::models::{AddressEnrichment, Geolocation, IndicatorType};

const IPINFO_API_URL: &str = "https://ipinfo.io";

#[derive(Debug, Deserialize)]
struct IpInfoResponse {
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
    /// Combined "AS#### Org Name" string
    org: Option<String>,
}

/// IPinfo geolocation/ASN provider
pub struct IpInfoProvider {
    client: Client,
    token: String,
    base_url: String,
}

impl IpInfoProvider {
    /// Create a new IPinfo provider
    pub fn new(token: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            token,
            base_url: IPINFO_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Look up geolocation and network ownership for an address
    pub async fn lookup(&self, ip: &str) -> Result<AddressEnrichment> {
        let response = self
            .client
            .get(format!("{}/{}/json", self.base_url, ip))
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .context("Failed to reach IPinfo")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("IPinfo API error: {} - {}", status, body);
        }

        let data: IpInfoResponse = response
            .json()
            .await
            .context("Failed to parse IPinfo response")?;

        let (asn, isp) = data
            .org
            .as_deref()
            .map(split_org)
            .unwrap_or((None, None));

        Ok(AddressEnrichment {
            geolocation: Geolocation {
                country: data.country,
                region: data.region,
                city: data.city,
            },
            asn,
            isp,
        })
    }
}

/// Split the combined org string: first whitespace-delimited token is the
/// ASN identifier, the remainder is the ISP name
fn split_org(org: &str) -> (Option<String>, Option<String>) {
    let mut parts = org.split_whitespace();
    let asn = parts.next().map(str::to_string);
    let rest = parts.collect::<Vec<_>>().join(" ");
    let isp = (!rest.is_empty()).then_some(rest);
    (asn, isp)
}

#[async_trait]
impl Enricher for IpInfoProvider {
    fn name(&self) -> &'static str {
        "ipinfo"
    }

    fn supports(&self, indicator_type: IndicatorType) -> bool {
        matches!(indicator_type, IndicatorType::Ip)
    }

    async fn enrich(&self, value: &str) -> Result<Value> {
        let data = self.lookup(value).await?;
        Ok(serde_json::to_value(data)?)
    }
}
