//! Domain enrichment via the WhoisXML API

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::enrichment::Enricher;
use crate::models::{DomainEnrichment, IndicatorType, WhoisSummary};

const WHOISXML_API_URL: &str = "https://www.whoisxmlapi.com/whoisserver/WhoisService";

#[derive(Debug, Deserialize)]
struct WhoisResponse {
    #[serde(rename = "WhoisRecord")]
    whois_record: Option<WhoisRecord>,
}

#[derive(Debug, Deserialize)]
struct WhoisRecord {
    #[serde(rename = "registryData")]
    registry_data: Option<RegistryData>,
}

#[derive(Debug, Deserialize)]
struct RegistryData {
    registrant: Option<Registrant>,
    /// Left as the registry's own string; formats vary per TLD
    #[serde(rename = "registryCreationDate")]
    creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Registrant {
    name: Option<String>,
}

/// WhoisXML registrant/creation-date provider
pub struct WhoisXmlProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl WhoisXmlProvider {
    /// Create a new WhoisXML provider
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url: WHOISXML_API_URL.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Look up registry data for a domain
    pub async fn lookup(&self, domain: &str) -> Result<DomainEnrichment> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("domainName", domain),
                ("outputFormat", "JSON"),
            ])
            .send()
            .await
            .context("Failed to reach WhoisXML")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("WhoisXML API error: {} - {}", status, body);
        }

        let data: WhoisResponse = response
            .json()
            .await
            .context("Failed to parse WhoisXML response")?;

        let registry = data.whois_record.and_then(|r| r.registry_data);
        let (registrant, creation_date) = match registry {
            Some(registry) => (
                registry.registrant.and_then(|r| r.name),
                registry.creation_date,
            ),
            None => (None, None),
        };

        Ok(DomainEnrichment {
            whois: WhoisSummary {
                registrant,
                creation_date,
            },
        })
    }
}

#[async_trait]
impl Enricher for WhoisXmlProvider {
    fn name(&self) -> &'static str {
        "whoisxml"
    }

    fn supports(&self, indicator_type: IndicatorType) -> bool {
        matches!(indicator_type, IndicatorType::Domain)
    }

    async fn enrich(&self, value: &str) -> Result<Value> {
        let data = self.lookup(value).await?;
        Ok(serde_json::to_value(data)?)
    }
}
