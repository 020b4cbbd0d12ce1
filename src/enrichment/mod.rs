//! Indicator enrichment lookups

pub mod ipinfo;
pub mod whoisxml;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::IndicatorType;

/// One external lookup capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Provider name
    fn name(&self) -> &'static str;

    /// Check if this provider can enrich the given indicator type
    fn supports(&self, indicator_type: IndicatorType) -> bool;

    /// Look up context for a single indicator value
    async fn enrich(&self, value: &str) -> Result<Value>;
}

/// Dispatches an indicator to the provider registered for its type.
/// A provider is only registered when its credential is configured, so a
/// missing credential means no lookup is ever attempted.
pub struct EnrichmentEngine {
    providers: Vec<Box<dyn Enricher>>,
}

impl EnrichmentEngine {
    pub fn new() -> Self {
        Self { providers: vec![] }
    }

    pub fn add_provider(&mut self, provider: Box<dyn Enricher>) {
        self.providers.push(provider);
    }

    /// Enrich one indicator value. Lookup failures degrade to an empty
    /// object; they must never abort the run.
    pub async fn enrich(&self, indicator_type: IndicatorType, value: &str) -> Value {
        for provider in &self.providers {
            if !provider.supports(indicator_type) {
                continue;
            }

            return match provider.enrich(value).await {
                Ok(data) => data,
                Err(e) => {
                    metrics::counter!("enrichment_failures_total").increment(1);
                    tracing::warn!(
                        provider = provider.name(),
                        indicator = value,
                        error = %e,
                        "Enrichment failed"
                    );
                    empty()
                }
            };
        }

        empty()
    }
}

impl Default for EnrichmentEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn empty() -> Value {
    Value::Object(serde_json::Map::new())
}
