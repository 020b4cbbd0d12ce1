//! Runtime configuration, resolved once at startup

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use url::Url;

use crate::models::IndicatorType;

const OTX_EXPORT_URL: &str = "https://otx.alienvault.com/api/v1/indicators/export?type=IPv4";
const ABUSEIPDB_BLACKLIST_URL: &str = "https://api.abuseipdb.com/api/v2/blacklist";

/// Field holding the entry list when a feed responds with an object
const DEFAULT_LIST_FIELD: &str = "data";
/// Field holding the indicator value inside an object-shaped entry
const DEFAULT_VALUE_FIELD: &str = "ipAddress";
const DEFAULT_KEY_HEADER: &str = "Authorization";

/// One upstream feed source, immutable for the run
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub name: String,
    pub url: Url,
    /// Headers sent with the fetch, including any credential header
    pub headers: Vec<(String, String)>,
    /// False when the feed declares a credential that is not set; the
    /// pipeline skips such feeds instead of fetching without the key
    pub configured: bool,
    pub indicator_type: IndicatorType,
    pub list_field: String,
    pub value_field: String,
}

impl FeedConfig {
    fn new(name: impl Into<String>, url: Url, indicator_type: IndicatorType) -> Self {
        Self {
            name: name.into(),
            url,
            headers: Vec::new(),
            configured: true,
            indicator_type,
            list_field: DEFAULT_LIST_FIELD.to_string(),
            value_field: DEFAULT_VALUE_FIELD.to_string(),
        }
    }

    fn with_key_header(mut self, header: &str, key: Option<&str>) -> Self {
        match key {
            Some(key) if !key.is_empty() => {
                self.headers.push((header.to_string(), key.to_string()));
            }
            _ => self.configured = false,
        }
        self
    }
}

/// Full pipeline configuration, passed into every component
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feeds: Vec<FeedConfig>,
    pub ipinfo_token: Option<String>,
    pub whois_api_key: Option<String>,
    pub raw_dir: PathBuf,
    pub parsed_dir: PathBuf,
    /// Classification applied to every indicator until scoring lands
    pub threat_type: String,
    /// Confidence applied to every indicator until scoring lands
    pub confidence: u8,
    pub fetch_attempts: u32,
    pub retry_delay: Duration,
}

/// Compiled-in defaults plus any feeds declared through the environment
pub fn build_feeds(
    otx_key: Option<&str>,
    abuseipdb_key: Option<&str>,
    env: impl IntoIterator<Item = (String, String)>,
) -> Result<Vec<FeedConfig>> {
    let otx_url = Url::parse(OTX_EXPORT_URL).context("Invalid OTX feed URL")?;
    let abuseipdb_url =
        Url::parse(ABUSEIPDB_BLACKLIST_URL).context("Invalid AbuseIPDB feed URL")?;

    let mut feeds = vec![
        FeedConfig::new("OTX", otx_url, IndicatorType::Ip)
            .with_key_header("X-OTX-API-KEY", otx_key),
        FeedConfig::new("AbuseIPDB", abuseipdb_url, IndicatorType::Ip)
            .with_key_header("Key", abuseipdb_key),
    ];

    feeds.extend(discover_env_feeds(env));
    Ok(feeds)
}

/// Feeds declared as `FEED_<NAME>_URL` in the environment, with optional
/// `FEED_<NAME>_API_KEY`, `FEED_<NAME>_KEY_HEADER`, and `FEED_<NAME>_TYPE`
pub fn discover_env_feeds(
    env: impl IntoIterator<Item = (String, String)>,
) -> Vec<FeedConfig> {
    let vars: std::collections::BTreeMap<String, String> = env.into_iter().collect();
    let mut feeds = Vec::new();

    for (key, value) in &vars {
        let Some(name) = key
            .strip_prefix("FEED_")
            .and_then(|rest| rest.strip_suffix("_URL"))
        else {
            continue;
        };
        if name.is_empty() {
            continue;
        }

        let url = match Url::parse(value) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(feed = name, error = %e, "Ignoring feed with invalid URL");
                continue;
            }
        };

        let indicator_type = vars
            .get(&format!("FEED_{name}_TYPE"))
            .map(|t| IndicatorType::parse(t))
            .unwrap_or(IndicatorType::Ip);

        let mut feed = FeedConfig::new(name, url, indicator_type);
        if let Some(api_key) = vars.get(&format!("FEED_{name}_API_KEY")) {
            let header = vars
                .get(&format!("FEED_{name}_KEY_HEADER"))
                .map(String::as_str)
                .unwrap_or(DEFAULT_KEY_HEADER);
            feed = feed.with_key_header(header, Some(api_key.as_str()));
        }
        feeds.push(feed);
    }

    feeds
}
