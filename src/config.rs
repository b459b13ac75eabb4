use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration for the vigil pipeline daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Input source configuration
    pub input: InputConfig,
    /// Enrichment (geo / threat intel) configuration
    pub enrichment: EnrichmentConfig,
    /// Data lake and catalog configuration
    pub storage: StorageConfig,
    /// Alert dispatch configuration
    pub alerting: AlertingConfig,
}

/// Input source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// Type of input source: "file" or "udp"
    pub source_type: String,
    /// Path to a JSONL record file (if source_type is "file")
    pub file_path: Option<PathBuf>,
    /// UDP bind address (if source_type is "udp")
    pub udp_address: Option<String>,
}

/// Enrichment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Path to a MaxMind GeoLite2-City database. When absent, the
    /// built-in static geo table is used.
    pub geoip_db_path: Option<PathBuf>,
    /// Path to an IP blocklist file (one address per line, # comments).
    /// Entries extend the built-in blocklist.
    pub blocklist_path: Option<PathBuf>,
    /// ISO country codes that add to the risk score
    pub high_risk_countries: Vec<String>,
}

/// Data lake and catalog configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the local data lake
    pub data_lake_root: PathBuf,
    /// Key prefix for enriched event objects
    pub events_prefix: String,
    /// Path to the sqlite event catalog
    pub catalog_path: PathBuf,
    /// Retention window applied by the prune operation, in days
    pub retention_days: u32,
}

/// Alert dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertingConfig {
    /// Master switch for alert dispatch
    pub enabled: bool,
    /// Minimum risk score that triggers an alert
    pub min_risk_score: u8,
    /// Minimum GuardDuty-style severity that triggers an alert
    pub min_severity: f64,
    /// Slack webhook configuration
    pub slack: Option<SlackConfig>,
    /// Generic webhook endpoints
    #[serde(default)]
    pub webhooks: Vec<WebhookConfig>,
}

/// Slack notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    pub webhook_url: String,
    pub channel: String,
    pub username: Option<String>,
}

/// Generic webhook notification channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub name: String,
    pub url: String,
    /// HTTP method, "POST" (default) or "PUT"
    pub method: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            input: InputConfig {
                source_type: "file".to_string(),
                file_path: Some(PathBuf::from("events.jsonl")),
                udp_address: None,
            },
            enrichment: EnrichmentConfig {
                geoip_db_path: None,
                blocklist_path: None,
                high_risk_countries: vec![
                    "CN".to_string(),
                    "RU".to_string(),
                    "KP".to_string(),
                ],
            },
            storage: StorageConfig {
                data_lake_root: PathBuf::from("data-lake"),
                events_prefix: "security-events".to_string(),
                catalog_path: PathBuf::from("vigil-catalog.db"),
                retention_days: 30,
            },
            alerting: AlertingConfig {
                enabled: true,
                min_risk_score: 70,
                min_severity: 7.0,
                slack: None,
                webhooks: vec![],
            },
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file(&self, path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Number of configured notification channels
    pub fn webhook_count(&self) -> usize {
        self.alerting.webhooks.len() + usize::from(self.alerting.slack.is_some())
    }
}
