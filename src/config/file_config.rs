use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::loyalty::Reward;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub db_dir: Option<String>,
    pub client_state_dir: Option<String>,
    pub port: Option<u16>,
    pub metrics_port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,
    pub webhook_secret: Option<String>,
    pub cron_secret: Option<String>,

    // Feature configs
    pub oidc: Option<OidcConfig>,
    pub loyalty: Option<LoyaltyConfig>,
    pub background_jobs: Option<BackgroundJobsConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OidcConfig {
    /// Issuer URL, used for discovery.
    pub provider_url: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Must point at `/v1/auth/callback` on this server.
    pub redirect_uri: String,
    #[serde(default = "default_oidc_scopes")]
    pub scopes: Vec<String>,
}

fn default_oidc_scopes() -> Vec<String> {
    vec![
        "openid".to_string(),
        "profile".to_string(),
        "email".to_string(),
    ]
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct LoyaltyConfig {
    /// Replaces the built-in reward catalog when present.
    pub rewards: Option<Vec<Reward>>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct BackgroundJobsConfig {
    pub daily_stats_interval_minutes: Option<u64>,
    pub token_pruning_interval_hours: Option<u64>,
    pub token_unused_days: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
