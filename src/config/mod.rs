mod file_config;

pub use file_config::{BackgroundJobsConfig, FileConfig, LoyaltyConfig, OidcConfig};

use crate::loyalty::RewardCatalog;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub db_dir: Option<PathBuf>,
    pub client_state_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
    pub webhook_secret: Option<String>,
    pub cron_secret: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub db_dir: PathBuf,
    pub client_state_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Shared secrets for the integration endpoints. Unset disables them.
    pub webhook_secret: Option<String>,
    pub cron_secret: Option<String>,

    // Feature configs (with defaults)
    pub oidc: Option<OidcConfig>,
    pub reward_catalog: RewardCatalog,
    pub background_jobs: BackgroundJobsSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let db_dir = file
            .db_dir
            .map(PathBuf::from)
            .or_else(|| cli.db_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("db_dir must be specified via --db-dir or in config file")
            })?;

        if !db_dir.exists() {
            bail!("Database directory does not exist: {:?}", db_dir);
        }
        if !db_dir.is_dir() {
            bail!("db_dir is not a directory: {:?}", db_dir);
        }

        let client_state_dir = file
            .client_state_dir
            .map(PathBuf::from)
            .or_else(|| cli.client_state_dir.clone())
            .unwrap_or_else(|| db_dir.join("client_state"));

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);
        if port == metrics_port && port != 0 {
            bail!("port and metrics_port must differ (both {})", port);
        }

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        let webhook_secret = non_empty(file.webhook_secret.or_else(|| cli.webhook_secret.clone()));
        let cron_secret = non_empty(file.cron_secret.or_else(|| cli.cron_secret.clone()));

        let reward_catalog = match file.loyalty.and_then(|l| l.rewards) {
            Some(rewards) => {
                if rewards.iter().any(|r| r.points_required == 0) {
                    bail!("Loyalty rewards must require at least one point");
                }
                RewardCatalog::new(rewards)
            }
            None => RewardCatalog::default(),
        };

        let jobs_file = file.background_jobs.unwrap_or_default();
        let defaults = BackgroundJobsSettings::default();
        let background_jobs = BackgroundJobsSettings {
            daily_stats_interval_minutes: jobs_file
                .daily_stats_interval_minutes
                .unwrap_or(defaults.daily_stats_interval_minutes),
            token_pruning_interval_hours: jobs_file
                .token_pruning_interval_hours
                .unwrap_or(defaults.token_pruning_interval_hours),
            token_unused_days: jobs_file
                .token_unused_days
                .unwrap_or(defaults.token_unused_days),
        };

        Ok(Self {
            db_dir,
            client_state_dir,
            port,
            metrics_port,
            logging_level,
            frontend_dir_path,
            webhook_secret,
            cron_secret,
            oidc: file.oidc,
            reward_catalog,
            background_jobs,
        })
    }

    pub fn user_db_path(&self) -> PathBuf {
        self.db_dir.join("user.db")
    }

    pub fn marketplace_db_path(&self) -> PathBuf {
        self.db_dir.join("marketplace.db")
    }
}

#[derive(Debug, Clone)]
pub struct BackgroundJobsSettings {
    pub daily_stats_interval_minutes: u64,
    pub token_pruning_interval_hours: u64,
    /// Tokens not used for this many days are deleted.
    pub token_unused_days: u64,
}

impl Default for BackgroundJobsSettings {
    fn default() -> Self {
        Self {
            daily_stats_interval_minutes: 60,
            token_pruning_interval_hours: 24,
            token_unused_days: 90,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
