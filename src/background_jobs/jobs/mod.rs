//! Concrete jobs registered at startup.

pub mod auth_token_pruning;
pub mod daily_stats;

pub use auth_token_pruning::AuthTokenPruningJob;
pub use daily_stats::{refresh_daily_stats, refresh_recent_daily_stats, DailyStatsJob};
