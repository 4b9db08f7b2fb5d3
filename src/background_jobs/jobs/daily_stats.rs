//! Daily marketplace counters.
//!
//! Recomputes the rows for today and yesterday (UTC) so late status changes
//! on yesterday's orders still land in its row.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, HookEvent, JobError, JobSchedule},
};
use crate::marketplace::{DailyStats, DailyStatsStore, MarketplaceStore};
use crate::user::{FullUserStore, UserStore};
use anyhow::{Context, Result};
use chrono::{Datelike, Days, NaiveDate, Utc};
use std::time::Duration;
use tracing::info;

/// `YYYYMMDD` as stored in the stats table.
pub fn date_key(day: NaiveDate) -> u32 {
    day.year() as u32 * 10000 + day.month() * 100 + day.day()
}

/// Unix seconds bounding `day` in UTC, end exclusive.
fn day_bounds(day: NaiveDate) -> (i64, i64) {
    let start = day.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc().timestamp();
    (start, start + 24 * 60 * 60)
}

/// Aggregates one day and writes its row.
pub fn refresh_daily_stats(
    user_store: &dyn FullUserStore,
    marketplace_store: &dyn MarketplaceStore,
    day: NaiveDate,
) -> Result<DailyStats> {
    let (start, end) = day_bounds(day);
    let mut stats = marketplace_store
        .compute_daily_stats(date_key(day), start, end)
        .with_context(|| format!("Failed to aggregate orders for {}", day))?;
    stats.new_users = user_store.count_users_created_between(start, end)? as u64;
    marketplace_store.upsert_daily_stats(&stats)?;
    Ok(stats)
}

/// Refreshes yesterday's and today's rows, oldest first.
pub fn refresh_recent_daily_stats(
    user_store: &dyn FullUserStore,
    marketplace_store: &dyn MarketplaceStore,
) -> Result<Vec<DailyStats>> {
    let today = Utc::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
    let mut rows = vec![];
    for day in [yesterday, today] {
        rows.push(refresh_daily_stats(user_store, marketplace_store, day)?);
    }
    Ok(rows)
}

pub struct DailyStatsJob {
    interval: Duration,
}

impl DailyStatsJob {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn from_minutes(minutes: u64) -> Self {
        Self::new(Duration::from_secs(minutes.max(1) * 60))
    }
}

impl BackgroundJob for DailyStatsJob {
    fn id(&self) -> &'static str {
        "daily_stats"
    }

    fn name(&self) -> &'static str {
        "Daily Stats"
    }

    fn description(&self) -> &'static str {
        "Aggregate order, revenue and signup counts for today and yesterday"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Combined {
            interval: Some(self.interval),
            hooks: vec![HookEvent::OnStartup, HookEvent::OnOrderPlaced],
        }
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let rows =
            refresh_recent_daily_stats(ctx.user_store.as_ref(), ctx.marketplace_store.as_ref())?;
        for row in rows {
            info!(
                "Daily stats {}: {} orders, {} delivered, {} cancelled, {} cents, {} new users",
                row.date,
                row.orders_count,
                row.delivered_count,
                row.cancelled_count,
                row.revenue_cents,
                row.new_users
            );
        }
        Ok(())
    }
}
