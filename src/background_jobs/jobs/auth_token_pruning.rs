use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::user::UserAuthTokenStore;
use std::time::Duration;
use tracing::info;

/// Deletes session tokens nobody used for a while.
pub struct AuthTokenPruningJob {
    interval: Duration,
    unused_days: u64,
}

impl AuthTokenPruningJob {
    pub fn new(interval: Duration, unused_days: u64) -> Self {
        Self {
            interval,
            unused_days,
        }
    }

    pub fn from_settings(settings: &crate::config::BackgroundJobsSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.token_pruning_interval_hours.max(1) * 60 * 60),
            settings.token_unused_days,
        )
    }
}

impl BackgroundJob for AuthTokenPruningJob {
    fn id(&self) -> &'static str {
        "auth_token_pruning"
    }

    fn name(&self) -> &'static str {
        "Auth Token Pruning"
    }

    fn description(&self) -> &'static str {
        "Delete session tokens that have not been used recently"
    }

    fn schedule(&self) -> JobSchedule {
        JobSchedule::Interval(self.interval)
    }

    fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let deleted = ctx.user_store.prune_unused_auth_tokens(self.unused_days)?;
        if deleted > 0 {
            info!(
                "Pruned {} auth tokens unused for {} days",
                deleted, self.unused_days
            );
        }
        Ok(())
    }
}
