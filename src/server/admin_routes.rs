use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;

use super::error::ApiError;
use super::session::Session;
use super::state::{GuardedMarketplaceStore, OptionalSchedulerHandle, ServerState};
use crate::background_jobs::{JobInfo, SchedulerHandle};
use crate::marketplace::{DailyStats, DailyStatsStore};
use crate::user::Permission;

const DEFAULT_STATS_DAYS: usize = 30;
const MAX_STATS_DAYS: usize = 365;

#[derive(Deserialize, Debug)]
struct StatsQuery {
    days: Option<usize>,
}

fn scheduler(handle: &OptionalSchedulerHandle) -> Result<&SchedulerHandle, ApiError> {
    handle
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Background jobs are not running".to_string()))
}

async fn list_jobs(
    session: Session,
    State(handle): State<OptionalSchedulerHandle>,
) -> Result<Json<Vec<JobInfo>>, ApiError> {
    session.require(Permission::ServerAdmin)?;
    Ok(Json(scheduler(&handle)?.list_jobs().await))
}

async fn get_job(
    session: Session,
    State(handle): State<OptionalSchedulerHandle>,
    Path(id): Path<String>,
) -> Result<Json<JobInfo>, ApiError> {
    session.require(Permission::ServerAdmin)?;
    scheduler(&handle)?
        .get_job(&id)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn trigger_job(
    session: Session,
    State(handle): State<OptionalSchedulerHandle>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    session.require(Permission::ServerAdmin)?;
    scheduler(&handle)?.trigger_job(&id).await?;
    info!("Admin {} triggered job {}", session.user_id, id);
    Ok(StatusCode::ACCEPTED)
}

async fn get_stats(
    session: Session,
    State(store): State<GuardedMarketplaceStore>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<Vec<DailyStats>>, ApiError> {
    session.require(Permission::ViewAnalytics)?;
    let days = query
        .days
        .unwrap_or(DEFAULT_STATS_DAYS)
        .clamp(1, MAX_STATS_DAYS);
    Ok(Json(store.get_daily_stats(days)?))
}

pub fn make_admin_routes(state: ServerState) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/trigger", post(trigger_job))
        .route("/stats", get(get_stats))
        .with_state(state)
}
