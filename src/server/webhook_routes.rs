//! Endpoints called by machines: the external cron and the database
//! change webhook. Both authenticate with a shared secret and are disabled
//! when the secret is not configured.

use axum::{
    extract::State,
    http::HeaderMap,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use super::error::ApiError;
use super::state::ServerState;
use crate::background_jobs::jobs::refresh_recent_daily_stats;
use crate::marketplace::{DailyStats, OrderStatus, OrderStore};

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Tables whose changes concern orders.
const ORDER_TABLES: &[&str] = &["orders", "customer_order"];

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeType {
    Insert,
    Update,
    Delete,
}

#[derive(Deserialize, Debug)]
pub struct RecordRef {
    pub id: String,
    pub status: Option<String>,
}

/// Row change notification, in the shape database webhooks send.
#[derive(Deserialize, Debug)]
pub struct ChangePayload {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub table: String,
    pub record: Option<RecordRef>,
    pub old_record: Option<RecordRef>,
}

#[derive(Serialize)]
struct CronResponse {
    refreshed: Vec<DailyStats>,
}

#[derive(Serialize)]
struct WebhookResponse {
    notified: usize,
}

/// Disabled endpoints look like they do not exist.
fn check_secret(expected: Option<&str>, provided: Option<&str>) -> Result<(), ApiError> {
    let expected = expected.ok_or(ApiError::NotFound)?;
    match provided {
        Some(p) if bool::from(p.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(ApiError::Forbidden),
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn cron_daily_stats(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> Result<Json<CronResponse>, ApiError> {
    check_secret(state.config.cron_secret.as_deref(), bearer_token(&headers))?;

    let refreshed = refresh_recent_daily_stats(
        state.user_manager.store().as_ref(),
        state.marketplace_store.as_ref(),
    )?;
    info!("Cron refreshed {} daily stats rows", refreshed.len());
    Ok(Json(CronResponse { refreshed }))
}

/// Status the order had before this change. None for a new order.
fn previous_status(payload: &ChangePayload) -> Result<Option<OrderStatus>, ApiError> {
    match payload.change_type {
        ChangeType::Insert => Ok(None),
        _ => {
            let raw = payload
                .old_record
                .as_ref()
                .and_then(|r| r.status.as_deref())
                .ok_or_else(|| ApiError::BadRequest("old_record.status is required".to_string()))?;
            OrderStatus::from_str(raw)
                .map(Some)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown order status {}", raw)))
        }
    }
}

async fn order_update_webhook(
    State(state): State<ServerState>,
    headers: HeaderMap,
    Json(payload): Json<ChangePayload>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let provided = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok());
    check_secret(state.config.webhook_secret.as_deref(), provided)?;

    if !ORDER_TABLES.contains(&payload.table.as_str()) || payload.change_type == ChangeType::Delete
    {
        debug!(
            "Ignoring {:?} change on table {}",
            payload.change_type, payload.table
        );
        return Ok(Json(WebhookResponse { notified: 0 }));
    }

    let order_id = payload
        .record
        .as_ref()
        .map(|r| r.id.clone())
        .ok_or_else(|| ApiError::BadRequest("record.id is required".to_string()))?;
    let previous = previous_status(&payload)?;

    // The stored row is authoritative, the payload only names it.
    let order = state
        .marketplace_store
        .get_order(&order_id)?
        .ok_or(ApiError::NotFound)?;

    let notified = match state
        .notifications
        .fan_out_order_update(&order, previous)
        .await
    {
        Ok(created) => created.len(),
        Err(e) => {
            warn!("Webhook fan-out for order {} failed: {:#}", order.id, e);
            return Err(ApiError::Internal(e));
        }
    };
    Ok(Json(WebhookResponse { notified }))
}

pub fn make_integration_routes(state: ServerState) -> Router {
    Router::new()
        .route("/cron/daily-stats", post(cron_daily_stats))
        .route("/webhooks/order-update", post(order_update_webhook))
        .with_state(state)
}
