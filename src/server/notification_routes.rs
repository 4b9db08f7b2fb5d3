//! Notification inbox and the realtime stream.

use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use serde_json::json;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::error::ApiError;
use super::metrics;
use super::session::Session;
use super::state::{GuardedUserManager, ServerState};
use crate::notifications::{Notification, NotificationHub, NotificationStore};

#[derive(Serialize)]
struct UnreadCountResponse {
    unread_count: usize,
}

#[derive(Serialize)]
struct ReadAllResponse {
    marked_read: usize,
}

async fn list_notifications(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(
        user_manager
            .store()
            .get_user_notifications(session.user_id)?,
    ))
}

async fn get_unread_count(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let unread_count = user_manager.store().get_unread_count(session.user_id)?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

async fn mark_read(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Path(id): Path<String>,
) -> Result<Json<Notification>, ApiError> {
    user_manager
        .store()
        .mark_notification_read(&id, session.user_id)?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn mark_all_read(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Result<Json<ReadAllResponse>, ApiError> {
    let marked_read = user_manager
        .store()
        .mark_all_notifications_read(session.user_id)?;
    Ok(Json(ReadAllResponse { marked_read }))
}

/// Keeps the stream gauge and the hub channels in sync with open streams.
struct StreamGuard {
    user_id: usize,
    hub: Arc<NotificationHub>,
}

impl StreamGuard {
    fn new(user_id: usize, hub: Arc<NotificationHub>) -> Self {
        metrics::notification_stream_opened();
        Self { user_id, hub }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        metrics::notification_stream_closed();
        debug!("Notification stream of user {} closed", self.user_id);
        let hub = self.hub.clone();
        let user_id = self.user_id;
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move { hub.prune(user_id).await });
        }
    }
}

fn notification_event(notification: &Notification) -> Option<Event> {
    match Event::default()
        .event("notification")
        .id(notification.id.clone())
        .json_data(notification)
    {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Cannot encode notification {}: {}", notification.id, e);
            None
        }
    }
}

/// Turns a hub subscription into SSE events. Lagging receivers skip what
/// they missed, the inbox still has it.
fn notification_events(
    receiver: broadcast::Receiver<Notification>,
    guard: StreamGuard,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
        loop {
            match receiver.recv().await {
                Ok(notification) => {
                    if let Some(event) = notification_event(&notification) {
                        return Some((Ok(event), (receiver, guard)));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "Notification stream of user {} skipped {} notifications",
                        guard.user_id, skipped
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}

async fn stream_notifications(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let unread_count = state.user_manager.store().get_unread_count(session.user_id)?;
    let hub = state.notifications.hub().clone();
    let receiver = hub.subscribe(session.user_id).await;
    let guard = StreamGuard::new(session.user_id, hub);
    debug!("Notification stream of user {} opened", session.user_id);

    let ready = Event::default()
        .event("ready")
        .data(json!({ "unread_count": unread_count }).to_string());
    let events = stream::once(async move { Ok(ready) }).chain(notification_events(receiver, guard));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

pub fn make_notification_routes(state: ServerState) -> Router {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(get_unread_count))
        .route("/read-all", post(mark_all_read))
        .route("/stream", get(stream_notifications))
        .route("/{id}/read", post(mark_read))
        .with_state(state)
}
