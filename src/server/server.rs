use anyhow::{Context, Result};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::State,
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::services::ServeDir;
use tracing::info;

use super::admin_routes::make_admin_routes;
use super::auth_routes::make_auth_routes;
use super::marketplace_routes::make_marketplace_routes;
use super::me_routes::{make_loyalty_routes, make_me_routes};
use super::metrics::metrics_handler;
use super::notification_routes::make_notification_routes;
use super::webhook_routes::make_integration_routes;
use super::{log_requests, route_guard, state::*, ServerConfig};
use crate::background_jobs::SchedulerHandle;
use crate::client_state::ClientStateService;
use crate::marketplace::MarketplaceStore;
use crate::notifications::NotificationService;
use crate::oidc::{AuthStateStore, OidcClient};
use crate::server::session::Session;
use crate::user::UserManager;

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
    pub session_token: Option<String>,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

async fn home(session: Option<Session>, State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
        session_token: session.map(|s| s.token),
    };
    Json(stats)
}

impl ServerState {
    pub fn new(
        config: ServerConfig,
        user_manager: Arc<UserManager>,
        marketplace_store: Arc<dyn MarketplaceStore>,
        client_state: Arc<ClientStateService>,
        notifications: Arc<NotificationService>,
        scheduler_handle: Option<SchedulerHandle>,
        oidc_client: Option<Arc<OidcClient>>,
    ) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            hash: env!("MBOGA_GIT_HASH").to_owned(),
            user_manager,
            marketplace_store,
            client_state,
            notifications,
            scheduler_handle,
            oidc_client,
            auth_state_store: Arc::new(AuthStateStore::new()),
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let home_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new()
                .route("/v1/info", get(home))
                .with_state(state.clone())
                .fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .route("/v1/info", get(home))
            .with_state(state.clone()),
    };

    home_router
        .nest("/v1/auth", make_auth_routes(state.clone()))
        .nest("/v1", make_marketplace_routes(state.clone()))
        .nest("/v1/me", make_me_routes(state.clone()))
        .nest("/v1/loyalty", make_loyalty_routes(state.clone()))
        .nest("/v1/notifications", make_notification_routes(state.clone()))
        .nest("/v1/admin", make_admin_routes(state.clone()))
        .nest("/api", make_integration_routes(state.clone()))
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .layer(middleware::from_fn_with_state(state, log_requests))
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics_handler))
}

/// Serves the app and, on a separate port, the Prometheus endpoint.
pub async fn run_server(state: ServerState, metrics_port: u16) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Cannot bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Cannot bind metrics port {}", metrics_port))?;
    info!("Listening on {:?}", listener.local_addr()?);

    tokio::try_join!(
        axum::serve(listener, app),
        axum::serve(metrics_listener, make_metrics_app()),
    )?;
    Ok(())
}
