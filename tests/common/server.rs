//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own databases, an in memory
//! client state and a running job scheduler.

use super::constants::*;
use super::fixtures::{create_test_dbs, SeededIds};
use mboga_pap_server::background_jobs::jobs::{AuthTokenPruningJob, DailyStatsJob};
use mboga_pap_server::background_jobs::{create_scheduler, JobContext};
use mboga_pap_server::client_state::{ClientStateService, MemoryStateStorage};
use mboga_pap_server::config::BackgroundJobsSettings;
use mboga_pap_server::loyalty::RewardCatalog;
use mboga_pap_server::marketplace::{MarketplaceStore, SqliteMarketplaceStore};
use mboga_pap_server::notifications::{NotificationHub, NotificationService};
use mboga_pap_server::server::{
    make_app, RequestsLoggingLevel, ServerConfig, ServerState,
};
use mboga_pap_server::user::{FullUserStore, SqliteUserStore, UserManager};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Test server instance with isolated databases
///
/// When dropped, the server and the scheduler shut down and temp resources
/// are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Ids of the seeded users and products
    pub ids: SeededIds,

    /// Stores for direct database access in tests
    pub user_store: Arc<dyn FullUserStore>,
    pub marketplace_store: Arc<dyn MarketplaceStore>,

    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    shutdown_token: CancellationToken,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if the databases cannot be seeded, the port cannot be bound
    /// or the server does not become ready within the timeout.
    pub async fn spawn() -> Self {
        let (temp_db_dir, user_db_path, marketplace_db_path, ids) =
            create_test_dbs().expect("Failed to create test databases");

        let sqlite_user_store =
            Arc::new(SqliteUserStore::new(&user_db_path).expect("Failed to open user store"));
        let user_store: Arc<dyn FullUserStore> = sqlite_user_store.clone();
        let marketplace_store: Arc<dyn MarketplaceStore> = Arc::new(
            SqliteMarketplaceStore::new(&marketplace_db_path)
                .expect("Failed to open marketplace store"),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let shutdown_token = CancellationToken::new();
        let job_context = JobContext::new(
            shutdown_token.child_token(),
            user_store.clone(),
            marketplace_store.clone(),
        );
        let (mut scheduler, scheduler_handle) =
            create_scheduler(shutdown_token.clone(), job_context);
        scheduler
            .register_job(Arc::new(DailyStatsJob::from_minutes(60)))
            .await;
        scheduler
            .register_job(Arc::new(AuthTokenPruningJob::from_settings(
                &BackgroundJobsSettings::default(),
            )))
            .await;
        tokio::spawn(async move { scheduler.run().await });

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            frontend_dir_path: None,
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            cron_secret: Some(CRON_SECRET.to_string()),
        };
        let notifications = Arc::new(NotificationService::new(
            sqlite_user_store,
            Arc::new(NotificationHub::new()),
        ));
        let client_state = Arc::new(ClientStateService::new(
            Arc::new(MemoryStateStorage::new()),
            RewardCatalog::default(),
        ));
        let state = ServerState::new(
            config,
            Arc::new(UserManager::new(user_store.clone())),
            marketplace_store.clone(),
            client_state,
            notifications,
            Some(scheduler_handle),
            None, // oidc_client
        );
        let app = make_app(state);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            ids,
            user_store,
            marketplace_store,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
            shutdown_token,
        };

        server.wait_for_ready().await;

        server
    }

    /// Polls the info endpoint until it answers.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/v1/info", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.shutdown_token.cancel();
    }
}
