use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mboga_pap_server::background_jobs::jobs::{AuthTokenPruningJob, DailyStatsJob};
use mboga_pap_server::background_jobs::{create_scheduler, JobContext};
use mboga_pap_server::client_state::{ClientStateService, FileStateStorage};
use mboga_pap_server::config;
use mboga_pap_server::marketplace::{MarketplaceStore, SqliteMarketplaceStore};
use mboga_pap_server::notifications::{NotificationHub, NotificationService};
use mboga_pap_server::oidc::OidcClient;
use mboga_pap_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig, ServerState};
use mboga_pap_server::user::{self, SqliteUserStore, UserManager};

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

fn parse_dir(s: &str) -> Result<PathBuf, String> {
    let path = parse_path(s)?;
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    Ok(path)
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory containing the database files (user.db, marketplace.db).
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_dir)]
    pub db_dir: Option<PathBuf>,

    /// Directory for per user carts and loyalty ledgers.
    /// Defaults to `client_state` inside the database directory.
    #[clap(long, value_parser = parse_path)]
    pub client_state_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Shared secret expected from the database change webhook.
    #[clap(long)]
    pub webhook_secret: Option<String>,

    /// Bearer token expected from the external cron caller.
    #[clap(long)]
    pub cron_secret: Option<String>,
}

impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            db_dir: args.db_dir.clone(),
            client_state_dir: args.client_state_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            webhook_secret: args.webhook_secret.clone(),
            cron_secret: args.cron_secret.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // TOML overrides CLI
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  db_dir: {:?}", app_config.db_dir);
    info!("  client_state_dir: {:?}", app_config.client_state_dir);
    info!("  port: {}", app_config.port);

    info!("Initializing metrics...");
    metrics::init_metrics();

    if !app_config.user_db_path().exists() {
        info!(
            "Creating new user database at {:?}",
            app_config.user_db_path()
        );
    }
    let user_store = Arc::new(SqliteUserStore::new(app_config.user_db_path())?);

    if !app_config.marketplace_db_path().exists() {
        info!(
            "Creating new marketplace database at {:?}",
            app_config.marketplace_db_path()
        );
    }
    let marketplace_store: Arc<dyn MarketplaceStore> = Arc::new(SqliteMarketplaceStore::new(
        app_config.marketplace_db_path(),
    )?);

    let state_storage = Arc::new(FileStateStorage::new(&app_config.client_state_dir)?);
    let client_state = Arc::new(ClientStateService::new(
        state_storage,
        app_config.reward_catalog.clone(),
    ));

    let notifications = Arc::new(NotificationService::new(
        user_store.clone(),
        Arc::new(NotificationHub::new()),
    ));
    let user_manager = Arc::new(UserManager::new(
        user_store.clone() as Arc<dyn user::FullUserStore>
    ));

    // Background job scheduler
    let shutdown_token = CancellationToken::new();
    let job_context = JobContext::new(
        shutdown_token.child_token(),
        user_store.clone() as Arc<dyn user::FullUserStore>,
        marketplace_store.clone(),
    );
    let (mut scheduler, scheduler_handle) = create_scheduler(shutdown_token.clone(), job_context);
    scheduler
        .register_job(Arc::new(DailyStatsJob::from_minutes(
            app_config.background_jobs.daily_stats_interval_minutes,
        )))
        .await;
    scheduler
        .register_job(Arc::new(AuthTokenPruningJob::from_settings(
            &app_config.background_jobs,
        )))
        .await;
    info!(
        "Job scheduler initialized with {} job(s)",
        scheduler.job_count().await
    );

    let oidc_client = match app_config.oidc.clone() {
        Some(oidc_config) => {
            info!("Discovering OIDC provider {}", oidc_config.provider_url);
            match OidcClient::new(oidc_config).await {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    error!("OIDC disabled, provider setup failed: {:#}", e);
                    None
                }
            }
        }
        None => None,
    };

    if app_config.webhook_secret.is_none() {
        warn!("No webhook secret configured, the order update webhook is disabled");
    }
    if app_config.cron_secret.is_none() {
        warn!("No cron secret configured, the daily stats cron endpoint is disabled");
    }

    let server_config = ServerConfig {
        requests_logging_level: app_config.logging_level.clone(),
        port: app_config.port,
        frontend_dir_path: app_config.frontend_dir_path.clone(),
        webhook_secret: app_config.webhook_secret.clone(),
        cron_secret: app_config.cron_secret.clone(),
    };
    let state = ServerState::new(
        server_config,
        user_manager,
        marketplace_store,
        client_state,
        notifications,
        Some(scheduler_handle),
        oidc_client,
    );

    info!("Ready to serve at port {}!", app_config.port);
    info!("Metrics available at port {}!", app_config.metrics_port);

    tokio::select! {
        result = run_server(state, app_config.metrics_port) => {
            info!("HTTP server stopped: {:?}", result);
            shutdown_token.cancel();
            result
        },
        _ = scheduler.run() => {
            info!("Scheduler stopped");
            Ok(())
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, initiating graceful shutdown");
            shutdown_token.cancel();
            // Give running jobs a moment to observe the cancellation
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(())
        }
    }
}
