use axum::extract::FromRef;

use crate::background_jobs::SchedulerHandle;
use crate::client_state::ClientStateService;
use crate::marketplace::MarketplaceStore;
use crate::notifications::NotificationService;
use crate::oidc::{AuthStateStore, OidcClient};
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUserManager = Arc<UserManager>;
pub type GuardedMarketplaceStore = Arc<dyn MarketplaceStore>;
pub type GuardedClientState = Arc<ClientStateService>;
pub type GuardedNotificationService = Arc<NotificationService>;
pub type OptionalSchedulerHandle = Option<SchedulerHandle>;
pub type OptionalOidcClient = Option<Arc<OidcClient>>;
pub type GuardedAuthStateStore = Arc<AuthStateStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub hash: String,
    pub user_manager: GuardedUserManager,
    pub marketplace_store: GuardedMarketplaceStore,
    pub client_state: GuardedClientState,
    pub notifications: GuardedNotificationService,
    pub scheduler_handle: OptionalSchedulerHandle,
    pub oidc_client: OptionalOidcClient,
    pub auth_state_store: GuardedAuthStateStore,
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedMarketplaceStore {
    fn from_ref(input: &ServerState) -> Self {
        input.marketplace_store.clone()
    }
}

impl FromRef<ServerState> for GuardedClientState {
    fn from_ref(input: &ServerState) -> Self {
        input.client_state.clone()
    }
}

impl FromRef<ServerState> for GuardedNotificationService {
    fn from_ref(input: &ServerState) -> Self {
        input.notifications.clone()
    }
}

impl FromRef<ServerState> for OptionalSchedulerHandle {
    fn from_ref(input: &ServerState) -> Self {
        input.scheduler_handle.clone()
    }
}

impl FromRef<ServerState> for OptionalOidcClient {
    fn from_ref(input: &ServerState) -> Self {
        input.oidc_client.clone()
    }
}

impl FromRef<ServerState> for GuardedAuthStateStore {
    fn from_ref(input: &ServerState) -> Self {
        input.auth_state_store.clone()
    }
}
