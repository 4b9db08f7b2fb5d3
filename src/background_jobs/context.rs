use crate::marketplace::MarketplaceStore;
use crate::user::FullUserStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared resources handed to jobs, plus the token telling them to stop.
#[derive(Clone)]
pub struct JobContext {
    pub cancellation_token: CancellationToken,
    pub user_store: Arc<dyn FullUserStore>,
    pub marketplace_store: Arc<dyn MarketplaceStore>,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        user_store: Arc<dyn FullUserStore>,
        marketplace_store: Arc<dyn MarketplaceStore>,
    ) -> Self {
        Self {
            cancellation_token,
            user_store,
            marketplace_store,
        }
    }

    /// Same stores, different token.
    pub fn with_token(&self, cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            user_store: Arc::clone(&self.user_store),
            marketplace_store: Arc::clone(&self.marketplace_store),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
