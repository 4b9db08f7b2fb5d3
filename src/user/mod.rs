pub mod auth;
pub mod permissions;
mod sqlite_user_store;
mod user_manager;
pub mod user_models;
mod user_store;

pub use auth::{AuthToken, AuthTokenValue, PasswordCredentials, PasswordHasherKind};
pub use permissions::{Permission, UserRole};
pub use sqlite_user_store::{SqliteUserStore, MAX_NOTIFICATIONS_PER_USER};
pub use user_manager::{AccountError, ResolvedSession, SignupRequest, UserManager};
pub use user_models::{
    CustomerProfile, Profile, ProfileUpdate, RiderProfile, User, VendorProfile, VendorSummary,
};
pub use user_store::{UserAuthCredentialsStore, UserAuthTokenStore, UserStore};

use crate::notifications::NotificationStore;

/// Everything the server needs from the user database.
pub trait FullUserStore: UserStore + NotificationStore {}

impl<T: UserStore + NotificationStore> FullUserStore for T {}
