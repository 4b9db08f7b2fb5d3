use super::auth::{AuthToken, AuthTokenValue, PasswordCredentials};
use super::user_models::{Profile, User, VendorSummary};
use anyhow::Result;

pub trait UserAuthCredentialsStore: Send + Sync {
    /// Returns the password credentials of the user with the given handle.
    /// Returns Ok(None) if the user does not exist or has no password.
    fn get_password_credentials(&self, user_handle: &str) -> Result<Option<PasswordCredentials>>;

    /// Inserts or replaces the password credentials of a user.
    fn set_password_credentials(&self, credentials: &PasswordCredentials) -> Result<()>;

    /// Records a successful password login.
    fn touch_password_credentials(&self, user_id: usize) -> Result<()>;
}

pub trait UserAuthTokenStore: Send + Sync {
    /// Returns Ok(None) if the token does not exist.
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Deletes a token, returning it if it existed.
    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()>;

    fn add_user_auth_token(&self, token: &AuthToken) -> Result<()>;

    /// Deletes tokens that have not been used for `unused_for_days`.
    /// A token that was never used counts from its creation time.
    /// Returns the number of deleted tokens.
    fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> Result<usize>;
}

pub trait UserStore: UserAuthTokenStore + UserAuthCredentialsStore + Send + Sync {
    /// Creates a user together with its role profile, returns the user id.
    fn create_user(&self, user_handle: &str, display_name: &str, profile: &Profile)
        -> Result<usize>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: usize) -> Result<Option<User>>;

    fn get_user_id(&self, user_handle: &str) -> Result<Option<usize>>;

    fn get_user_profile(&self, user_id: usize) -> Result<Option<Profile>>;

    /// Replaces the role profile. The profile variant must match the user's role.
    fn update_user_profile(&self, user_id: usize, profile: &Profile) -> Result<()>;

    fn update_display_name(&self, user_id: usize, display_name: &str) -> Result<()>;

    fn list_vendors(&self) -> Result<Vec<VendorSummary>>;

    fn get_vendor(&self, vendor_id: usize) -> Result<Option<VendorSummary>>;

    /// Returns the user linked to an identity provider subject.
    fn get_user_id_by_oidc_subject(&self, subject: &str) -> Result<Option<usize>>;

    fn link_oidc_subject(&self, user_id: usize, subject: &str) -> Result<()>;

    /// Counts users created in `[start, end)`, unix seconds.
    fn count_users_created_between(&self, start: i64, end: i64) -> Result<usize>;
}
