use super::{
    auth::{AuthToken, AuthTokenValue, PasswordCredentials},
    permissions::UserRole,
    user_models::{Profile, ProfileUpdate, User},
    FullUserStore, UserAuthCredentialsStore, UserAuthTokenStore, UserStore,
};
use anyhow::Result;
use serde::Deserialize;
use std::{sync::Arc, time::SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MIN_PASSWORD_LENGTH: usize = 6;
const MAX_HANDLE_LENGTH: usize = 64;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    pub handle: String,
    pub password: String,
    pub role: UserRole,
    pub display_name: String,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub location: Option<String>,
    pub vehicle_type: Option<String>,
}

impl SignupRequest {
    fn profile(&self) -> Profile {
        match self.role {
            UserRole::Customer => Profile::Customer(super::CustomerProfile {
                phone: self.phone.clone(),
                default_address: self.location.clone(),
            }),
            UserRole::Vendor => Profile::Vendor(super::VendorProfile {
                business_name: self.business_name.clone().unwrap_or_default(),
                location: self.location.clone(),
                phone: self.phone.clone(),
                description: None,
                is_open: true,
            }),
            UserRole::Rider => Profile::Rider(super::RiderProfile {
                vehicle_type: self.vehicle_type.clone(),
                phone: self.phone.clone(),
                is_available: true,
            }),
            UserRole::Admin => Profile::Admin,
        }
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Handle must be 1 to 64 characters of letters, digits, '-', '_' or '.'")]
    InvalidHandle,
    #[error("Handle {0} is already taken")]
    HandleTaken(String),
    #[error("Password must be at least 6 characters")]
    WeakPassword,
    #[error("Display name cannot be empty")]
    EmptyDisplayName,
    #[error("Role {0:?} cannot sign up")]
    RoleNotAllowed(UserRole),
    #[error("Vendors must provide a business name")]
    MissingBusinessName,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

fn is_valid_handle(handle: &str) -> bool {
    !handle.is_empty()
        && handle.len() <= MAX_HANDLE_LENGTH
        && handle
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

/// Turns an arbitrary identity provider name into something usable as a handle.
fn handle_from_hint(hint: &str) -> String {
    let cleaned: String = hint
        .split('@')
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .take(MAX_HANDLE_LENGTH - 8)
        .collect();
    if cleaned.is_empty() {
        "user".to_string()
    } else {
        cleaned.to_lowercase()
    }
}

/// A resolved session: the token and the user it belongs to.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub token: AuthToken,
    pub user: User,
}

pub struct UserManager {
    user_store: Arc<dyn FullUserStore>,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn FullUserStore>) -> Self {
        Self { user_store }
    }

    pub fn store(&self) -> &Arc<dyn FullUserStore> {
        &self.user_store
    }

    /// Creates a password account and its role profile.
    pub fn signup(&self, request: &SignupRequest) -> Result<usize, AccountError> {
        let handle = request.handle.trim();
        if !is_valid_handle(handle) {
            return Err(AccountError::InvalidHandle);
        }
        if !request.role.is_self_service() {
            return Err(AccountError::RoleNotAllowed(request.role));
        }
        if request.password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AccountError::WeakPassword);
        }
        let display_name = request.display_name.trim();
        if display_name.is_empty() {
            return Err(AccountError::EmptyDisplayName);
        }
        if request.role == UserRole::Vendor
            && request
                .business_name
                .as_deref()
                .map(str::trim)
                .unwrap_or_default()
                .is_empty()
        {
            return Err(AccountError::MissingBusinessName);
        }
        if self.user_store.get_user_id(handle)?.is_some() {
            return Err(AccountError::HandleTaken(handle.to_string()));
        }

        let user_id = self
            .user_store
            .create_user(handle, display_name, &request.profile())?;
        let credentials = PasswordCredentials::new(user_id, &request.password)?;
        self.user_store.set_password_credentials(&credentials)?;
        Ok(user_id)
    }

    /// Returns a fresh token, or None when the handle or password is wrong.
    pub fn login(&self, user_handle: &str, password: &str) -> Result<Option<AuthToken>> {
        let credentials = match self.user_store.get_password_credentials(user_handle)? {
            Some(c) => c,
            None => {
                debug!("Login attempt for unknown handle {}", user_handle);
                return Ok(None);
            }
        };
        if !credentials.verify(password) {
            debug!("Wrong password for {}", user_handle);
            return Ok(None);
        }
        self.user_store
            .touch_password_credentials(credentials.user_id)?;
        Ok(Some(self.issue_token(credentials.user_id)?))
    }

    /// Logs in the user linked to an identity provider subject, creating the
    /// account and its role profile on first sight.
    pub fn login_or_provision_oidc(
        &self,
        subject: &str,
        handle_hint: &str,
        display_name: &str,
        role: UserRole,
    ) -> Result<(AuthToken, bool)> {
        if let Some(user_id) = self.user_store.get_user_id_by_oidc_subject(subject)? {
            return Ok((self.issue_token(user_id)?, false));
        }

        let role = if role.is_self_service() {
            role
        } else {
            warn!("Refusing to provision {:?} through OIDC, using customer", role);
            UserRole::Customer
        };
        let base = handle_from_hint(handle_hint);
        let mut handle = base.clone();
        let mut attempt = 1;
        while self.user_store.get_user_id(&handle)?.is_some() {
            attempt += 1;
            handle = format!("{}-{}", base, attempt);
        }
        let display_name = if display_name.trim().is_empty() {
            handle.clone()
        } else {
            display_name.trim().to_string()
        };

        let user_id = self.user_store.create_user(
            &handle,
            &display_name,
            &Profile::default_for(role, &display_name),
        )?;
        self.user_store.link_oidc_subject(user_id, subject)?;
        info!(
            "Provisioned {} account {} from identity provider",
            role.as_str(),
            handle
        );
        Ok((self.issue_token(user_id)?, true))
    }

    pub fn issue_token(&self, user_id: usize) -> Result<AuthToken> {
        let token = AuthToken {
            user_id,
            value: AuthTokenValue::generate(),
            created: SystemTime::now(),
            last_used: None,
        };
        self.user_store.add_user_auth_token(&token)?;
        Ok(token)
    }

    /// Looks up a token and marks it used.
    pub fn resolve_token(&self, value: &AuthTokenValue) -> Result<Option<ResolvedSession>> {
        let token = match self.user_store.get_user_auth_token(value)? {
            Some(t) => t,
            None => return Ok(None),
        };
        let user = match self.user_store.get_user(token.user_id)? {
            Some(u) => u,
            None => return Ok(None),
        };
        self.user_store
            .update_user_auth_token_last_used_timestamp(value)?;
        Ok(Some(ResolvedSession { token, user }))
    }

    pub fn revoke_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        self.user_store.delete_user_auth_token(value)
    }

    pub fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        self.user_store.get_user(user_id)
    }

    pub fn get_profile(&self, user_id: usize) -> Result<Option<Profile>> {
        self.user_store.get_user_profile(user_id)
    }

    /// Applies a partial update and returns the stored profile.
    pub fn update_profile(
        &self,
        user_id: usize,
        update: &ProfileUpdate,
    ) -> Result<Option<Profile>> {
        let mut profile = match self.user_store.get_user_profile(user_id)? {
            Some(p) => p,
            None => return Ok(None),
        };
        if let Some(display_name) = update.display_name.as_deref().map(str::trim) {
            if !display_name.is_empty() {
                self.user_store.update_display_name(user_id, display_name)?;
            }
        }
        update.apply_to(&mut profile);
        self.user_store.update_user_profile(user_id, &profile)?;
        Ok(Some(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::SqliteUserStore;
    use tempfile::TempDir;

    fn make_manager() -> (UserManager, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteUserStore::new(dir.path().join("user.db")).unwrap();
        (UserManager::new(Arc::new(store)), dir)
    }

    fn signup_request(handle: &str, role: UserRole) -> SignupRequest {
        SignupRequest {
            handle: handle.to_string(),
            password: "secret-pw".to_string(),
            role,
            display_name: "Display".to_string(),
            phone: Some("0711000000".to_string()),
            business_name: Some("Biz".to_string()),
            location: Some("Kibera".to_string()),
            vehicle_type: Some("bicycle".to_string()),
        }
    }

    #[test]
    fn signup_then_login() {
        let (manager, _dir) = make_manager();
        let id = manager
            .signup(&signup_request("achieng", UserRole::Customer))
            .unwrap();

        let token = manager.login("achieng", "secret-pw").unwrap().unwrap();
        assert_eq!(token.user_id, id);
        assert!(manager.login("achieng", "wrong-pw").unwrap().is_none());
        assert!(manager.login("nobody", "secret-pw").unwrap().is_none());

        let session = manager.resolve_token(&token.value).unwrap().unwrap();
        assert_eq!(session.user.id, id);
        assert_eq!(session.user.role, UserRole::Customer);
    }

    #[test]
    fn signup_validation() {
        let (manager, _dir) = make_manager();

        let mut req = signup_request("bad handle!", UserRole::Customer);
        assert!(matches!(
            manager.signup(&req),
            Err(AccountError::InvalidHandle)
        ));

        req = signup_request("ok", UserRole::Admin);
        assert!(matches!(
            manager.signup(&req),
            Err(AccountError::RoleNotAllowed(UserRole::Admin))
        ));

        req = signup_request("ok", UserRole::Customer);
        req.password = "123".to_string();
        assert!(matches!(manager.signup(&req), Err(AccountError::WeakPassword)));

        req = signup_request("ok", UserRole::Vendor);
        req.business_name = Some("   ".to_string());
        assert!(matches!(
            manager.signup(&req),
            Err(AccountError::MissingBusinessName)
        ));

        req = signup_request("ok", UserRole::Rider);
        manager.signup(&req).unwrap();
        assert!(matches!(
            manager.signup(&req),
            Err(AccountError::HandleTaken(_))
        ));
    }

    #[test]
    fn signup_provisions_role_profile() {
        let (manager, _dir) = make_manager();
        let id = manager
            .signup(&signup_request("mama-mboga", UserRole::Vendor))
            .unwrap();
        match manager.get_profile(id).unwrap().unwrap() {
            Profile::Vendor(v) => {
                assert_eq!(v.business_name, "Biz");
                assert_eq!(v.location.as_deref(), Some("Kibera"));
                assert!(v.is_open);
            }
            other => panic!("unexpected profile {:?}", other),
        }
    }

    #[test]
    fn revoked_token_no_longer_resolves() {
        let (manager, _dir) = make_manager();
        manager
            .signup(&signup_request("rider1", UserRole::Rider))
            .unwrap();
        let token = manager.login("rider1", "secret-pw").unwrap().unwrap();
        assert!(manager.revoke_token(&token.value).unwrap().is_some());
        assert!(manager.resolve_token(&token.value).unwrap().is_none());
    }

    #[test]
    fn oidc_provisions_once_and_dedupes_handles() {
        let (manager, _dir) = make_manager();
        manager
            .signup(&signup_request("wafula", UserRole::Customer))
            .unwrap();

        let (token, created) = manager
            .login_or_provision_oidc("sub-1", "Wafula@example.com", "Wafula W", UserRole::Vendor)
            .unwrap();
        assert!(created);
        let user = manager.get_user(token.user_id).unwrap().unwrap();
        assert_eq!(user.handle, "wafula-2");
        assert_eq!(user.role, UserRole::Vendor);
        assert!(matches!(
            manager.get_profile(user.id).unwrap(),
            Some(Profile::Vendor(_))
        ));

        let (again, created) = manager
            .login_or_provision_oidc("sub-1", "whatever", "", UserRole::Rider)
            .unwrap();
        assert!(!created);
        assert_eq!(again.user_id, user.id);
        assert_ne!(again.value, token.value);
    }

    #[test]
    fn oidc_never_provisions_admins() {
        let (manager, _dir) = make_manager();
        let (token, _) = manager
            .login_or_provision_oidc("sub-x", "", "", UserRole::Admin)
            .unwrap();
        let user = manager.get_user(token.user_id).unwrap().unwrap();
        assert_eq!(user.role, UserRole::Customer);
        assert_eq!(user.handle, "user");
    }

    #[test]
    fn update_profile_merges_fields() {
        let (manager, _dir) = make_manager();
        let id = manager
            .signup(&signup_request("shopper", UserRole::Customer))
            .unwrap();
        let updated = manager
            .update_profile(
                id,
                &ProfileUpdate {
                    display_name: Some("New Name".to_string()),
                    default_address: Some("Ngong Road".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(
            updated,
            Profile::Customer(crate::user::CustomerProfile {
                phone: Some("0711000000".to_string()),
                default_address: Some("Ngong Road".to_string()),
            })
        );
        assert_eq!(
            manager.get_user(id).unwrap().unwrap().display_name,
            "New Name"
        );
        assert!(manager
            .update_profile(999, &ProfileUpdate::default())
            .unwrap()
            .is_none());
    }
}
