//! OpenID Connect login against the hosted identity provider.
//!
//! The flow is authorization code with PKCE. The state produced by
//! [`OidcClient::authorize_url`] is kept server-side in an [`AuthStateStore`]
//! until the provider redirects back to the callback, together with the role
//! the user asked to sign up as.

use anyhow::{anyhow, Context, Result};
use openidconnect::core::{CoreAuthenticationFlow, CoreClient, CoreIdTokenClaims, CoreProviderMetadata};
use openidconnect::{
    AuthorizationCode, ClientId, ClientSecret, CsrfToken, IssuerUrl, Nonce, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::OidcConfig;
use crate::user::UserRole;

/// How long a pending login may wait for the provider callback.
pub const AUTH_STATE_TTL_SECS: i64 = 300;

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .context("Failed to create HTTP client")
}

/// Pending login, stored between the redirect to the provider and the callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    pub csrf_token: String,
    pub nonce: String,
    pub pkce_verifier: String,
    /// Role a new account is provisioned with.
    pub role: UserRole,
    /// Page to land on after login.
    pub redirect: Option<String>,
    pub created_at: i64,
}

impl AuthState {
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.created_at > AUTH_STATE_TTL_SECS
    }
}

#[derive(Debug, Clone)]
pub struct AuthResult {
    pub subject: String,
    pub email: Option<String>,
    pub preferred_username: Option<String>,
    pub name: Option<String>,
}

impl AuthResult {
    /// Handle suggestion for a freshly provisioned account.
    pub fn handle_hint(&self) -> String {
        self.preferred_username
            .clone()
            .or_else(|| {
                self.email
                    .as_ref()
                    .and_then(|e| e.split('@').next().map(str::to_string))
            })
            .unwrap_or_else(|| format!("user-{}", self.subject))
    }

    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.preferred_username.clone())
            .unwrap_or_else(|| self.handle_hint())
    }
}

pub struct OidcClient {
    provider_metadata: CoreProviderMetadata,
    client_id: ClientId,
    client_secret: Option<ClientSecret>,
    redirect_url: RedirectUrl,
    scopes: Vec<String>,
}

impl OidcClient {
    /// Discovers the provider metadata. Fails if the provider is unreachable.
    pub async fn new(config: OidcConfig) -> Result<Self> {
        info!("Initializing OIDC client for provider {}", config.provider_url);

        let issuer_url =
            IssuerUrl::new(config.provider_url.clone()).context("Invalid OIDC provider URL")?;
        let http = http_client()?;
        let provider_metadata = CoreProviderMetadata::discover_async(issuer_url, &http)
            .await
            .context("Failed to discover OIDC provider metadata")?;

        let redirect_url =
            RedirectUrl::new(config.redirect_uri.clone()).context("Invalid OIDC redirect URI")?;

        Ok(Self {
            provider_metadata,
            client_id: ClientId::new(config.client_id),
            client_secret: config.client_secret.map(ClientSecret::new),
            redirect_url,
            scopes: config.scopes,
        })
    }

    /// Returns the provider URL to send the user to and the state to keep
    /// until the callback.
    pub fn authorize_url(
        &self,
        role: UserRole,
        redirect: Option<String>,
    ) -> Result<(String, AuthState)> {
        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();

        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
        )
        .set_redirect_uri(self.redirect_url.clone());

        let mut auth_request = client
            .authorize_url(
                CoreAuthenticationFlow::AuthorizationCode,
                CsrfToken::new_random,
                Nonce::new_random,
            )
            .set_pkce_challenge(pkce_challenge);
        for scope in &self.scopes {
            auth_request = auth_request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, csrf_token, nonce) = auth_request.url();

        let state = AuthState {
            csrf_token: csrf_token.secret().clone(),
            nonce: nonce.secret().clone(),
            pkce_verifier: pkce_verifier.secret().clone(),
            role,
            redirect,
            created_at: chrono::Utc::now().timestamp(),
        };
        debug!("Generated authorization URL for state {}", state.csrf_token);

        Ok((auth_url.to_string(), state))
    }

    /// Exchanges the callback code for tokens and verifies the ID token.
    pub async fn exchange_code(
        &self,
        code: &str,
        state: &str,
        stored_state: &AuthState,
    ) -> Result<AuthResult> {
        if state != stored_state.csrf_token {
            return Err(anyhow!("CSRF state mismatch"));
        }
        if stored_state.is_expired(chrono::Utc::now().timestamp()) {
            return Err(anyhow!("Authorization state expired"));
        }

        let client = CoreClient::from_provider_metadata(
            self.provider_metadata.clone(),
            self.client_id.clone(),
            self.client_secret.clone(),
        )
        .set_redirect_uri(self.redirect_url.clone());
        let http = http_client()?;
        let token_response = client
            .exchange_code(AuthorizationCode::new(code.to_string()))?
            .set_pkce_verifier(PkceCodeVerifier::new(stored_state.pkce_verifier.clone()))
            .request_async(&http)
            .await
            .map_err(|e| anyhow!("Failed to exchange authorization code: {}", e))?;

        let id_token = token_response
            .id_token()
            .ok_or_else(|| anyhow!("Server did not return an ID token"))?;
        let nonce = Nonce::new(stored_state.nonce.clone());
        let verifier = client.id_token_verifier();
        let claims: &CoreIdTokenClaims = id_token
            .claims(&verifier, &nonce)
            .map_err(|e| anyhow!("Failed to verify ID token: {}", e))?;

        let result = AuthResult {
            subject: claims.subject().to_string(),
            email: claims.email().map(|e| e.to_string()),
            preferred_username: claims.preferred_username().map(|u| u.as_str().to_string()),
            name: claims
                .name()
                .and_then(|n| n.get(None))
                .map(|n| n.as_str().to_string()),
        };
        debug!("Authenticated OIDC subject {}", result.subject);
        Ok(result)
    }
}

/// In-memory pending logins keyed by CSRF token.
pub struct AuthStateStore {
    states: RwLock<HashMap<String, AuthState>>,
}

impl AuthStateStore {
    pub fn new() -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
        }
    }

    pub async fn store(&self, state: AuthState) {
        let mut states = self.states.write().await;
        states.insert(state.csrf_token.clone(), state);
    }

    /// Each state can be taken once.
    pub async fn take(&self, csrf_token: &str) -> Option<AuthState> {
        self.states.write().await.remove(csrf_token)
    }

    pub async fn cleanup_expired(&self) -> usize {
        let now = chrono::Utc::now().timestamp();
        let mut states = self.states.write().await;
        let before = states.len();
        states.retain(|_, state| !state.is_expired(now));
        before - states.len()
    }
}

impl Default for AuthStateStore {
    fn default() -> Self {
        Self::new()
    }
}
