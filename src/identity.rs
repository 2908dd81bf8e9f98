use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

// --- Error Type ---

/// IdentityError
///
/// Failure modes of the external identity provider. `Rejected` is the only
/// variant callers may treat as "wrong credentials"; everything else is an
/// infrastructure problem and must fail closed.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider examined the credentials (or code) and said no.
    #[error("identity provider rejected the credentials")]
    Rejected,
    /// Transport, protocol, or decoding failure while talking to the provider.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

// --- Core Data Structure ---

/// VerifiedIdentity
///
/// The attributes the identity provider vouches for after a successful
/// password check, code exchange, or sign-up. Role is deliberately absent:
/// roles live in the profile store, never at the provider.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    /// Shared with the profile store's primary key.
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub username: Option<String>,
    pub avatar_url: Option<String>,
}

// --- Trait Definition (The Port) ---

/// IdentityProvider
///
/// Abstract interface to the hosted auth service. The rest of the
/// application only sees verified identities; grant types, token shapes,
/// and provider quirks stay behind this boundary.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Checks an email/password pair against the provider.
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, IdentityError>;

    /// Completes an OAuth flow by exchanging the callback code.
    async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
    ) -> Result<VerifiedIdentity, IdentityError>;

    /// Creates a new account at the provider.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<VerifiedIdentity, IdentityError>;
}

/// Type alias for shared ownership of the identity provider.
pub type IdentityState = Arc<dyn IdentityProvider>;

// --- Wire Schemas (Provider Responses) ---

#[derive(Debug, Deserialize)]
struct TokenResponse {
    user: ProviderUser,
}

#[derive(Debug, Deserialize)]
struct ProviderUser {
    id: Uuid,
    email: String,
    email_confirmed_at: Option<String>,
    #[serde(default)]
    user_metadata: ProviderMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderMetadata {
    #[serde(default)]
    user_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<ProviderUser> for VerifiedIdentity {
    fn from(user: ProviderUser) -> Self {
        VerifiedIdentity {
            id: user.id,
            email: user.email,
            email_verified: user.email_confirmed_at.is_some(),
            username: user.user_metadata.user_name,
            avatar_url: user.user_metadata.avatar_url,
        }
    }
}

// --- Concrete Implementation (HTTP / GoTrue-compatible) ---

/// HttpIdentityProvider
///
/// Talks to a GoTrue-compatible auth service over HTTPS using the public
/// anon key. Credential grants and sign-ups go straight through; this
/// application never stores passwords.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: String, anon_key: String) -> Self {
        HttpIdentityProvider {
            http: reqwest::Client::new(),
            base_url,
            anon_key,
        }
    }

    /// Maps a non-success provider status onto the error taxonomy.
    fn classify_failure(status: reqwest::StatusCode) -> IdentityError {
        match status.as_u16() {
            // GoTrue answers 400 for bad grants, 401 for bad keys on some
            // deployments, and 422 for sign-ups that collide.
            400 | 401 | 422 => IdentityError::Rejected,
            _ => IdentityError::Unavailable(format!("provider returned status {status}")),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, IdentityError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url);

        let res = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
            }))
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(Self::classify_failure(res.status()));
        }

        let token: TokenResponse = res
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(token.user.into())
    }

    async fn exchange_code(
        &self,
        provider: &str,
        code: &str,
    ) -> Result<VerifiedIdentity, IdentityError> {
        tracing::debug!("Exchanging OAuth code from provider '{}'", provider);

        let url = format!("{}/auth/v1/token?grant_type=pkce", self.base_url);

        let res = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "auth_code": code,
            }))
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(Self::classify_failure(res.status()));
        }

        let token: TokenResponse = res
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(token.user.into())
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> Result<VerifiedIdentity, IdentityError> {
        let url = format!("{}/auth/v1/signup", self.base_url);

        let res = self
            .http
            .post(&url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": {
                    "user_name": username,
                },
            }))
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        if !res.status().is_success() {
            return Err(Self::classify_failure(res.status()));
        }

        // The sign-up endpoint returns the user object directly.
        let user: ProviderUser = res
            .json()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        Ok(user.into())
    }
}

// --- Mock Implementation (For Testing) ---

/// MockIdentityProvider
///
/// Deterministic in-memory provider for tests. Accounts are fixed up front;
/// `should_fail` simulates a provider outage for fail-closed assertions.
#[derive(Default)]
pub struct MockIdentityProvider {
    /// When true, every call reports `Unavailable`.
    pub should_fail: bool,
    /// (email, password, identity) triples accepted by `verify_password`.
    pub accounts: Vec<(String, String, VerifiedIdentity)>,
    /// Identity returned for any code exchange, when present.
    pub oauth_identity: Option<VerifiedIdentity>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account the mock will accept.
    pub fn with_account(mut self, id: Uuid, email: &str, password: &str) -> Self {
        self.accounts.push((
            email.to_string(),
            password.to_string(),
            VerifiedIdentity {
                id,
                email: email.to_string(),
                email_verified: true,
                username: None,
                avatar_url: None,
            },
        ));
        self
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn verify_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<VerifiedIdentity, IdentityError> {
        if self.should_fail {
            return Err(IdentityError::Unavailable("mock outage".to_string()));
        }
        self.accounts
            .iter()
            .find(|(e, p, _)| e == email && p == password)
            .map(|(_, _, identity)| identity.clone())
            .ok_or(IdentityError::Rejected)
    }

    async fn exchange_code(
        &self,
        _provider: &str,
        _code: &str,
    ) -> Result<VerifiedIdentity, IdentityError> {
        if self.should_fail {
            return Err(IdentityError::Unavailable("mock outage".to_string()));
        }
        self.oauth_identity.clone().ok_or(IdentityError::Rejected)
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        username: Option<&str>,
    ) -> Result<VerifiedIdentity, IdentityError> {
        if self.should_fail {
            return Err(IdentityError::Unavailable("mock outage".to_string()));
        }
        Ok(VerifiedIdentity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            email_verified: false,
            username: username.map(|u| u.to_string()),
            avatar_url: None,
        })
    }
}
