use std::sync::Arc;
use thiserror::Error;

use crate::{
    identity::{IdentityError, IdentityState, VerifiedIdentity},
    models::{Principal, Role},
    repository::RepositoryState,
};

/// AuthFailure
///
/// Sign-in failure taxonomy. The split matters internally (operators want to
/// know an outage from a typo) but is invisible externally: clients always
/// receive the same generic message so the API leaks nothing about which
/// part of the check failed.
#[derive(Debug, Error)]
pub enum AuthFailure {
    /// The inputs were empty or the provider rejected the pair.
    #[error("invalid credentials")]
    InvalidCredentials,
    /// The identity provider could not be consulted. Fails closed.
    #[error("identity provider failure: {0}")]
    Provider(String),
}

impl AuthFailure {
    /// The response body for any sign-in failure. Deliberately identical
    /// across variants: no credential oracle.
    pub fn public_message(&self) -> &'static str {
        "sign-in failed"
    }
}

/// CredentialVerifier
///
/// Owns the full sign-in decision: input hygiene, the external credential
/// check, and resolution of the profile-store role into a `Principal`. The
/// two outcomes are asymmetric on purpose: an unreachable **provider** fails
/// closed (no principal), while an unreachable **profile store** fails open
/// to the weakest role (the user is authenticated, they just get `User`).
pub struct CredentialVerifier {
    identity: IdentityState,
    repo: RepositoryState,
}

/// VerifierState
///
/// Shared handle to the verifier; AppState hands clones to the sign-in and
/// registration handlers.
pub type VerifierState = Arc<CredentialVerifier>;

impl CredentialVerifier {
    pub fn new(identity: IdentityState, repo: RepositoryState) -> Self {
        Self { identity, repo }
    }

    /// verify
    ///
    /// Checks an email/password pair and produces the signed-in `Principal`.
    ///
    /// 1. Empty email or password is rejected before the provider is asked;
    ///    blank credentials are never a network round-trip.
    /// 2. The provider verdict is final: rejection or outage means no
    ///    principal.
    /// 3. The profile store supplies the role (get-or-create). If that store
    ///    is unavailable, the principal is still produced with `Role::User`.
    pub async fn verify(&self, email: &str, password: &str) -> Result<Principal, AuthFailure> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthFailure::InvalidCredentials);
        }

        let identity = match self.identity.verify_password(email, password).await {
            Ok(identity) => identity,
            Err(IdentityError::Rejected) => return Err(AuthFailure::InvalidCredentials),
            Err(IdentityError::Unavailable(msg)) => {
                tracing::error!("Credential check unavailable: {}", msg);
                return Err(AuthFailure::Provider(msg));
            }
        };

        Ok(self.materialize(identity).await)
    }

    /// complete_oauth
    ///
    /// Finishes an OAuth flow: exchanges the callback code at the provider,
    /// then materializes the principal exactly like the password path.
    pub async fn complete_oauth(
        &self,
        provider: &str,
        code: &str,
    ) -> Result<Principal, AuthFailure> {
        if code.trim().is_empty() {
            return Err(AuthFailure::InvalidCredentials);
        }

        let identity = match self.identity.exchange_code(provider, code).await {
            Ok(identity) => identity,
            Err(IdentityError::Rejected) => return Err(AuthFailure::InvalidCredentials),
            Err(IdentityError::Unavailable(msg)) => {
                tracing::error!("OAuth code exchange unavailable: {}", msg);
                return Err(AuthFailure::Provider(msg));
            }
        };

        Ok(self.materialize(identity).await)
    }

    /// materialize
    ///
    /// Get-or-create the profile record and fold its role into the principal.
    /// The upsert never writes the role column, so an existing assignment
    /// (e.g. admin) survives every subsequent sign-in.
    async fn materialize(&self, identity: VerifiedIdentity) -> Principal {
        match self.repo.upsert_profile(&identity).await {
            Some(profile) => Principal {
                id: profile.id,
                email: profile.email,
                username: profile.username,
                avatar_url: profile.avatar_url,
                role: profile.role,
                email_verified: identity.email_verified,
            },
            None => {
                // Profile store down: authenticated, but with the weakest role.
                tracing::warn!(
                    "Profile unavailable for {}; issuing principal with default role",
                    identity.id
                );
                Principal {
                    id: identity.id,
                    email: identity.email,
                    username: identity.username,
                    avatar_url: identity.avatar_url,
                    role: Role::User,
                    email_verified: identity.email_verified,
                }
            }
        }
    }
}
