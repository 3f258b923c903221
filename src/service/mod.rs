/// Credential and token-lifecycle flows
///
/// `AuthService` orchestrates the stores, the password hasher and the token
/// issuer. It holds no mutable state of its own; the refresh-token store is
/// the only shared resource, and its atomic `revoke_by_hash` is what makes
/// rotation single-use.
///
/// Every store call is bounded by the configured timeout. Dropping a flow
/// future stops it at its next await; a store call already in flight is left
/// to finish on its own.

mod login;
mod logout;
mod refresh;
mod register;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::auth::{hash_token, PasswordHasher, TokenIssuer};
use crate::configuration::{RefreshPersistence, SecuritySettings};
use crate::error::AppError;
use crate::store::{RefreshTokenStore, StoreError, UserStore};

/// Freshly minted credentials, returned by Login and Refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token lifetime in seconds
    pub expires_in: i64,
}

/// Tunables that change flow behaviour
#[derive(Debug, Clone)]
pub struct FlowPolicy {
    pub store_timeout: Duration,
    pub refresh_persistence: RefreshPersistence,
    pub reuse_detection: bool,
}

impl Default for FlowPolicy {
    fn default() -> Self {
        Self::from(&SecuritySettings::default())
    }
}

impl From<&SecuritySettings> for FlowPolicy {
    fn from(settings: &SecuritySettings) -> Self {
        Self {
            store_timeout: settings.store_timeout(),
            refresh_persistence: settings.refresh_persistence,
            reuse_detection: settings.reuse_detection,
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    tokens: TokenIssuer,
    passwords: PasswordHasher,
    policy: FlowPolicy,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        tokens: TokenIssuer,
        passwords: PasswordHasher,
        policy: FlowPolicy,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            tokens,
            passwords,
            policy,
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Run one store call under the configured timeout
    async fn store_call<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.policy.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.policy.store_timeout)),
        }
    }

    async fn hash_password(&self, password: &str) -> Result<String, AppError> {
        let hasher = self.passwords.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
    }

    async fn verify_password(&self, hash: &str, password: &str) -> Result<bool, AppError> {
        let hasher = self.passwords.clone();
        let hash = hash.to_string();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&hash, &password))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }

    async fn verify_dummy_password(&self, password: &str) {
        let hasher = self.passwords.clone();
        let password = password.to_string();
        let _ = tokio::task::spawn_blocking(move || hasher.verify_dummy(&password)).await;
    }

    fn issue_pair(&self, user_id: Uuid) -> Result<TokenPair, AppError> {
        let access_token = self
            .tokens
            .issue_access(user_id)
            .map_err(|e| AppError::Internal(format!("Access token generation failed: {}", e)))?;
        let refresh_token = self
            .tokens
            .issue_refresh(user_id)
            .map_err(|e| AppError::Internal(format!("Refresh token generation failed: {}", e)))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.tokens.access_lifetime(),
        })
    }

    /// Record a newly issued refresh token, honouring the persistence policy
    async fn persist_refresh(&self, user_id: Uuid, refresh_token: &str) -> Result<(), AppError> {
        let token_hash = hash_token(refresh_token);
        let expires_at = Utc::now() + chrono::Duration::seconds(self.tokens.refresh_lifetime());

        match self
            .store_call(self.refresh_tokens.save(user_id, &token_hash, expires_at))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => match self.policy.refresh_persistence {
                RefreshPersistence::BestEffort => {
                    tracing::error!(
                        user_id = %user_id,
                        error = %e,
                        "Refresh token record not saved; this refresh token cannot be rotated"
                    );
                    Ok(())
                }
                RefreshPersistence::Required => Err(e.into()),
            },
        }
    }
}
