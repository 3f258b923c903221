/// Credential stores
///
/// The flows talk to persistence only through the two capability traits
/// below. Any engine can back them; `postgres` is used in production and
/// `memory` in tests and local runs.

mod memory;
mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::{InMemoryRefreshTokenStore, InMemoryUserStore};
pub use postgres::{PgRefreshTokenStore, PgUserStore};

/// Failures reported by a store implementation
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint (the user email) was violated
    #[error("record already exists")]
    Conflict,
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Identity record
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    /// Unique, compared case-sensitively
    pub email: String,
    pub password_hash: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user as submitted for creation; the store assigns the id
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
}

/// Durable receipt for one issued refresh token.
///
/// Only the SHA-256 digest of the token is kept.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    #[inline]
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Expired from `expires_at` on, inclusive.
    ///
    /// JWT validation still accepts a token at `exp == now`, so this record
    /// check is the stricter of the two and decides the boundary second.
    #[inline]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Persist a new user and return its assigned id.
    ///
    /// Returns `StoreError::Conflict` when the email is already taken.
    async fn create(&self, user: NewUser) -> Result<Uuid, StoreError>;

    /// `Ok(None)` means no such user; only real failures are errors.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn save(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn find_by_hash(&self, token_hash: &str)
        -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Revoke the record if it is not revoked yet.
    ///
    /// The check and the write are one atomic step. Returns `true` only for
    /// the caller that performed the revocation; concurrent callers see
    /// `false`.
    async fn revoke_by_hash(&self, token_hash: &str) -> Result<bool, StoreError>;

    /// Revoke every unrevoked record owned by `user_id`, returning how many
    /// were revoked.
    async fn revoke_all_by_subject(&self, user_id: Uuid) -> Result<u64, StoreError>;
}
