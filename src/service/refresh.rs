use chrono::Utc;
use uuid::Uuid;

use super::{AuthService, TokenPair};
use crate::auth::hash_token;
use crate::error::{AppError, AuthError};

impl AuthService {
    /// Rotate a refresh token: revoke the presented one and issue a new pair.
    ///
    /// Each refresh token works once. The presented record is revoked with a
    /// conditional update before anything new is issued, so of two concurrent
    /// calls with the same token only one succeeds.
    ///
    /// Every rejection (bad signature, expired, unknown, revoked) is the same
    /// `AuthError::InvalidRefreshToken`. With reuse detection on, presenting an
    /// already-rotated token also revokes every refresh token of its owner.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AppError> {
        let user_id = self
            .tokens
            .validate_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        let token_hash = hash_token(refresh_token);
        let record = match self
            .store_call(self.refresh_tokens.find_by_hash(&token_hash))
            .await?
        {
            Some(record) => record,
            None => {
                tracing::warn!(user_id = %user_id, "Refresh token not found in store");
                return Err(AuthError::InvalidRefreshToken.into());
            }
        };

        if record.user_id != user_id {
            tracing::warn!(user_id = %user_id, "Refresh token record owned by another user");
            return Err(AuthError::InvalidRefreshToken.into());
        }

        if record.is_revoked() {
            tracing::warn!(user_id = %user_id, "Attempt to use revoked refresh token");
            self.revoke_family(user_id).await;
            return Err(AuthError::InvalidRefreshToken.into());
        }

        if record.is_expired_at(Utc::now()) {
            tracing::info!(user_id = %user_id, "Refresh token record expired");
            return Err(AuthError::InvalidRefreshToken.into());
        }

        if !self
            .store_call(self.refresh_tokens.revoke_by_hash(&token_hash))
            .await?
        {
            tracing::warn!(user_id = %user_id, "Refresh token already rotated by a concurrent request");
            self.revoke_family(user_id).await;
            return Err(AuthError::InvalidRefreshToken.into());
        }

        let pair = self.issue_pair(user_id)?;
        self.persist_refresh(user_id, &pair.refresh_token).await?;

        tracing::info!(user_id = %user_id, "Token refreshed");
        Ok(pair)
    }

    /// Reuse response: drop every outstanding refresh token of the user.
    ///
    /// A failing store is logged and swallowed; the caller is rejected with
    /// `InvalidRefreshToken` either way.
    async fn revoke_family(&self, user_id: Uuid) {
        if !self.policy.reuse_detection {
            return;
        }

        match self
            .store_call(self.refresh_tokens.revoke_all_by_subject(user_id))
            .await
        {
            Ok(revoked) => tracing::warn!(
                user_id = %user_id,
                revoked = revoked,
                "Refresh token reuse detected; all refresh tokens revoked"
            ),
            Err(e) => tracing::error!(
                user_id = %user_id,
                error = %e,
                "Refresh token reuse detected; revoking the user's refresh tokens failed"
            ),
        }
    }
}
