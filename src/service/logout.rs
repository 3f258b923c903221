use uuid::Uuid;

use super::AuthService;
use crate::error::AppError;

impl AuthService {
    /// Revoke every outstanding refresh token of `user_id`.
    ///
    /// Access tokens already issued stay valid until they expire.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AppError> {
        let revoked = self
            .store_call(self.refresh_tokens.revoke_all_by_subject(user_id))
            .await?;

        tracing::info!(user_id = %user_id, revoked = revoked, "User logged out");
        Ok(())
    }
}
