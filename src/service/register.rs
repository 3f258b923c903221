use uuid::Uuid;

use super::AuthService;
use crate::error::{AppError, AuthError};
use crate::store::{NewUser, StoreError};

impl AuthService {
    /// Create a new credential.
    ///
    /// Email and password are expected to be validated by the caller. No
    /// token is issued here.
    ///
    /// # Errors
    /// - `AuthError::CredentialAlreadyExists` if the email is taken, including
    ///   when a concurrent registration wins between lookup and insert
    /// - store and hashing failures as internal errors
    pub async fn register(&self, email: &str, password: &str) -> Result<Uuid, AppError> {
        if self.store_call(self.users.find_by_email(email)).await?.is_some() {
            tracing::warn!("Registration attempted for an existing email");
            return Err(AuthError::CredentialAlreadyExists.into());
        }

        let password_hash = self.hash_password(password).await?;

        let new_user = NewUser {
            email: email.to_string(),
            password_hash,
        };
        let user_id = match self.store_call(self.users.create(new_user)).await {
            Ok(id) => id,
            Err(StoreError::Conflict) => {
                tracing::warn!("Registration lost a race for the same email");
                return Err(AuthError::CredentialAlreadyExists.into());
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!(user_id = %user_id, "User registered");
        Ok(user_id)
    }
}
