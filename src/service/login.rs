use super::{AuthService, TokenPair};
use crate::error::{AppError, AuthError};

impl AuthService {
    /// Authenticate with email and password and issue a token pair.
    ///
    /// Unknown email and wrong password both yield
    /// `AuthError::InvalidCredentials`, and both spend one bcrypt
    /// verification.
    ///
    /// The refresh-token record is written after the pair is signed. If that
    /// write fails, `RefreshPersistence::BestEffort` still returns the pair
    /// (the refresh token will not be accepted by `refresh`), while
    /// `RefreshPersistence::Required` fails the login.
    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let user = match self.store_call(self.users.find_by_email(email)).await? {
            Some(user) => user,
            None => {
                self.verify_dummy_password(password).await;
                tracing::warn!("Login attempt for unknown email");
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        if !self.verify_password(&user.password_hash, password).await? {
            tracing::warn!(user_id = %user.id, "Invalid password attempt");
            return Err(AuthError::InvalidCredentials.into());
        }

        let pair = self.issue_pair(user.id)?;
        self.persist_refresh(user.id, &pair.refresh_token).await?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(pair)
    }
}
