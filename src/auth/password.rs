/// Password Hashing and Verification
///
/// bcrypt with a configurable cost. The cost is encoded in every hash, so
/// raising it later keeps old hashes verifiable.

use std::sync::Arc;

use crate::error::AppError;

/// Bcrypt-based password hasher.
///
/// Comparison is done by `bcrypt::verify`, which checks digests in
/// constant time.
#[derive(Clone)]
pub struct PasswordHasher {
    cost: u32,
    // Verified against when the account does not exist, so unknown emails
    // cost the same as wrong passwords.
    dummy_hash: Arc<str>,
}

impl PasswordHasher {
    /// Create a hasher with the given bcrypt cost (4..=31)
    ///
    /// # Errors
    /// Returns error if bcrypt rejects the cost
    pub fn new(cost: u32) -> Result<Self, AppError> {
        let dummy_hash = bcrypt::hash("dummy-password-for-timing", cost)
            .map_err(|e| AppError::Internal(format!("Invalid bcrypt cost {}: {}", cost, e)))?;

        Ok(Self {
            cost,
            dummy_hash: Arc::from(dummy_hash),
        })
    }

    /// Hash a password with a fresh random salt
    ///
    /// # Errors
    /// Returns error if bcrypt hashing fails
    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a stored hash
    ///
    /// A mismatch is `Ok(false)`; only an unreadable hash is an error.
    pub fn verify(&self, hash: &str, password: &str) -> Result<bool, AppError> {
        bcrypt::verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }

    /// Spend the time of one verification without a real account
    pub fn verify_dummy(&self, password: &str) {
        let _ = bcrypt::verify(password, &self.dummy_hash);
    }
}
