/// In-memory stores
///
/// Mutex-guarded maps. Every operation takes the lock once, so
/// `revoke_by_hash` checks and sets the revocation timestamp atomically.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{NewUser, RefreshTokenRecord, RefreshTokenStore, StoreError, User, UserStore};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
}

/// Users keyed by email
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(lock(&self.users)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<Uuid, StoreError> {
        let mut users = lock(&self.users)?;
        if users.contains_key(&user.email) {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        users.insert(
            user.email.clone(),
            User {
                id,
                email: user.email,
                password_hash: user.password_hash,
                is_verified: false,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(lock(&self.users)?.get(email).cloned())
    }
}

/// Refresh token records keyed by token hash
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    records: Mutex<HashMap<String, RefreshTokenRecord>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record owned by `user_id`, revoked ones included
    pub fn records_for(&self, user_id: Uuid) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        Ok(lock(&self.records)?
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(
        &self,
        user_id: Uuid,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut records = lock(&self.records)?;
        if records.contains_key(token_hash) {
            return Err(StoreError::Conflict);
        }

        records.insert(
            token_hash.to_string(),
            RefreshTokenRecord {
                id: Uuid::new_v4(),
                user_id,
                token_hash: token_hash.to_string(),
                expires_at,
                revoked_at: None,
                created_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(lock(&self.records)?.get(token_hash).cloned())
    }

    async fn revoke_by_hash(&self, token_hash: &str) -> Result<bool, StoreError> {
        let mut records = lock(&self.records)?;
        match records.get_mut(token_hash) {
            Some(record) if record.revoked_at.is_none() => {
                record.revoked_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_by_subject(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut revoked = 0;
        for record in lock(&self.records)?.values_mut() {
            if record.user_id == user_id && record.revoked_at.is_none() {
                record.revoked_at = Some(now);
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_find_user() {
        let store = InMemoryUserStore::new();
        let id = store.create(new_user("a@x.com")).await.unwrap();

        let user = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.id, id);
        assert!(!user.is_verified);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = InMemoryUserStore::new();
        store.create(new_user("a@x.com")).await.unwrap();

        let result = store.create(new_user("a@x.com")).await;
        assert!(matches!(result, Err(StoreError::Conflict)));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_email_lookup_is_case_sensitive() {
        let store = InMemoryUserStore::new();
        store.create(new_user("a@x.com")).await.unwrap();

        assert!(store.find_by_email("A@x.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_by_hash_only_once() {
        let store = InMemoryRefreshTokenStore::new();
        let user_id = Uuid::new_v4();
        store
            .save(user_id, "h1", Utc::now() + Duration::days(7))
            .await
            .unwrap();

        assert!(store.revoke_by_hash("h1").await.unwrap());
        assert!(!store.revoke_by_hash("h1").await.unwrap());
        assert!(!store.revoke_by_hash("unknown").await.unwrap());

        let record = store.find_by_hash("h1").await.unwrap().unwrap();
        assert!(record.is_revoked());
    }

    #[tokio::test]
    async fn test_revoke_all_by_subject_leaves_other_users() {
        let store = InMemoryRefreshTokenStore::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let expires = Utc::now() + Duration::days(7);
        store.save(alice, "a1", expires).await.unwrap();
        store.save(alice, "a2", expires).await.unwrap();
        store.save(bob, "b1", expires).await.unwrap();
        store.revoke_by_hash("a1").await.unwrap();

        assert_eq!(store.revoke_all_by_subject(alice).await.unwrap(), 1);
        assert!(store.records_for(alice).unwrap().iter().all(|r| r.is_revoked()));
        assert!(store.records_for(bob).unwrap().iter().all(|r| !r.is_revoked()));
    }

    #[test]
    fn test_poisoned_lock_is_unavailable() {
        let store = std::sync::Arc::new(InMemoryRefreshTokenStore::new());
        let poisoner = store.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.records.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(matches!(
            store.records_for(Uuid::new_v4()),
            Err(StoreError::Unavailable(_))
        ));
        assert!(matches!(InMemoryUserStore::new().len(), Ok(0)));
    }
}
