//! In-memory user storage.
//!
//! # Design Decisions
//! - Ids are assigned from a monotonically increasing counter, starting at 1
//! - Email uniqueness is enforced through a secondary index
//! - Passwords are stored as bcrypt hashes and never serialized

use std::sync::atomic::{AtomicU64, Ordering};

use bcrypt::{hash, DEFAULT_COST};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

/// A stored user.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Fields to change on an existing user. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate entry '{0}' for key 'email'")]
    DuplicateEmail(String),

    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Thread-safe user table.
#[derive(Debug)]
pub struct UserStore {
    users: DashMap<u64, User>,
    emails: DashMap<String, u64>,
    next_id: AtomicU64,
    hash_cost: u32,
}

impl Default for UserStore {
    fn default() -> Self {
        Self::new()
    }
}

impl UserStore {
    pub fn new() -> Self {
        Self::with_cost(DEFAULT_COST)
    }

    /// Create a store hashing passwords with the given bcrypt cost.
    pub fn with_cost(hash_cost: u32) -> Self {
        Self {
            users: DashMap::new(),
            emails: DashMap::new(),
            next_id: AtomicU64::new(1),
            hash_cost,
        }
    }

    /// All users ordered by id.
    pub fn list(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.iter().map(|r| r.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        users
    }

    pub fn get(&self, id: u64) -> Option<User> {
        self.users.get(&id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: u64) -> bool {
        self.users.contains_key(&id)
    }

    pub fn create(&self, name: &str, email: &str, password: &str) -> Result<User, StoreError> {
        let password_hash = hash(password, self.hash_cost)?;

        let id = match self.emails.entry(email.to_string()) {
            Entry::Occupied(_) => return Err(StoreError::DuplicateEmail(email.to_string())),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                slot.insert(id);
                id
            }
        };

        let user = User {
            id,
            name: name.to_string(),
            email: email.to_string(),
            password_hash,
            created_at: Utc::now(),
        };
        self.users.insert(id, user.clone());
        tracing::debug!(user_id = id, "User created");
        Ok(user)
    }

    /// Apply `changes` to user `id`. Returns `Ok(None)` when the user does not exist.
    pub fn update(&self, id: u64, changes: UserUpdate) -> Result<Option<User>, StoreError> {
        let password_hash = match &changes.password {
            Some(password) => Some(hash(password, self.hash_cost)?),
            None => None,
        };

        let Some(mut user) = self.users.get_mut(&id) else {
            return Ok(None);
        };

        if let Some(email) = changes.email {
            if email != user.email {
                match self.emails.entry(email.clone()) {
                    Entry::Occupied(_) => return Err(StoreError::DuplicateEmail(email)),
                    Entry::Vacant(slot) => {
                        slot.insert(id);
                    }
                }
                self.emails.remove(&user.email);
                user.email = email;
            }
        }
        if let Some(name) = changes.name {
            user.name = name;
        }
        if let Some(password_hash) = password_hash {
            user.password_hash = password_hash;
        }

        Ok(Some(user.clone()))
    }

    /// Remove user `id`, returning it if it existed.
    pub fn delete(&self, id: u64) -> Option<User> {
        let (_, user) = self.users.remove(&id)?;
        self.emails.remove(&user.email);
        Some(user)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> UserStore {
        UserStore::with_cost(4)
    }

    fn password_matches(store: &UserStore, id: u64, password: &str) -> bool {
        let user = store.get(id).unwrap();
        bcrypt::verify(password, &user.password_hash).unwrap()
    }

    #[test]
    fn test_create_assigns_sequential_ids() {
        let store = store();
        let a = store.create("Ada", "ada@example.com", "pw").unwrap();
        let b = store.create("Grace", "grace@example.com", "pw").unwrap();

        assert_eq!((a.id, b.id), (1, 2));
        let ids: Vec<_> = store.list().iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let store = store();
        store.create("Ada", "ada@example.com", "pw").unwrap();
        let err = store.create("Other", "ada@example.com", "pw").unwrap_err();

        assert!(matches!(err, StoreError::DuplicateEmail(_)));
        assert!(err.to_string().contains("Duplicate entry"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_password_is_hashed_and_hidden() {
        let store = store();
        let user = store.create("Ada", "ada@example.com", "secret").unwrap();

        assert_ne!(user.password_hash, "secret");
        assert!(password_matches(&store, user.id, "secret"));
        assert!(!password_matches(&store, user.id, "wrong"));

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn test_update_fields() {
        let store = store();
        let user = store.create("Ada", "ada@example.com", "old").unwrap();

        let updated = store
            .update(
                user.id,
                UserUpdate {
                    email: Some("countess@example.com".into()),
                    password: Some("new".into()),
                    ..UserUpdate::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(updated.name, "Ada");
        assert_eq!(updated.email, "countess@example.com");
        assert!(password_matches(&store, user.id, "new"));

        // The old address is free again.
        store.create("Someone", "ada@example.com", "pw").unwrap();
    }

    #[test]
    fn test_update_to_taken_email() {
        let store = store();
        let ada = store.create("Ada", "ada@example.com", "pw").unwrap();
        store.create("Grace", "grace@example.com", "pw").unwrap();

        let err = store
            .update(
                ada.id,
                UserUpdate {
                    email: Some("grace@example.com".into()),
                    ..UserUpdate::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateEmail(_)));
        assert_eq!(store.get(ada.id).unwrap().email, "ada@example.com");
    }

    #[test]
    fn test_update_missing_user() {
        let store = store();
        let result = store.update(99, UserUpdate { name: Some("x".into()), ..UserUpdate::default() });
        assert!(result.unwrap().is_none());
    }

    #[test]
    fn test_delete() {
        let store = store();
        let user = store.create("Ada", "ada@example.com", "pw").unwrap();

        assert!(store.delete(user.id).is_some());
        assert!(store.delete(user.id).is_none());
        assert!(store.is_empty());
        assert!(!store.contains(user.id));
    }
}
