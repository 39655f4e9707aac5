//! User records behind a minimal store contract (`find_by_email` / `save`).
//! Persistence is an external collaborator; the in-memory implementation is
//! the reference backend for tests and single-node runs.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::identity::Role;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

/// Input for `UserStore::save`; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub role: Role,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Lookup is case-insensitive on the email.
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>>;
    async fn save(&self, user: NewUser) -> anyhow::Result<UserRecord>;
}

#[derive(Default)]
pub struct MemoryUserStore {
    map: RwLock<HashMap<String, UserRecord>>,
    next_id: AtomicI64,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self { map: RwLock::new(HashMap::new()), next_id: AtomicI64::new(1) }
    }

    pub fn len(&self) -> usize { self.map.read().len() }
    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<UserRecord>> {
        Ok(self.map.read().get(&email.to_lowercase()).cloned())
    }

    async fn save(&self, user: NewUser) -> anyhow::Result<UserRecord> {
        let record = UserRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            email: user.email.clone(),
            name: user.name,
            password_hash: user.password_hash,
            role: user.role,
        };
        self.map.write().insert(user.email.to_lowercase(), record.clone());
        Ok(record)
    }
}
