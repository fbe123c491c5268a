//! In-process store implementations.
//!
//! Used when the service runs without PostgreSQL (local development, tests).
//! Each store serialises its writes behind one lock, which gives `rotate` the
//! same all-or-nothing behaviour the SQL transaction provides.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use vigil_core::types::{DbId, Timestamp};

use crate::models::connection::{ConnectionRow, CreateConnection};
use crate::models::token_record::{CreateTokenRecord, TokenRecord};
use crate::models::user::{CreateUser, User};
use crate::repositories::user_repo::new_security_stamp;
use crate::store::{ConnectionMirror, StoreResult, TokenStore, UserDirectory};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TokenTable {
    next_id: DbId,
    rows: HashMap<DbId, TokenRecord>,
}

impl TokenTable {
    fn insert(&mut self, input: &CreateTokenRecord) -> TokenRecord {
        self.next_id += 1;
        let record = TokenRecord {
            id: self.next_id,
            user_id: input.user_id,
            access_token_hash: input.access_token_hash.clone(),
            refresh_token_hash: input.refresh_token_hash.clone(),
            access_token_expires_at: input.access_token_expires_at,
            refresh_token_expires_at: input.refresh_token_expires_at,
            security_stamp: input.security_stamp.clone(),
            created_at: Utc::now(),
        };
        self.rows.insert(record.id, record.clone());
        record
    }

    fn remove_where(&mut self, mut pred: impl FnMut(&TokenRecord) -> bool) -> u64 {
        let before = self.rows.len();
        self.rows.retain(|_, r| !pred(r));
        (before - self.rows.len()) as u64
    }
}

/// [`TokenStore`] held in process memory.
#[derive(Default)]
pub struct MemoryTokenStore {
    table: Mutex<TokenTable>,
    writes: AtomicU64,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls served so far (inserts, rotations, deletes).
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of records currently held for a user.
    pub async fn count_for_user(&self, user_id: DbId) -> usize {
        self.table
            .lock()
            .await
            .rows
            .values()
            .filter(|r| r.user_id == user_id)
            .count()
    }

    fn note_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, input: &CreateTokenRecord) -> StoreResult<TokenRecord> {
        self.note_write();
        Ok(self.table.lock().await.insert(input))
    }

    async fn find_active_by_access_hash(
        &self,
        hash: &str,
        now: Timestamp,
    ) -> StoreResult<Option<TokenRecord>> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .find(|r| r.access_token_hash == hash && !r.is_expired_at(now))
            .cloned())
    }

    async fn find_by_refresh_hash(&self, hash: &str) -> StoreResult<Option<TokenRecord>> {
        let table = self.table.lock().await;
        Ok(table
            .rows
            .values()
            .find(|r| r.refresh_token_hash == hash)
            .cloned())
    }

    async fn rotate(
        &self,
        old_id: DbId,
        replacement: &CreateTokenRecord,
    ) -> StoreResult<Option<TokenRecord>> {
        let mut table = self.table.lock().await;
        if table.rows.remove(&old_id).is_none() {
            return Ok(None);
        }
        self.note_write();
        Ok(Some(table.insert(replacement)))
    }

    async fn delete_by_refresh_hash(&self, user_id: DbId, hash: &str) -> StoreResult<u64> {
        self.note_write();
        let mut table = self.table.lock().await;
        Ok(table.remove_where(|r| r.user_id == user_id && r.refresh_token_hash == hash))
    }

    async fn delete_all_for_user(&self, user_id: DbId) -> StoreResult<u64> {
        self.note_write();
        let mut table = self.table.lock().await;
        Ok(table.remove_where(|r| r.user_id == user_id))
    }

    async fn delete_expired_for_user(&self, user_id: DbId, now: Timestamp) -> StoreResult<u64> {
        self.note_write();
        let mut table = self.table.lock().await;
        Ok(table.remove_where(|r| r.user_id == user_id && r.is_expired_at(now)))
    }

    async fn delete_expired(&self, now: Timestamp) -> StoreResult<u64> {
        self.note_write();
        let mut table = self.table.lock().await;
        Ok(table.remove_where(|r| r.refresh_token_expires_at <= now))
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// [`UserDirectory`] held in process memory.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: RwLock<HashMap<DbId, User>>,
    activity_writes: AtomicU64,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with a fresh stamp, returning the stored row.
    pub async fn insert(&self, input: CreateUser) -> User {
        let mut users = self.users.write().await;
        let now = Utc::now();
        let user = User {
            id: users.keys().max().copied().unwrap_or(0) + 1,
            username: input.username,
            password_hash: input.password_hash,
            security_stamp: new_security_stamp(),
            is_active: true,
            last_active_at: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        user
    }

    /// Rotate a user's stamp without changing anything else.
    pub async fn rotate_security_stamp(&self, id: DbId) -> bool {
        self.modify(id, |_| {}).await
    }

    /// Activate or deactivate a user, rotating the stamp.
    pub async fn set_active(&self, id: DbId, is_active: bool) -> bool {
        self.modify(id, |u| u.is_active = is_active).await
    }

    /// Number of `set_last_active_at` calls served so far.
    pub fn activity_write_count(&self) -> u64 {
        self.activity_writes.load(Ordering::SeqCst)
    }

    async fn modify(&self, id: DbId, apply: impl FnOnce(&mut User)) -> bool {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                apply(user);
                user.security_stamp = new_security_stamp();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn get_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_security_stamp(&self, id: DbId) -> StoreResult<Option<String>> {
        Ok(self
            .users
            .read()
            .await
            .get(&id)
            .map(|u| u.security_stamp.clone()))
    }

    async fn set_last_active_at(&self, id: DbId, at: Timestamp) -> StoreResult<()> {
        self.activity_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.last_active_at = Some(at);
        }
        Ok(())
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> StoreResult<bool> {
        let hash = password_hash.to_string();
        Ok(self.modify(id, |u| u.password_hash = hash).await)
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// [`ConnectionMirror`] held in process memory.
#[derive(Default)]
pub struct MemoryConnectionMirror {
    rows: Mutex<HashMap<String, ConnectionRow>>,
}

impl MemoryConnectionMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a mirrored row by transport id.
    pub async fn find(&self, connection_id: &str) -> Option<ConnectionRow> {
        self.rows.lock().await.get(connection_id).cloned()
    }

    /// Number of rows still marked active.
    pub async fn active_count(&self) -> usize {
        self.rows
            .lock()
            .await
            .values()
            .filter(|r| r.is_active)
            .count()
    }
}

#[async_trait]
impl ConnectionMirror for MemoryConnectionMirror {
    async fn record_connect(&self, input: &CreateConnection) -> StoreResult<ConnectionRow> {
        let mut rows = self.rows.lock().await;
        let row = ConnectionRow {
            id: rows.len() as DbId + 1,
            connection_id: input.connection_id.clone(),
            user_id: input.user_id,
            ip_address: input.ip_address.clone(),
            device_id: input.device_id.clone(),
            user_agent: input.user_agent.clone(),
            instance_id: input.instance_id.clone(),
            is_active: true,
            connected_at: input.connected_at,
            disconnected_at: None,
        };
        rows.insert(row.connection_id.clone(), row.clone());
        Ok(row)
    }

    async fn record_disconnect(&self, connection_id: &str, at: Timestamp) -> StoreResult<bool> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(connection_id) {
            Some(row) if row.is_active => {
                row.is_active = false;
                row.disconnected_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_instance(&self, instance_id: &str, at: Timestamp) -> StoreResult<u64> {
        let mut rows = self.rows.lock().await;
        let mut changed = 0;
        for row in rows
            .values_mut()
            .filter(|r| r.is_active && r.instance_id == instance_id)
        {
            row.is_active = false;
            row.disconnected_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }
}
