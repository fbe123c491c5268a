//! PostgreSQL implementations of the store traits.
//!
//! Each wrapper holds a cloned [`DbPool`] and delegates to the matching
//! repository.

use async_trait::async_trait;
use vigil_core::types::{DbId, Timestamp};

use crate::models::connection::{ConnectionRow, CreateConnection};
use crate::models::token_record::{CreateTokenRecord, TokenRecord};
use crate::models::user::User;
use crate::repositories::{ConnectionRepo, TokenRepo, UserRepo};
use crate::store::{ConnectionMirror, StoreResult, TokenStore, UserDirectory};
use crate::DbPool;

/// [`TokenStore`] over the `token_records` table.
#[derive(Clone)]
pub struct PgTokenStore {
    pool: DbPool,
}

impl PgTokenStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn insert(&self, input: &CreateTokenRecord) -> StoreResult<TokenRecord> {
        Ok(TokenRepo::create(&self.pool, input).await?)
    }

    async fn find_active_by_access_hash(
        &self,
        hash: &str,
        now: Timestamp,
    ) -> StoreResult<Option<TokenRecord>> {
        Ok(TokenRepo::find_active_by_access_hash(&self.pool, hash, now).await?)
    }

    async fn find_by_refresh_hash(&self, hash: &str) -> StoreResult<Option<TokenRecord>> {
        Ok(TokenRepo::find_by_refresh_hash(&self.pool, hash).await?)
    }

    async fn rotate(
        &self,
        old_id: DbId,
        replacement: &CreateTokenRecord,
    ) -> StoreResult<Option<TokenRecord>> {
        Ok(TokenRepo::rotate(&self.pool, old_id, replacement).await?)
    }

    async fn delete_by_refresh_hash(&self, user_id: DbId, hash: &str) -> StoreResult<u64> {
        Ok(TokenRepo::delete_by_refresh_hash(&self.pool, user_id, hash).await?)
    }

    async fn delete_all_for_user(&self, user_id: DbId) -> StoreResult<u64> {
        Ok(TokenRepo::delete_all_for_user(&self.pool, user_id).await?)
    }

    async fn delete_expired_for_user(&self, user_id: DbId, now: Timestamp) -> StoreResult<u64> {
        Ok(TokenRepo::delete_expired_for_user(&self.pool, user_id, now).await?)
    }

    async fn delete_expired(&self, now: Timestamp) -> StoreResult<u64> {
        Ok(TokenRepo::delete_expired(&self.pool, now).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(crate::health_check(&self.pool).await?)
    }
}

/// [`UserDirectory`] over the `users` table.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: DbPool,
}

impl PgUserDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn get_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_username(&self.pool, username).await?)
    }

    async fn get_security_stamp(&self, id: DbId) -> StoreResult<Option<String>> {
        Ok(UserRepo::get_security_stamp(&self.pool, id).await?)
    }

    async fn set_last_active_at(&self, id: DbId, at: Timestamp) -> StoreResult<()> {
        UserRepo::set_last_active_at(&self.pool, id, at).await?;
        Ok(())
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> StoreResult<bool> {
        Ok(UserRepo::update_password(&self.pool, id, password_hash).await?)
    }
}

/// [`ConnectionMirror`] over the `connections` table.
#[derive(Clone)]
pub struct PgConnectionMirror {
    pool: DbPool,
}

impl PgConnectionMirror {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionMirror for PgConnectionMirror {
    async fn record_connect(&self, input: &CreateConnection) -> StoreResult<ConnectionRow> {
        Ok(ConnectionRepo::create(&self.pool, input).await?)
    }

    async fn record_disconnect(&self, connection_id: &str, at: Timestamp) -> StoreResult<bool> {
        Ok(ConnectionRepo::mark_inactive(&self.pool, connection_id, at).await?)
    }

    async fn deactivate_instance(&self, instance_id: &str, at: Timestamp) -> StoreResult<u64> {
        Ok(ConnectionRepo::deactivate_instance(&self.pool, instance_id, at).await?)
    }
}
