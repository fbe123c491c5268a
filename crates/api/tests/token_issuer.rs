//! Behaviour of [`TokenIssuer`] against the in-memory stores.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use vigil_api::auth::issuer::{AuthError, TokenIssuer};
use vigil_api::auth::jwt::{generate_refresh_token, TokenOrigin};
use vigil_api::auth::stamp::SecurityStampGuard;
use vigil_core::hashing::hash_token;
use vigil_core::rejection::RejectReason;
use vigil_core::types::{DbId, Timestamp};
use vigil_db::memory::{MemoryTokenStore, MemoryUserDirectory};
use vigil_db::models::token_record::{CreateTokenRecord, TokenRecord};
use vigil_db::models::user::{CreateUser, User};
use vigil_db::{StoreError, StoreResult, TokenStore, UserDirectory};

struct Fixture {
    issuer: TokenIssuer,
    store: Arc<MemoryTokenStore>,
    users: Arc<MemoryUserDirectory>,
    origin: TokenOrigin,
    cancel: CancellationToken,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryTokenStore::new());
    let users = Arc::new(MemoryUserDirectory::new());
    let config = common::test_jwt_config();
    let origin = config.origin_for("http://localhost");
    let issuer = TokenIssuer::new(
        config,
        SecurityStampGuard::default(),
        store.clone(),
        users.clone(),
    );
    Fixture {
        issuer,
        store,
        users,
        origin,
        cancel: CancellationToken::new(),
    }
}

async fn add_user(users: &MemoryUserDirectory, username: &str) -> User {
    users
        .insert(CreateUser {
            username: username.into(),
            password_hash: "unused".into(),
        })
        .await
}

// ---------------------------------------------------------------------------
// Issue / validate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn issued_token_validates() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;

    let pair = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();
    let session = f
        .issuer
        .validate(&pair.access_token, &f.origin, &f.cancel)
        .await
        .unwrap();

    assert_eq!(session.user.id, user.id);
    assert_eq!(session.claims.stamp, user.security_stamp);
    assert_eq!(pair.token_type, "Bearer");
    assert!(pair.refresh_token_expires_at > pair.access_token_expires_at);
}

#[tokio::test]
async fn raw_tokens_are_never_stored() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let pair = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    assert!(f
        .store
        .find_by_refresh_hash(&pair.refresh_token)
        .await
        .unwrap()
        .is_none());
    assert!(f
        .store
        .find_by_refresh_hash(&vigil_core::hashing::hash_token(&pair.refresh_token))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn token_for_another_audience_is_malformed() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let pair = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    let elsewhere = TokenOrigin {
        issuer: f.origin.issuer.clone(),
        audience: "https://elsewhere.example".into(),
    };
    let err = f
        .issuer
        .validate(&pair.access_token, &elsewhere, &f.cancel)
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::Rejected(RejectReason::Malformed));
}

#[tokio::test]
async fn activity_write_is_throttled_across_validations() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let pair = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    for _ in 0..3 {
        assert!(f.issuer.is_valid(&pair.access_token, &f.origin, &f.cancel).await);
    }
    assert_eq!(f.users.activity_write_count(), 1);
}

// ---------------------------------------------------------------------------
// Invalidate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn invalidate_all_rejects_every_previous_token() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let a = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();
    let b = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    let removed = f
        .issuer
        .invalidate(user.id, None, false, &f.cancel)
        .await
        .unwrap();
    assert_eq!(removed, 2);

    for token in [&a.access_token, &b.access_token] {
        let err = f.issuer.validate(token, &f.origin, &f.cancel).await.unwrap_err();
        assert_matches!(err, AuthError::Rejected(RejectReason::Revoked));
    }
}

#[tokio::test]
async fn invalidate_one_session_keeps_the_other() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let a = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();
    let b = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    f.issuer
        .invalidate(user.id, Some(&a.refresh_token), true, &f.cancel)
        .await
        .unwrap();

    assert!(!f.issuer.is_valid(&a.access_token, &f.origin, &f.cancel).await);
    assert!(f.issuer.is_valid(&b.access_token, &f.origin, &f.cancel).await);
}

#[tokio::test]
async fn invalidate_prunes_the_users_expired_records() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let live = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();
    let past = Utc::now() - Duration::minutes(1);
    f.store
        .insert(&CreateTokenRecord {
            user_id: user.id,
            access_token_hash: "stale-access".into(),
            refresh_token_hash: "stale-refresh".into(),
            access_token_expires_at: past,
            refresh_token_expires_at: Utc::now() + Duration::days(1),
            security_stamp: user.security_stamp.clone(),
        })
        .await
        .unwrap();

    let removed = f
        .issuer
        .invalidate(user.id, None, true, &f.cancel)
        .await
        .unwrap();

    assert_eq!(removed, 1);
    assert!(f.issuer.is_valid(&live.access_token, &f.origin, &f.cancel).await);
}

#[tokio::test]
async fn sweep_removes_records_past_refresh_expiry() {
    let f = fixture();
    let past = Utc::now() - Duration::minutes(1);
    f.store
        .insert(&CreateTokenRecord {
            user_id: 7,
            access_token_hash: "a".into(),
            refresh_token_hash: "r".into(),
            access_token_expires_at: past,
            refresh_token_expires_at: past,
            security_stamp: "stamp".into(),
        })
        .await
        .unwrap();

    assert_eq!(f.issuer.sweep_expired(&f.cancel).await.unwrap(), 1);
    assert_eq!(f.store.count_for_user(7).await, 0);
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refresh_issues_a_new_pair_once() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let old = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    let new = f
        .issuer
        .refresh(&old.refresh_token, &f.origin, &f.cancel)
        .await
        .unwrap();
    assert!(f.issuer.is_valid(&new.access_token, &f.origin, &f.cancel).await);

    let old_access = f
        .issuer
        .validate(&old.access_token, &f.origin, &f.cancel)
        .await
        .unwrap_err();
    assert_matches!(old_access, AuthError::Rejected(RejectReason::Revoked));

    let replay = f
        .issuer
        .refresh(&old.refresh_token, &f.origin, &f.cancel)
        .await
        .unwrap_err();
    assert_matches!(replay, AuthError::Rejected(RejectReason::Revoked));
    assert_eq!(f.store.count_for_user(user.id).await, 1);
}

#[tokio::test]
async fn concurrent_refresh_of_one_token_succeeds_once() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let old = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    let (a, b) = tokio::join!(
        f.issuer.refresh(&old.refresh_token, &f.origin, &f.cancel),
        f.issuer.refresh(&old.refresh_token, &f.origin, &f.cancel),
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    assert_eq!(f.store.count_for_user(user.id).await, 1);
}

#[tokio::test]
async fn refresh_for_deactivated_user_is_rejected() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let pair = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();
    f.users.set_active(user.id, false).await;

    let err = f
        .issuer
        .refresh(&pair.refresh_token, &f.origin, &f.cancel)
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::Rejected(RejectReason::Inactive));
}

#[tokio::test]
async fn refresh_past_stored_expiry_is_rejected() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    // Signature and `exp` are fine; only the stored record has lapsed.
    let signed = generate_refresh_token(f.issuer.config(), Utc::now()).unwrap();
    let past = Utc::now() - Duration::minutes(1);
    f.store
        .insert(&CreateTokenRecord {
            user_id: user.id,
            access_token_hash: "lapsed-access".into(),
            refresh_token_hash: hash_token(&signed.token),
            access_token_expires_at: past,
            refresh_token_expires_at: past,
            security_stamp: user.security_stamp.clone(),
        })
        .await
        .unwrap();

    let err = f
        .issuer
        .refresh(&signed.token, &f.origin, &f.cancel)
        .await
        .unwrap_err();

    assert_matches!(err, AuthError::Rejected(RejectReason::Expired));
    assert_eq!(f.store.count_for_user(user.id).await, 1);
}

// ---------------------------------------------------------------------------
// Security stamp
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stamp_rotation_rejects_tokens_without_token_store_writes() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let a = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();
    let b = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    let writes_before = f.store.write_count();
    assert!(f.users.rotate_security_stamp(user.id).await);
    assert_eq!(f.store.write_count(), writes_before);

    for token in [&a.access_token, &b.access_token] {
        let err = f.issuer.validate(token, &f.origin, &f.cancel).await.unwrap_err();
        assert_matches!(err, AuthError::Rejected(RejectReason::StaleSession));
    }
    assert_eq!(f.store.write_count(), writes_before);
}

#[tokio::test]
async fn password_change_through_directory_rejects_tokens() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let pair = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    assert!(f.users.update_password(user.id, "new-hash").await.unwrap());

    assert!(!f.issuer.is_valid(&pair.access_token, &f.origin, &f.cancel).await);
    let err = f
        .issuer
        .refresh(&pair.refresh_token, &f.origin, &f.cancel)
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::Rejected(RejectReason::StaleSession));
}

#[tokio::test]
async fn stamp_rotation_rejects_refresh_without_token_store_writes() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let pair = f.issuer.issue(&user, &f.origin, &f.cancel).await.unwrap();

    let writes_before = f.store.write_count();
    assert!(f.users.rotate_security_stamp(user.id).await);

    let err = f
        .issuer
        .refresh(&pair.refresh_token, &f.origin, &f.cancel)
        .await
        .unwrap_err();
    assert_matches!(err, AuthError::Rejected(RejectReason::StaleSession));
    assert_eq!(f.store.write_count(), writes_before);
    assert_eq!(f.store.count_for_user(user.id).await, 1);

    // A pair minted under the new stamp refreshes normally.
    let current = f.users.get_by_id(user.id).await.unwrap().unwrap();
    let fresh = f.issuer.issue(&current, &f.origin, &f.cancel).await.unwrap();
    assert!(f
        .issuer
        .refresh(&fresh.refresh_token, &f.origin, &f.cancel)
        .await
        .is_ok());
}

// ---------------------------------------------------------------------------
// Failure and cancellation
// ---------------------------------------------------------------------------

/// A token store whose every call fails.
struct DownTokenStore;

#[async_trait]
impl TokenStore for DownTokenStore {
    async fn insert(&self, _: &CreateTokenRecord) -> StoreResult<TokenRecord> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn find_active_by_access_hash(
        &self,
        _: &str,
        _: Timestamp,
    ) -> StoreResult<Option<TokenRecord>> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn find_by_refresh_hash(&self, _: &str) -> StoreResult<Option<TokenRecord>> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn rotate(&self, _: DbId, _: &CreateTokenRecord) -> StoreResult<Option<TokenRecord>> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn delete_by_refresh_hash(&self, _: DbId, _: &str) -> StoreResult<u64> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn delete_all_for_user(&self, _: DbId) -> StoreResult<u64> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn delete_expired_for_user(&self, _: DbId, _: Timestamp) -> StoreResult<u64> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn delete_expired(&self, _: Timestamp) -> StoreResult<u64> {
        Err(StoreError::Unavailable("down".into()))
    }
    async fn ping(&self) -> StoreResult<()> {
        Err(StoreError::Unavailable("down".into()))
    }
}

#[tokio::test]
async fn store_failure_fails_closed() {
    let users = Arc::new(MemoryUserDirectory::new());
    let user = add_user(&users, "ada").await;
    let config = common::test_jwt_config();
    let origin = config.origin_for("http://localhost");
    let issuer = TokenIssuer::new(
        config,
        SecurityStampGuard::default(),
        Arc::new(DownTokenStore),
        users,
    );
    let cancel = CancellationToken::new();

    let issued = issuer.issue(&user, &origin, &cancel).await;
    assert_matches!(issued, Err(AuthError::Store(_)));
    assert!(!issuer.store_healthy().await);
}

#[tokio::test]
async fn cancelled_issue_writes_nothing() {
    let f = fixture();
    let user = add_user(&f.users, "ada").await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = f.issuer.issue(&user, &f.origin, &cancel).await;

    assert_matches!(result, Err(AuthError::Cancelled));
    assert_eq!(f.store.write_count(), 0);
    assert_eq!(f.store.count_for_user(user.id).await, 0);
}


/// Memory store whose `rotate` announces itself and then never finishes.
#[derive(Default)]
struct ParkedRotateStore {
    inner: MemoryTokenStore,
    rotating: Notify,
}

#[async_trait]
impl TokenStore for ParkedRotateStore {
    async fn insert(&self, input: &CreateTokenRecord) -> StoreResult<TokenRecord> {
        self.inner.insert(input).await
    }
    async fn find_active_by_access_hash(
        &self,
        hash: &str,
        now: Timestamp,
    ) -> StoreResult<Option<TokenRecord>> {
        self.inner.find_active_by_access_hash(hash, now).await
    }
    async fn find_by_refresh_hash(&self, hash: &str) -> StoreResult<Option<TokenRecord>> {
        self.inner.find_by_refresh_hash(hash).await
    }
    async fn rotate(
        &self,
        old_id: DbId,
        replacement: &CreateTokenRecord,
    ) -> StoreResult<Option<TokenRecord>> {
        self.rotating.notify_one();
        std::future::pending::<()>().await;
        self.inner.rotate(old_id, replacement).await
    }
    async fn delete_by_refresh_hash(&self, user_id: DbId, hash: &str) -> StoreResult<u64> {
        self.inner.delete_by_refresh_hash(user_id, hash).await
    }
    async fn delete_all_for_user(&self, user_id: DbId) -> StoreResult<u64> {
        self.inner.delete_all_for_user(user_id).await
    }
    async fn delete_expired_for_user(&self, user_id: DbId, now: Timestamp) -> StoreResult<u64> {
        self.inner.delete_expired_for_user(user_id, now).await
    }
    async fn delete_expired(&self, now: Timestamp) -> StoreResult<u64> {
        self.inner.delete_expired(now).await
    }
    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn cancel_during_rotation_keeps_the_old_record() {
    let users = Arc::new(MemoryUserDirectory::new());
    let user = add_user(&users, "ada").await;
    let store = Arc::new(ParkedRotateStore::default());
    let config = common::test_jwt_config();
    let origin = config.origin_for("http://localhost");
    let issuer = TokenIssuer::new(
        config,
        SecurityStampGuard::default(),
        store.clone(),
        users,
    );
    let never = CancellationToken::new();
    let pair = issuer.issue(&user, &origin, &never).await.unwrap();

    let cancel = CancellationToken::new();
    let (result, ()) = tokio::join!(
        issuer.refresh(&pair.refresh_token, &origin, &cancel),
        async {
            store.rotating.notified().await;
            cancel.cancel();
        },
    );

    assert_matches!(result, Err(AuthError::Cancelled));
    assert_eq!(store.inner.count_for_user(user.id).await, 1);
    let kept = store
        .inner
        .find_by_refresh_hash(&hash_token(&pair.refresh_token))
        .await
        .unwrap();
    assert!(kept.is_some(), "the superseded record must survive");
    assert!(issuer.is_valid(&pair.access_token, &origin, &never).await);
}
