//! Grant revocation service.
//!
//! Administrative revocation works on top of any [`GrantStore`]: removing a
//! grant record removes every token index entry it holds, so all tokens
//! issued under the grant stop resolving at once. This is the backend for
//! RFC 7009 token revocation, admin "sign out user" actions, and logout
//! flows that must kill every session a user has with one client.
//!
//! # Security Considerations
//!
//! Revocation is logged with grant ids and principal/client identifiers
//! only. Token values never appear in logs.

use std::sync::Arc;

use tracing::info;

use crate::AuthResult;
use crate::grant::GrantStore;

/// Revokes issued grants through the underlying store.
///
/// Cloning is cheap; the service shares the store behind an [`Arc`].
#[derive(Clone)]
pub struct RevocationService {
    store: Arc<dyn GrantStore>,
}

impl RevocationService {
    /// Creates a revocation service over a grant store.
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }

    /// Revokes a single grant by id.
    ///
    /// # Returns
    ///
    /// `true` if a grant was found and removed, `false` if the id was
    /// unknown or already expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read or removal fails.
    pub async fn revoke_by_id(&self, grant_id: &str) -> AuthResult<bool> {
        let Some(record) = self.store.find_by_id(grant_id).await? else {
            return Ok(false);
        };

        self.store.remove(&record).await?;
        info!(grant_id = %record.id, principal = %record.principal, "grant revoked");
        Ok(true)
    }

    /// Revokes every grant held by a principal.
    ///
    /// Stops at the first failed removal; grants removed before the failure
    /// stay removed.
    ///
    /// # Returns
    ///
    /// The number of grants removed. Zero when the principal holds none.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read or any removal fails.
    pub async fn revoke_by_principal(&self, principal: &str) -> AuthResult<u64> {
        let records = self.store.find_all_by_principal(principal).await?;

        let mut revoked = 0u64;
        for record in &records {
            self.store.remove(record).await?;
            revoked += 1;
        }

        if revoked > 0 {
            info!(principal = %principal, revoked, "revoked all grants for principal");
        }
        Ok(revoked)
    }

    /// Revokes every grant a principal holds with one specific client.
    ///
    /// Grants the principal holds with other clients are untouched. This is
    /// the per-application sign-out: "disconnect app X from user Y".
    ///
    /// # Returns
    ///
    /// The number of grants removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read or any removal fails.
    pub async fn revoke_by_principal_and_client(
        &self,
        principal: &str,
        client_id: &str,
    ) -> AuthResult<u64> {
        let records = self.store.find_all_by_principal(principal).await?;

        let mut revoked = 0u64;
        for record in records.iter().filter(|r| r.client_id == client_id) {
            self.store.remove(record).await?;
            revoked += 1;
        }

        if revoked > 0 {
            info!(
                principal = %principal,
                client_id = %client_id,
                revoked,
                "revoked grants for principal and client"
            );
        }
        Ok(revoked)
    }

    /// Lists the live grant ids a principal holds, oldest first.
    ///
    /// Useful for admin tooling that shows active sessions before revoking
    /// them selectively with [`revoke_by_id`](RevocationService::revoke_by_id).
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub async fn find_grant_ids_by_principal(&self, principal: &str) -> AuthResult<Vec<String>> {
        self.store.find_grant_ids_by_principal(principal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrantStoreConfig;
    use crate::error::AuthError;
    use crate::grant::record::{GrantRecord, GrantType, SubToken, TokenKind};
    use crate::grant::{GrantStore, InMemoryGrantStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use time::OffsetDateTime;

    /// Delegates to an in-memory store but fails `remove` after a set number
    /// of successful removals.
    struct FailingRemoveStore {
        inner: InMemoryGrantStore,
        removals_before_failure: usize,
        remove_calls: AtomicUsize,
    }

    impl FailingRemoveStore {
        fn new(removals_before_failure: usize) -> Self {
            Self {
                inner: InMemoryGrantStore::new(&GrantStoreConfig::default()).unwrap(),
                removals_before_failure,
                remove_calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GrantStore for FailingRemoveStore {
        async fn save(&self, record: &GrantRecord) -> AuthResult<()> {
            self.inner.save(record).await
        }

        async fn remove(&self, record: &GrantRecord) -> AuthResult<()> {
            let calls = self.remove_calls.fetch_add(1, Ordering::SeqCst);
            if calls >= self.removals_before_failure {
                return Err(AuthError::storage("simulated removal failure"));
            }
            self.inner.remove(record).await
        }

        async fn find_by_id(&self, id: &str) -> AuthResult<Option<GrantRecord>> {
            self.inner.find_by_id(id).await
        }

        async fn find_by_token(
            &self,
            kind: TokenKind,
            value: &str,
        ) -> AuthResult<Option<GrantRecord>> {
            self.inner.find_by_token(kind, value).await
        }

        async fn find_by_principal(&self, principal: &str) -> AuthResult<Option<GrantRecord>> {
            self.inner.find_by_principal(principal).await
        }

        async fn find_all_by_principal(&self, principal: &str) -> AuthResult<Vec<GrantRecord>> {
            self.inner.find_all_by_principal(principal).await
        }

        async fn find_grant_ids_by_principal(&self, principal: &str) -> AuthResult<Vec<String>> {
            self.inner.find_grant_ids_by_principal(principal).await
        }
    }

    fn create_test_service() -> (Arc<InMemoryGrantStore>, RevocationService) {
        let store = Arc::new(InMemoryGrantStore::new(&GrantStoreConfig::default()).unwrap());
        let service = RevocationService::new(store.clone());
        (store, service)
    }

    fn create_test_record(id: &str, principal: &str, client_id: &str) -> GrantRecord {
        let now = OffsetDateTime::now_utc();
        GrantRecord::new(id, principal, client_id, GrantType::AuthorizationCode)
            .with_scope("openid")
            .with_token(SubToken::new(
                TokenKind::Access,
                format!("access-{id}"),
                now,
                Some(now + time::Duration::hours(1)),
            ))
            .with_token(SubToken::new(
                TokenKind::Refresh,
                format!("refresh-{id}"),
                now,
                Some(now + time::Duration::days(30)),
            ))
    }

    #[tokio::test]
    async fn test_revoke_by_id() {
        let (store, service) = create_test_service();
        store
            .save(&create_test_record("auth-1", "alice", "client-1"))
            .await
            .unwrap();

        assert!(service.revoke_by_id("auth-1").await.unwrap());

        assert!(store.find_by_id("auth-1").await.unwrap().is_none());
        assert!(
            store
                .find_by_token(TokenKind::Access, "access-auth-1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_revoke_by_id_unknown() {
        let (_store, service) = create_test_service();
        assert!(!service.revoke_by_id("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_by_principal_removes_all_grants() {
        let (store, service) = create_test_service();
        store
            .save(&create_test_record("auth-1", "alice", "client-1"))
            .await
            .unwrap();
        store
            .save(&create_test_record("auth-2", "alice", "client-2"))
            .await
            .unwrap();
        store
            .save(&create_test_record("auth-3", "bob", "client-1"))
            .await
            .unwrap();

        let revoked = service.revoke_by_principal("alice").await.unwrap();
        assert_eq!(revoked, 2);

        assert!(store.find_all_by_principal("alice").await.unwrap().is_empty());
        assert!(
            store
                .find_by_token(TokenKind::Refresh, "refresh-auth-1")
                .await
                .unwrap()
                .is_none()
        );
        // Other principals are untouched.
        assert!(store.find_by_id("auth-3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_by_principal_without_grants() {
        let (_store, service) = create_test_service();
        assert_eq!(service.revoke_by_principal("nobody").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revoke_by_principal_and_client_filters_client() {
        let (store, service) = create_test_service();
        store
            .save(&create_test_record("auth-1", "alice", "client-1"))
            .await
            .unwrap();

        // Wrong client: nothing removed, the grant stays live.
        let revoked = service
            .revoke_by_principal_and_client("alice", "client-2")
            .await
            .unwrap();
        assert_eq!(revoked, 0);
        assert!(store.find_by_id("auth-1").await.unwrap().is_some());

        // Matching client: the grant goes, tokens stop resolving.
        let revoked = service
            .revoke_by_principal_and_client("alice", "client-1")
            .await
            .unwrap();
        assert_eq!(revoked, 1);
        assert!(store.find_by_id("auth-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_revoke_by_principal_and_client_multiple_grants() {
        let (store, service) = create_test_service();
        store
            .save(&create_test_record("auth-1", "alice", "client-1"))
            .await
            .unwrap();
        store
            .save(&create_test_record("auth-2", "alice", "client-1"))
            .await
            .unwrap();
        store
            .save(&create_test_record("auth-3", "alice", "client-2"))
            .await
            .unwrap();

        let revoked = service
            .revoke_by_principal_and_client("alice", "client-1")
            .await
            .unwrap();
        assert_eq!(revoked, 2);

        let remaining = store.find_all_by_principal("alice").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "auth-3");
    }

    #[tokio::test]
    async fn test_find_grant_ids_by_principal() {
        let (store, service) = create_test_service();
        store
            .save(&create_test_record("auth-1", "alice", "client-1"))
            .await
            .unwrap();
        store
            .save(&create_test_record("auth-2", "alice", "client-2"))
            .await
            .unwrap();

        let ids = service.find_grant_ids_by_principal("alice").await.unwrap();
        assert_eq!(ids, vec!["auth-1".to_string(), "auth-2".to_string()]);
    }

    #[tokio::test]
    async fn test_revoke_by_principal_stops_at_first_failure() {
        let store = Arc::new(FailingRemoveStore::new(1));
        let service = RevocationService::new(store.clone());
        store
            .save(&create_test_record("auth-1", "alice", "client-1"))
            .await
            .unwrap();
        store
            .save(&create_test_record("auth-2", "alice", "client-2"))
            .await
            .unwrap();

        let err = service.revoke_by_principal("alice").await.unwrap_err();
        assert!(err.is_storage_error());

        // One removal succeeded before the failure and stays removed.
        assert_eq!(store.remove_calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            store.inner.find_all_by_principal("alice").await.unwrap().len(),
            1
        );
    }
}
