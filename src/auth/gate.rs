use std::sync::Arc;

use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use thiserror::Error;

use super::permissions::PermissionResolver;
use super::token::{JwtError, TokenCodec};
use crate::database::manager::DatabaseError;
use crate::database::models::Principal;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingToken,

    #[error("{0}")]
    MalformedHeader(&'static str),

    #[error("Token has expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("User no longer exists")]
    IdentityMissing,

    #[error("Permission '{0}' required")]
    Forbidden(String),

    #[error("Identity lookup failed: {0}")]
    Store(#[from] DatabaseError),
}

impl AuthError {
    /// 401 class: the caller is not (or no longer) a known principal.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken
                | AuthError::MalformedHeader(_)
                | AuthError::Expired
                | AuthError::InvalidToken
                | AuthError::IdentityMissing
        )
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => AuthError::Expired,
            _ => AuthError::InvalidToken,
        }
    }
}

/// Loads a principal with role and permission names by id.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn load_principal(&self, id: i32) -> Result<Option<Principal>, DatabaseError>;
}

/// Verifies bearer tokens, loads the principal behind them, and checks
/// route permissions through the [`PermissionResolver`].
///
/// Every failure short-circuits: a caller never receives a partly
/// populated principal.
#[derive(Clone)]
pub struct AuthGate {
    codec: TokenCodec,
    identities: Arc<dyn IdentityStore>,
    permissions: Arc<dyn PermissionResolver>,
}

impl AuthGate {
    pub fn new(
        codec: TokenCodec,
        identities: Arc<dyn IdentityStore>,
        permissions: Arc<dyn PermissionResolver>,
    ) -> Self {
        Self { codec, identities, permissions }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Token from an `Authorization: Bearer <token>` header.
    pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
        let header = headers.get(AUTHORIZATION).ok_or(AuthError::MissingToken)?;
        let value = header
            .to_str()
            .map_err(|_| AuthError::MalformedHeader("Invalid Authorization header format"))?;
        let token = value
            .strip_prefix("Bearer ")
            .ok_or(AuthError::MalformedHeader("Authorization header must use Bearer token format"))?
            .trim();
        if token.is_empty() {
            return Err(AuthError::MalformedHeader("Empty JWT token"));
        }
        Ok(token)
    }

    pub async fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.codec.verify(token)?;
        self.identities
            .load_principal(claims.sub)
            .await?
            .ok_or(AuthError::IdentityMissing)
    }

    pub async fn authenticate_headers(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = Self::bearer_token(headers)?;
        self.authenticate(token).await
    }

    /// Ok when the principal's role holds `permission`. A principal without
    /// a role holds nothing.
    pub async fn authorize(&self, principal: &Principal, permission: &str) -> Result<(), AuthError> {
        let Some(role_id) = principal.role_id else {
            return Err(AuthError::Forbidden(permission.to_string()));
        };
        if self.permissions.has_permission(role_id, permission).await? {
            Ok(())
        } else {
            Err(AuthError::Forbidden(permission.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::http::HeaderValue;
    use chrono::Duration;

    use super::*;
    use crate::auth::permissions::StaticGrants;
    use crate::auth::token::Claims;

    struct FakeIdentities(HashMap<i32, Principal>);

    #[async_trait]
    impl IdentityStore for FakeIdentities {
        async fn load_principal(&self, id: i32) -> Result<Option<Principal>, DatabaseError> {
            Ok(self.0.get(&id).cloned())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl IdentityStore for BrokenStore {
        async fn load_principal(&self, _id: i32) -> Result<Option<Principal>, DatabaseError> {
            Err(DatabaseError::Sqlx(sqlx::Error::PoolTimedOut))
        }
    }

    fn principal(id: i32, role_id: Option<i32>) -> Principal {
        Principal {
            id,
            username: format!("user{}", id),
            email: format!("user{}@example.com", id),
            role_id,
            role_name: role_id.map(|_| "viewer".to_string()),
            permissions: vec!["profile:view".to_string()],
        }
    }

    fn gate() -> AuthGate {
        let mut users = HashMap::new();
        users.insert(1, principal(1, Some(10)));
        users.insert(2, principal(2, None));
        AuthGate::new(
            TokenCodec::new("gate-secret", 1).unwrap(),
            Arc::new(FakeIdentities(users)),
            Arc::new(StaticGrants::new().grant(10, "profile:view")),
        )
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_header_parsing() {
        assert!(matches!(AuthGate::bearer_token(&HeaderMap::new()), Err(AuthError::MissingToken)));
        assert!(matches!(
            AuthGate::bearer_token(&headers("Basic abc")),
            Err(AuthError::MalformedHeader(_))
        ));
        assert!(matches!(
            AuthGate::bearer_token(&headers("Bearer   ")),
            Err(AuthError::MalformedHeader(_))
        ));
        assert_eq!(AuthGate::bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[tokio::test]
    async fn valid_token_loads_principal() {
        let gate = gate();
        let token = gate.codec().issue(1, "user1").unwrap();
        let principal = gate.authenticate_headers(&headers(&format!("Bearer {}", token))).await.unwrap();
        assert_eq!(principal.id, 1);
        assert_eq!(principal.role_id, Some(10));
    }

    #[tokio::test]
    async fn bad_tokens_fail_closed() {
        let gate = gate();

        let missing = gate.authenticate_headers(&HeaderMap::new()).await.unwrap_err();
        assert!(missing.is_unauthenticated());

        let garbage = gate.authenticate("garbage").await.unwrap_err();
        assert!(matches!(garbage, AuthError::InvalidToken));

        let expired = gate
            .codec()
            .sign(&Claims::new(1, "user1", Duration::hours(-3)))
            .unwrap();
        let err = gate.authenticate(&expired).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn deleted_principal_is_unauthenticated() {
        let gate = gate();
        let token = gate.codec().issue(99, "ghost").unwrap();
        let err = gate.authenticate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::IdentityMissing));
        assert!(err.is_unauthenticated());
    }

    #[tokio::test]
    async fn store_failure_is_not_reported_as_unauthenticated() {
        let gate = AuthGate::new(
            TokenCodec::new("gate-secret", 1).unwrap(),
            Arc::new(BrokenStore),
            Arc::new(StaticGrants::new()),
        );
        let token = gate.codec().issue(1, "user1").unwrap();
        let err = gate.authenticate(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
        assert!(!err.is_unauthenticated());
    }

    #[tokio::test]
    async fn authorize_consults_resolver() {
        let gate = gate();
        let with_role = principal(1, Some(10));
        let without_role = principal(2, None);

        assert!(gate.authorize(&with_role, "profile:view").await.is_ok());
        assert!(matches!(
            gate.authorize(&with_role, "users:view").await,
            Err(AuthError::Forbidden(p)) if p == "users:view"
        ));
        assert!(matches!(
            gate.authorize(&without_role, "profile:view").await,
            Err(AuthError::Forbidden(_))
        ));
    }
}
