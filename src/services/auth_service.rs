use serde::Serialize;
use tracing::{info, warn};

use super::ServiceError;
use crate::auth::permissions::DEFAULT_ROLE;
use crate::auth::{IdentityStore, PasswordHasher, TokenCodec};
use crate::database::models::Principal;
use crate::database::repository::{RoleRepository, UserRepository};

/// Token plus the principal it was issued for.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub token: String,
    pub user: Principal,
}

/// Registration and password login.
#[derive(Debug, Clone)]
pub struct AuthService {
    users: UserRepository,
    roles: RoleRepository,
    hasher: PasswordHasher,
    codec: TokenCodec,
}

impl AuthService {
    pub fn new(
        users: UserRepository,
        roles: RoleRepository,
        hasher: PasswordHasher,
        codec: TokenCodec,
    ) -> Self {
        Self { users, roles, hasher, codec }
    }

    /// New principals get the `viewer` role.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ServiceError> {
        if self.users.exists_by_username_or_email(username, email, None).await? {
            return Err(ServiceError::Conflict("Username or email already exists".into()));
        }

        let role = self
            .roles
            .find_by_name(DEFAULT_ROLE)
            .await?
            .ok_or_else(|| ServiceError::BadRequest(format!("Role '{}' is not seeded", DEFAULT_ROLE)))?;

        let hash = self.hasher.hash(password).await?;
        let id = self.users.create(username, email, &hash, Some(role.id)).await?;
        info!("New admin registered: {} (id {})", username, id);

        self.session_for(id).await
    }

    /// Unknown user and wrong password produce the same error.
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthSession, ServiceError> {
        let invalid = || ServiceError::Unauthorized("Invalid credentials".into());

        let Some(credentials) = self.users.find_credentials_by_username(username).await? else {
            warn!("Login rejected for unknown user '{}'", username);
            return Err(invalid());
        };
        if !self.hasher.verify(password, &credentials.password_hash).await? {
            warn!("Login rejected for '{}': bad password", username);
            return Err(invalid());
        }

        info!("Admin logged in: {}", username);
        self.session_for(credentials.id).await
    }

    async fn session_for(&self, id: i32) -> Result<AuthSession, ServiceError> {
        let user = self
            .users
            .load_principal(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;
        let token = self.codec.issue(user.id, &user.username)?;
        Ok(AuthSession { token, user })
    }
}
