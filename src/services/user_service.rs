use tracing::info;

use super::ServiceError;
use crate::auth::permissions::DEFAULT_ROLE;
use crate::auth::PasswordHasher;
use crate::database::models::{NewUser, PasswordChange, ProfileUpdate, User, UserFilter, UserUpdate};
use crate::database::pagination::{PageRequest, Paginated};
use crate::database::repository::{RoleRepository, UserRepository};

/// User management and self-service profile rules.
#[derive(Debug, Clone)]
pub struct UserService {
    users: UserRepository,
    roles: RoleRepository,
    hasher: PasswordHasher,
}

impl UserService {
    pub fn new(users: UserRepository, roles: RoleRepository, hasher: PasswordHasher) -> Self {
        Self { users, roles, hasher }
    }

    pub async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Paginated<User>, ServiceError> {
        Ok(self.users.find_all(filter, page).await?)
    }

    pub async fn get(&self, id: i32) -> Result<User, ServiceError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))
    }

    pub async fn count(&self) -> Result<i64, ServiceError> {
        Ok(self.users.count().await?)
    }

    pub async fn create(&self, input: &NewUser) -> Result<User, ServiceError> {
        if self
            .users
            .exists_by_username_or_email(&input.username, &input.email, None)
            .await?
        {
            return Err(ServiceError::Conflict("Username or email already exists".into()));
        }

        let role_name = input.role.as_deref().unwrap_or(DEFAULT_ROLE);
        let role = self
            .roles
            .find_by_name(role_name)
            .await?
            .ok_or_else(|| ServiceError::BadRequest("Invalid role".into()))?;

        let hash = self.hasher.hash(&input.password).await?;
        let id = self
            .users
            .create(&input.username, &input.email, &hash, Some(role.id))
            .await?;
        info!("User {} created with role {}", input.username, role.name);
        self.get(id).await
    }

    /// Admins cannot edit their own account here; that goes through the
    /// profile endpoints.
    pub async fn update(&self, id: i32, input: &UserUpdate, current_user: i32) -> Result<User, ServiceError> {
        self.get(id).await?;
        if id == current_user {
            return Err(ServiceError::Forbidden(
                "Cannot modify your own account through this endpoint".into(),
            ));
        }
        if self
            .users
            .exists_by_username_or_email(&input.username, &input.email, Some(id))
            .await?
        {
            return Err(ServiceError::Conflict("Username or email already exists".into()));
        }
        let role = self
            .roles
            .find_by_name(&input.role)
            .await?
            .ok_or_else(|| ServiceError::BadRequest("Invalid role".into()))?;

        self.users.update(id, &input.username, &input.email, role.id).await?;
        info!("User {} updated", id);
        self.get(id).await
    }

    pub async fn delete(&self, id: i32, current_user: i32) -> Result<(), ServiceError> {
        if id == current_user {
            return Err(ServiceError::Forbidden("Cannot delete your own account".into()));
        }
        if !self.users.delete(id).await? {
            return Err(ServiceError::NotFound("User not found".into()));
        }
        info!("User {} deleted", id);
        Ok(())
    }

    pub async fn update_profile(&self, id: i32, update: &ProfileUpdate) -> Result<User, ServiceError> {
        if update.username.is_none() && update.email.is_none() {
            return Err(ServiceError::BadRequest("No fields to update".into()));
        }
        let username = update.username.as_deref().unwrap_or_default();
        let email = update.email.as_deref().unwrap_or_default();
        if self.users.exists_by_username_or_email(username, email, Some(id)).await? {
            return Err(ServiceError::Conflict("Username or email already exists".into()));
        }
        if !self.users.update_profile(id, update).await? {
            return Err(ServiceError::NotFound("User not found".into()));
        }
        info!("User {} profile updated", id);
        self.get(id).await
    }

    pub async fn change_password(&self, id: i32, change: &PasswordChange) -> Result<(), ServiceError> {
        let credentials = self
            .users
            .find_credentials(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;

        if !self.hasher.verify(&change.old_password, &credentials.password_hash).await? {
            return Err(ServiceError::BadRequest("Current password is incorrect".into()));
        }

        let hash = self.hasher.hash(&change.new_password).await?;
        self.users.update_password(id, &hash).await?;
        info!("User {} password changed", id);
        Ok(())
    }
}
