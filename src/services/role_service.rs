use tracing::info;

use super::ServiceError;
use crate::auth::permissions::ADMIN_ROLE;
use crate::database::models::{NewRole, Permission, Role, RoleOption, RoleUpdate};
use crate::database::repository::RoleRepository;

#[derive(Debug, Clone)]
pub struct RoleService {
    roles: RoleRepository,
}

impl RoleService {
    pub fn new(roles: RoleRepository) -> Self {
        Self { roles }
    }

    pub async fn list(&self) -> Result<Vec<Role>, ServiceError> {
        Ok(self.roles.find_all().await?)
    }

    pub async fn options(&self) -> Result<Vec<RoleOption>, ServiceError> {
        Ok(self.roles.find_all().await?.into_iter().map(RoleOption::from).collect())
    }

    pub async fn permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(self.roles.permissions().await?)
    }

    pub async fn get(&self, id: i32) -> Result<Role, ServiceError> {
        self.roles
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Role not found".into()))
    }

    pub async fn create(&self, input: &NewRole) -> Result<Role, ServiceError> {
        if self.roles.find_by_name(&input.name).await?.is_some() {
            return Err(ServiceError::Conflict("Role name already exists".into()));
        }
        let id = self
            .roles
            .create(&input.name, &input.description, &input.permissions)
            .await?;
        info!("Role {} created with {} permissions", input.name, input.permissions.len());
        self.get(id).await
    }

    /// Missing fields keep their current value; `permissions`, when given,
    /// replaces the whole grant set.
    pub async fn update(&self, id: i32, input: &RoleUpdate) -> Result<Role, ServiceError> {
        let existing = self.get(id).await?;

        let name = match input.name.as_deref() {
            Some(name) if name != existing.name => {
                if existing.name == ADMIN_ROLE {
                    return Err(ServiceError::BadRequest("Cannot rename admin role".into()));
                }
                if self.roles.find_by_name(name).await?.is_some() {
                    return Err(ServiceError::Conflict("Role name already exists".into()));
                }
                name
            }
            _ => existing.name.as_str(),
        };
        let description = input.description.as_deref().or(existing.description.as_deref());

        self.roles
            .update(id, name, description, input.permissions.as_deref())
            .await?;
        info!("Role {} updated", id);
        self.get(id).await
    }

    /// The admin role and roles still assigned to users cannot be deleted.
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let role = self.get(id).await?;
        if role.name == ADMIN_ROLE {
            return Err(ServiceError::BadRequest("Cannot delete admin role".into()));
        }
        if self.roles.count_users(id).await? > 0 {
            return Err(ServiceError::BadRequest("Cannot delete role with assigned users".into()));
        }
        self.roles.delete(id).await?;
        info!("Role {} ({}) deleted", id, role.name);
        Ok(())
    }
}
