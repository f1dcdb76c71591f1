//! Role to permission resolution.
//!
//! The `role_permissions` relation is the only source of truth. The `admin`
//! role holds every permission because it is seeded with a grant row for
//! each one; no role name is special-cased here.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::manager::DatabaseError;

pub const ADMIN_ROLE: &str = "admin";
pub const DEFAULT_ROLE: &str = "viewer";

/// Seeded permission catalog: `(name, description)`.
pub const PERMISSION_CATALOG: &[(&str, &str)] = &[
    ("dashboard:view", "View dashboard"),
    ("visits:view", "View visit statistics"),
    ("messages:view", "View messages"),
    ("messages:delete", "Moderate and delete messages"),
    ("memories:view", "View memories"),
    ("memories:create", "Create memories"),
    ("memories:edit", "Edit memories"),
    ("memories:delete", "Delete memories"),
    ("profile:view", "View own profile"),
    ("profile:edit", "Edit own profile"),
    ("users:view", "View users"),
    ("users:edit", "Create and edit users"),
    ("users:delete", "Delete users"),
    ("roles:view", "View roles"),
    ("roles:edit", "Create, edit and delete roles"),
];

pub const EDITOR_GRANTS: &[&str] = &[
    "dashboard:view",
    "visits:view",
    "messages:view",
    "messages:delete",
    "memories:view",
    "memories:create",
    "memories:edit",
    "memories:delete",
    "profile:view",
    "profile:edit",
];

pub const VIEWER_GRANTS: &[&str] = &[
    "dashboard:view",
    "visits:view",
    "messages:view",
    "memories:view",
    "profile:view",
    "profile:edit",
];

/// A role created by the seed, with the permission names granted to it.
#[derive(Debug, Clone)]
pub struct RoleSeed {
    pub name: &'static str,
    pub description: &'static str,
    pub grants: Vec<&'static str>,
}

pub fn seeded_roles() -> Vec<RoleSeed> {
    vec![
        RoleSeed {
            name: ADMIN_ROLE,
            description: "Administrator with every permission",
            grants: PERMISSION_CATALOG.iter().map(|(name, _)| *name).collect(),
        },
        RoleSeed {
            name: "editor",
            description: "Editor who manages content",
            grants: EDITOR_GRANTS.to_vec(),
        },
        RoleSeed {
            name: DEFAULT_ROLE,
            description: "Read-only visitor",
            grants: VIEWER_GRANTS.to_vec(),
        },
    ]
}

pub fn is_known_permission(name: &str) -> bool {
    PERMISSION_CATALOG.iter().any(|(known, _)| *known == name)
}

#[async_trait]
pub trait PermissionResolver: Send + Sync {
    async fn has_permission(&self, role_id: i32, permission: &str) -> Result<bool, DatabaseError>;
}

/// Resolves grants against `role_permissions` with a single EXISTS query.
#[derive(Debug, Clone)]
pub struct PgPermissionResolver {
    pool: PgPool,
}

impl PgPermissionResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PermissionResolver for PgPermissionResolver {
    async fn has_permission(&self, role_id: i32, permission: &str) -> Result<bool, DatabaseError> {
        let granted = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM role_permissions rp
                JOIN permissions p ON p.id = rp.permission_id
                WHERE rp.role_id = $1 AND p.name = $2
            )
            "#,
        )
        .bind(role_id)
        .bind(permission)
        .fetch_one(&self.pool)
        .await?;
        Ok(granted)
    }
}

/// In-memory grant table.
#[derive(Debug, Clone, Default)]
pub struct StaticGrants {
    grants: HashMap<i32, HashSet<String>>,
}

impl StaticGrants {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(mut self, role_id: i32, permission: &str) -> Self {
        self.grants.entry(role_id).or_default().insert(permission.to_string());
        self
    }
}

#[async_trait]
impl PermissionResolver for StaticGrants {
    async fn has_permission(&self, role_id: i32, permission: &str) -> Result<bool, DatabaseError> {
        Ok(self
            .grants
            .get(&role_id)
            .is_some_and(|granted| granted.contains(permission)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADMIN_ID: i32 = 1;
    const VIEWER_ID: i32 = 2;

    #[tokio::test]
    async fn grant_relation_is_authoritative() {
        let resolver = StaticGrants::new().grant(ADMIN_ID, "users:view");

        assert!(resolver.has_permission(ADMIN_ID, "users:view").await.unwrap());
        assert!(!resolver.has_permission(VIEWER_ID, "users:view").await.unwrap());
    }

    #[tokio::test]
    async fn admin_name_grants_nothing_by_itself() {
        // a role with no rows is denied whatever it is called
        let resolver = StaticGrants::new().grant(VIEWER_ID, "profile:view");
        assert!(!resolver.has_permission(ADMIN_ID, "roles:edit").await.unwrap());
    }

    #[test]
    fn seeded_admin_holds_whole_catalog() {
        let roles = seeded_roles();
        let admin = roles.iter().find(|r| r.name == ADMIN_ROLE).unwrap();
        assert_eq!(admin.grants.len(), PERMISSION_CATALOG.len());
        assert_eq!(PERMISSION_CATALOG.len(), 15);
    }

    #[test]
    fn seeded_grants_stay_inside_catalog() {
        for role in seeded_roles() {
            for grant in &role.grants {
                assert!(is_known_permission(grant), "{} grants unknown {}", role.name, grant);
            }
        }
        assert!(!is_known_permission("users:manage"));
    }
}
