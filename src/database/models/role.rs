use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub permissions: Vec<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
}

/// Select-box entry for role pickers.
#[derive(Debug, Clone, Serialize)]
pub struct RoleOption {
    pub value: String,
    pub label: String,
    pub permissions: Vec<String>,
}

impl From<Role> for RoleOption {
    fn from(role: Role) -> Self {
        let label = role
            .description
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| role.name.clone());
        Self {
            value: role.name,
            label,
            permissions: role.permissions,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Replaces the grant set when present.
    pub permissions: Option<Vec<String>>,
}
