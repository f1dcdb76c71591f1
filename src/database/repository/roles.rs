use sqlx::PgPool;

use crate::database::manager::DatabaseError;
use crate::database::models::{Permission, Role};
use crate::database::schema::grant_by_name;

const ROLE_SELECT: &str = r#"
    SELECT
        r.id,
        r.name,
        r.description,
        COALESCE(
            array_agg(p.name::text ORDER BY p.name) FILTER (WHERE p.name IS NOT NULL),
            '{}'::text[]
        ) AS permissions,
        r.created_at,
        r.updated_at
    FROM roles r
    LEFT JOIN role_permissions rp ON rp.role_id = r.id
    LEFT JOIN permissions p ON p.id = rp.permission_id
"#;

#[derive(Debug, Clone)]
pub struct RoleRepository {
    pool: PgPool,
}

impl RoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_all(&self) -> Result<Vec<Role>, DatabaseError> {
        let sql = format!("{} GROUP BY r.id ORDER BY r.id", ROLE_SELECT);
        Ok(sqlx::query_as::<_, Role>(&sql).fetch_all(&self.pool).await?)
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<Role>, DatabaseError> {
        let sql = format!("{} WHERE r.id = $1 GROUP BY r.id", ROLE_SELECT);
        Ok(sqlx::query_as::<_, Role>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Role>, DatabaseError> {
        let sql = format!("{} WHERE r.name = $1 GROUP BY r.id", ROLE_SELECT);
        Ok(sqlx::query_as::<_, Role>(&sql).bind(name).fetch_optional(&self.pool).await?)
    }

    /// Insert a role and its grants atomically; returns the new id.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        permissions: &[String],
    ) -> Result<i32, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query_scalar::<_, i32>(
            "INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(name)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;
        grant_by_name(&mut tx, name, permissions).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Rename and describe a role. When `permissions` is `Some`, the grant
    /// set is replaced in the same transaction.
    pub async fn update(
        &self,
        id: i32,
        name: &str,
        description: Option<&str>,
        permissions: Option<&[String]>,
    ) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE roles
            SET name = $1, description = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        if let Some(permissions) = permissions {
            sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            grant_by_name(&mut tx, name, permissions).await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete(&self, id: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Number of admins currently assigned to the role.
    pub async fn count_users(&self, id: i32) -> Result<i64, DatabaseError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins WHERE role_id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn permissions(&self) -> Result<Vec<Permission>, DatabaseError> {
        let rows = sqlx::query_as::<_, Permission>(
            "SELECT id, name, description FROM permissions ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
