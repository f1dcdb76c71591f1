use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::IdentityStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{Principal, ProfileUpdate, User, UserCredentials, UserFilter};
use crate::database::pagination::{PageRequest, Paginated};
use crate::database::query_builder::{QueryBuilder, SortDirection};

const USER_COLUMNS: &[&str] = &[
    "a.id",
    "a.username",
    "a.email",
    "a.role_id",
    "r.name AS role",
    "a.created_at",
    "a.updated_at",
];

/// Principal with role name and permission names, one row per admin.
const PRINCIPAL_QUERY: &str = r#"
    SELECT
        a.id,
        a.username,
        a.email,
        a.role_id,
        r.name AS role_name,
        COALESCE(
            array_agg(p.name::text ORDER BY p.name) FILTER (WHERE p.name IS NOT NULL),
            '{}'::text[]
        ) AS permissions
    FROM admins a
    LEFT JOIN roles r ON r.id = a.role_id
    LEFT JOIN role_permissions rp ON rp.role_id = a.role_id
    LEFT JOIN permissions p ON p.id = rp.permission_id
    WHERE a.id = $1
    GROUP BY a.id, r.name
"#;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn base() -> QueryBuilder {
        QueryBuilder::table("admins a")
            .select(USER_COLUMNS)
            .left_join("roles r", "a.role_id = r.id")
    }

    /// Newest first. `keyword` matches username or email, case-insensitively;
    /// `role` is an exact role name. Both narrow the total as well as the page.
    pub fn list_query(filter: &UserFilter) -> QueryBuilder {
        let mut query = Self::base();

        if let Some(keyword) = filter.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
            query = query.where_any(|p| {
                p.like("a.username", keyword, true);
                p.like("a.email", keyword, true);
            });
        }
        if let Some(role) = filter.role.as_deref().filter(|r| !r.is_empty()) {
            query = query.where_eq("r.name", role);
        }

        query
            .order_by("a.created_at", SortDirection::Desc)
            .order_by("a.id", SortDirection::Desc)
    }

    pub async fn find_all(
        &self,
        filter: &UserFilter,
        page: PageRequest,
    ) -> Result<Paginated<User>, DatabaseError> {
        Self::list_query(filter).paginate(&self.pool, page).await
    }

    pub async fn find_by_id(&self, id: i32) -> Result<Option<User>, DatabaseError> {
        Self::base().where_eq("a.id", id).first(&self.pool).await
    }

    pub async fn find_credentials_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserCredentials>, DatabaseError> {
        QueryBuilder::table("admins")
            .select(&["id", "username", "password_hash"])
            .where_eq("username", username)
            .first(&self.pool)
            .await
    }

    pub async fn find_credentials(&self, id: i32) -> Result<Option<UserCredentials>, DatabaseError> {
        QueryBuilder::table("admins")
            .select(&["id", "username", "password_hash"])
            .where_eq("id", id)
            .first(&self.pool)
            .await
    }

    /// True when another admin already uses `username` or `email`.
    pub async fn exists_by_username_or_email(
        &self,
        username: &str,
        email: &str,
        exclude_id: Option<i32>,
    ) -> Result<bool, DatabaseError> {
        let mut query = QueryBuilder::table("admins").where_any(|p| {
            p.equals("username", username);
            p.equals("email", email);
        });
        if let Some(id) = exclude_id {
            query = query.where_ne("id", id);
        }
        Ok(query.count(&self.pool).await? > 0)
    }

    pub async fn create(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        role_id: Option<i32>,
    ) -> Result<i32, DatabaseError> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO admins (username, email, password_hash, role_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(role_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn update(
        &self,
        id: i32,
        username: &str,
        email: &str,
        role_id: i32,
    ) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE admins
            SET username = $1, email = $2, role_id = $3, updated_at = CURRENT_TIMESTAMP
            WHERE id = $4
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(role_id)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Absent fields keep their current value.
    pub async fn update_profile(&self, id: i32, update: &ProfileUpdate) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE admins
            SET username = COALESCE($1, username),
                email = COALESCE($2, email),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            "#,
        )
        .bind(update.username.as_deref())
        .bind(update.email.as_deref())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password(&self, id: i32, password_hash: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE admins SET password_hash = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
        )
        .bind(password_hash)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: i32) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        QueryBuilder::table("admins").count(&self.pool).await
    }
}

#[async_trait]
impl IdentityStore for UserRepository {
    async fn load_principal(&self, id: i32) -> Result<Option<Principal>, DatabaseError> {
        let principal = sqlx::query_as::<_, Principal>(PRINCIPAL_QUERY)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::params::SqlValue;

    const FROM: &str = "FROM admins a LEFT JOIN roles r ON a.role_id = r.id";

    fn filter(keyword: Option<&str>, role: Option<&str>) -> UserFilter {
        UserFilter {
            keyword: keyword.map(String::from),
            role: role.map(String::from),
            ..UserFilter::default()
        }
    }

    #[test]
    fn keyword_and_role_narrow_list_and_count_alike() {
        let query = UserRepository::list_query(&filter(Some(" ann "), Some("viewer")));
        let predicate = "WHERE (a.username ILIKE $1 OR a.email ILIKE $2) AND r.name = $3";
        let params = vec![
            SqlValue::Text("%ann%".into()),
            SqlValue::Text("%ann%".into()),
            SqlValue::Text("viewer".into()),
        ];

        let count = query.to_count_statement();
        assert_eq!(count.sql, format!("SELECT COUNT(*) AS total {} {}", FROM, predicate));
        assert_eq!(count.params, params);

        let list = query.to_statement();
        assert_eq!(
            list.sql,
            format!(
                "SELECT {} {} {} ORDER BY a.created_at DESC, a.id DESC",
                USER_COLUMNS.join(", "),
                FROM,
                predicate
            )
        );
        assert_eq!(list.params, params);
    }

    #[test]
    fn blank_filters_add_no_where() {
        let query = UserRepository::list_query(&filter(Some("   "), Some("")));
        assert_eq!(query.to_count_statement().sql, format!("SELECT COUNT(*) AS total {}", FROM));
        assert!(query.to_statement().params.is_empty());
    }

    #[test]
    fn role_alone_binds_first_placeholder() {
        let count = UserRepository::list_query(&filter(None, Some("admin"))).to_count_statement();
        assert!(count.sql.ends_with("WHERE r.name = $1"), "{}", count.sql);
        assert_eq!(count.params, vec![SqlValue::Text("admin".into())]);
    }
}
