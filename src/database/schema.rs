//! Idempotent schema creation and seeding.
//!
//! Both steps run in a single transaction each and may be repeated safely:
//! tables use `IF NOT EXISTS`, seed rows use `ON CONFLICT DO NOTHING`.

use sqlx::{PgConnection, PgPool};
use tracing::info;

use crate::auth::permissions::{seeded_roles, ADMIN_ROLE, PERMISSION_CATALOG};
use crate::database::manager::DatabaseError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id SERIAL PRIMARY KEY,
        name VARCHAR(50) UNIQUE NOT NULL,
        description TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) UNIQUE NOT NULL,
        description TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id INTEGER REFERENCES roles(id) ON DELETE CASCADE,
        permission_id INTEGER REFERENCES permissions(id) ON DELETE CASCADE,
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS admins (
        id SERIAL PRIMARY KEY,
        username VARCHAR(50) UNIQUE NOT NULL,
        password_hash VARCHAR(255) NOT NULL,
        email VARCHAR(255) UNIQUE NOT NULL,
        role_id INTEGER REFERENCES roles(id),
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    // admins tables created before roles existed
    "ALTER TABLE admins ADD COLUMN IF NOT EXISTS role_id INTEGER REFERENCES roles(id)",
    "ALTER TABLE admins ADD COLUMN IF NOT EXISTS updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP",
    r#"
    CREATE TABLE IF NOT EXISTS visits (
        id SERIAL PRIMARY KEY,
        ip_address VARCHAR(45),
        user_agent TEXT,
        visit_date TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        page_url VARCHAR(255),
        referrer TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS messages (
        id SERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL,
        email VARCHAR(255),
        message TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        is_approved BOOLEAN DEFAULT FALSE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS memories (
        id SERIAL PRIMARY KEY,
        title VARCHAR(255) NOT NULL,
        description TEXT,
        memory_content TEXT,
        date DATE,
        images TEXT[],
        comment TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_visits_date ON visits(visit_date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_messages_date ON messages(created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_memories_date ON memories(date DESC)",
    "CREATE INDEX IF NOT EXISTS idx_admins_role ON admins(role_id)",
];

pub async fn migrate(pool: &PgPool) -> Result<(), DatabaseError> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;
    info!("Schema migration completed ({} statements)", SCHEMA.len());
    Ok(())
}

/// Result of a seed run, for operator output.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct SeedReport {
    pub permissions_added: u64,
    pub roles_added: u64,
    pub grants_added: u64,
    pub admin_created: bool,
}

/// The initial administrator created by [`seed`]. The password is already
/// hashed.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Insert the permission catalog, the built-in roles with their grants and,
/// when `admin` is given and no such user exists, the first administrator.
pub async fn seed(pool: &PgPool, admin: Option<&AdminSeed>) -> Result<SeedReport, DatabaseError> {
    let mut tx = pool.begin().await?;
    let mut report = SeedReport::default();

    for (name, description) in PERMISSION_CATALOG {
        report.permissions_added += sqlx::query(
            "INSERT INTO permissions (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(*name)
        .bind(*description)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    }

    for role in seeded_roles() {
        report.roles_added += sqlx::query(
            "INSERT INTO roles (name, description) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(role.name)
        .bind(role.description)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let grants: Vec<String> = role.grants.iter().map(|g| g.to_string()).collect();
        report.grants_added += grant_by_name(&mut tx, role.name, &grants).await?;
    }

    if let Some(admin) = admin {
        let created = sqlx::query(
            r#"
            INSERT INTO admins (username, email, password_hash, role_id)
            SELECT $1, $2, $3, r.id FROM roles r WHERE r.name = $4
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&admin.username)
        .bind(&admin.email)
        .bind(&admin.password_hash)
        .bind(ADMIN_ROLE)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        report.admin_created = created > 0;
    }

    tx.commit().await?;
    info!(
        permissions = report.permissions_added,
        roles = report.roles_added,
        grants = report.grants_added,
        admin_created = report.admin_created,
        "Seed completed"
    );
    Ok(report)
}

/// Grant permissions by name to the role named `role`. Existing grants are
/// left alone; unknown permission names match nothing.
pub(crate) async fn grant_by_name(
    conn: &mut PgConnection,
    role: &str,
    permissions: &[String],
) -> Result<u64, DatabaseError> {
    let result = sqlx::query(
        r#"
        INSERT INTO role_permissions (role_id, permission_id)
        SELECT r.id, p.id
        FROM roles r
        JOIN permissions p ON p.name = ANY($2)
        WHERE r.name = $1
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(role)
    .bind(permissions)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
