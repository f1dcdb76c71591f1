use clap::Args;
use sqlx::PgPool;

use crate::auth::PasswordHasher;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, Environment};
use crate::database::schema::{self, AdminSeed};

const DEV_ADMIN_PASSWORD: &str = "admin123";

#[derive(Args)]
pub struct SeedArgs {
    #[arg(long, default_value = "admin", help = "Username of the initial admin")]
    pub admin_username: String,

    #[arg(long, default_value = "admin@example.com", help = "Email of the initial admin")]
    pub admin_email: String,

    #[arg(long, help = "Password of the initial admin (or ADMIN_PASSWORD)")]
    pub admin_password: Option<String>,

    #[arg(long, help = "Seed permissions and roles only")]
    pub skip_admin: bool,
}

pub async fn handle(
    pool: &PgPool,
    config: &AppConfig,
    args: SeedArgs,
    output_format: OutputFormat,
) -> anyhow::Result<()> {
    schema::migrate(pool).await?;

    let admin = if args.skip_admin {
        None
    } else {
        let password = args
            .admin_password
            .or_else(|| std::env::var("ADMIN_PASSWORD").ok())
            .or_else(|| {
                (config.environment == Environment::Development).then(|| {
                    tracing::warn!("No admin password given, using the development default");
                    DEV_ADMIN_PASSWORD.to_string()
                })
            })
            .ok_or_else(|| anyhow::anyhow!("--admin-password or ADMIN_PASSWORD is required"))?;

        let password_hash = PasswordHasher::new(config.security.bcrypt_cost)
            .hash(&password)
            .await?;
        Some(AdminSeed {
            username: args.admin_username,
            email: args.admin_email,
            password_hash,
        })
    };

    let report = schema::seed(pool, admin.as_ref()).await?;
    let message = format!(
        "Seeded {} permissions, {} roles, {} grants{}",
        report.permissions_added,
        report.roles_added,
        report.grants_added,
        if report.admin_created { ", admin account created" } else { "" }
    );
    output_success(output_format, &message, Some(serde_json::to_value(&report)?))
}
