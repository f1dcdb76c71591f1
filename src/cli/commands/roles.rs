use clap::Subcommand;
use serde_json::json;
use sqlx::PgPool;

use crate::auth::permissions::is_known_permission;
use crate::cli::utils::{output_success, output_table};
use crate::cli::OutputFormat;
use crate::database::repository::RoleRepository;
use crate::database::schema::grant_by_name;

#[derive(Subcommand)]
pub enum RoleCommands {
    #[command(about = "List roles with their permissions")]
    List,

    #[command(about = "List the permission catalog")]
    Permissions,

    #[command(about = "Grant permissions to a role")]
    Grant {
        #[arg(help = "Role name")]
        role: String,
        #[arg(required = true, help = "Permission names, e.g. users:view")]
        permissions: Vec<String>,
    },
}

pub async fn handle(pool: &PgPool, cmd: RoleCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let roles = RoleRepository::new(pool.clone());

    match cmd {
        RoleCommands::List => {
            let all = roles.find_all().await?;
            let rows = all
                .iter()
                .map(|r| {
                    vec![
                        r.name.clone(),
                        r.permissions.len().to_string(),
                        r.permissions.join(","),
                    ]
                })
                .collect();
            output_table(
                output_format,
                "roles",
                &["NAME", "COUNT", "PERMISSIONS"],
                rows,
                serde_json::to_value(&all)?,
            )
        }
        RoleCommands::Permissions => {
            let catalog = roles.permissions().await?;
            let rows = catalog
                .iter()
                .map(|p| vec![p.name.clone(), p.description.clone().unwrap_or_default()])
                .collect();
            output_table(
                output_format,
                "permissions",
                &["NAME", "DESCRIPTION"],
                rows,
                serde_json::to_value(&catalog)?,
            )
        }
        RoleCommands::Grant { role, permissions } => {
            if let Some(unknown) = permissions.iter().find(|p| !is_known_permission(p)) {
                anyhow::bail!("Unknown permission '{}'", unknown);
            }
            if roles.find_by_name(&role).await?.is_none() {
                anyhow::bail!("Role '{}' not found", role);
            }

            let mut conn = pool.acquire().await?;
            let added = grant_by_name(&mut conn, &role, &permissions).await?;
            output_success(
                output_format,
                &format!("Granted {} new permission(s) to {}", added, role),
                Some(json!({ "role": role, "granted": added })),
            )
        }
    }
}
