pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

#[derive(Parser)]
#[command(name = "birthday-admin")]
#[command(about = "Birthday Admin CLI - schema, seed and role maintenance")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Create or update the database schema")]
    Migrate,

    #[command(about = "Seed permissions, roles and the initial admin account")]
    Seed(commands::seed::SeedArgs),

    #[command(about = "Inspect roles and grant permissions")]
    Roles {
        #[command(subcommand)]
        cmd: commands::roles::RoleCommands,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let config = AppConfig::from_env();
    config.validate()?;
    let pool = crate::database::manager::connect(&config.database).await?;

    match cli.command {
        Commands::Migrate => commands::migrate::handle(&pool, output_format).await,
        Commands::Seed(args) => commands::seed::handle(&pool, &config, args, output_format).await,
        Commands::Roles { cmd } => commands::roles::handle(&pool, cmd, output_format).await,
    }
}
