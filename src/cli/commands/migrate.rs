use sqlx::PgPool;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::schema;

pub async fn handle(pool: &PgPool, output_format: OutputFormat) -> anyhow::Result<()> {
    schema::migrate(pool).await?;
    output_success(output_format, "Schema is up to date", None)
}
