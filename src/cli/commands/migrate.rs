use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::libraryelements::PgLibraryElementStore;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    DatabaseManager::health_check().await?;
    let pool = DatabaseManager::pool().await?;
    PgLibraryElementStore::new(pool).ensure_schema().await?;
    output_success(&output_format, "Library element tables are up to date", None)
}
