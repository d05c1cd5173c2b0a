use anyhow::{Context, Result, bail};
use sea_orm::Database;
use std::path::Path;
use tracing::{error, info, trace};

pub async fn import_contents(database_url: &str, course_id: i32, csv_path: &Path) -> Result<()> {
    trace!("Entering import_contents function");

    let data = std::fs::read(csv_path)
        .with_context(|| format!("Failed to read CSV file {}", csv_path.display()))?;

    let db = Database::connect(database_url).await?;
    let course = services::courses::get_course(&db, course_id).await?;
    info!("Importing {} into course '{}'", csv_path.display(), course.name);

    let outcome = services::importer::import_csv(&db, &course, &data).await?;
    if !outcome.is_success() {
        error!("Import into course {} failed", course.id);
        bail!("{}", outcome.error);
    }

    println!("Successfully imported {} contents into '{}'.", outcome.imported, course.name);
    Ok(())
}
