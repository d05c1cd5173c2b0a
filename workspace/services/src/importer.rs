//! Bulk import of course contents from CSV.
//!
//! The first record is the header and must name the `name`, `description`
//! and `video_url` columns (in any order, extra columns are ignored). Every
//! data row is inserted inside one transaction; a single bad row rolls back
//! the whole batch.

use std::collections::HashMap;

use chrono::Utc;
use csv::{ReaderBuilder, StringRecord};
use model::entities::{course, course_content};
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, TransactionTrait};
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError};

const REQUIRED_COLUMNS: [&str; 3] = ["name", "description", "video_url"];
const MAX_NAME_LEN: usize = 200;
const MAX_VIDEO_URL_LEN: usize = 200;

/// What an import did. On failure `imported` is 0 and `error` explains why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub imported: u64,
    pub error: String,
}

impl ImportOutcome {
    fn success(imported: u64) -> Self {
        Self {
            imported,
            error: String::new(),
        }
    }

    fn failure(error: impl Into<String>) -> Self {
        Self {
            imported: 0,
            error: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_empty()
    }

    /// Number of imported rows, or [`ServiceError::Import`] with the message.
    pub fn into_result(self) -> Result<u64> {
        if self.is_success() {
            Ok(self.imported)
        } else {
            Err(ServiceError::Import(self.error))
        }
    }
}

struct ContentRow {
    name: String,
    description: String,
    video_url: Option<String>,
}

fn parse_row(record: &StringRecord, columns: &HashMap<String, usize>) -> std::result::Result<ContentRow, String> {
    if record.len() < REQUIRED_COLUMNS.len() {
        return Err("row has too few columns".to_string());
    }

    let field = |name: &str| -> std::result::Result<String, String> {
        columns
            .get(name)
            .and_then(|idx| record.get(*idx))
            .map(|v| v.trim().to_string())
            .ok_or_else(|| format!("column '{}' is missing", name))
    };

    let name = field("name")?;
    if name.is_empty() {
        return Err("column 'name' must not be empty".to_string());
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(format!("column 'name' is longer than {} characters", MAX_NAME_LEN));
    }
    let description = field("description")?;
    let video_url = field("video_url")?;
    if video_url.chars().count() > MAX_VIDEO_URL_LEN {
        return Err(format!(
            "column 'video_url' is longer than {} characters",
            MAX_VIDEO_URL_LEN
        ));
    }

    Ok(ContentRow {
        name,
        description,
        video_url: Some(video_url).filter(|v| !v.is_empty()),
    })
}

/// Imports every row of `data` as a content item of `course`.
///
/// Row failures are reported in the outcome rather than as an error; `Err`
/// is only returned when the transaction itself cannot be opened or committed.
#[instrument(skip(db, course, data), fields(course_id = course.id, bytes = data.len()))]
pub async fn import_csv<C>(db: &C, course: &course::Model, data: &[u8]) -> Result<ImportOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data);
    let mut records = reader.records();

    let header = match records.next() {
        Some(Ok(header)) => header,
        Some(Err(e)) => {
            warn!("Unreadable CSV header: {}", e);
            return Ok(ImportOutcome::failure(format!("Could not read the CSV header: {}", e)));
        }
        None => {
            warn!("Empty CSV file");
            return Ok(ImportOutcome::failure("CSV file is empty or has an empty header row."));
        }
    };

    let columns: HashMap<String, usize> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_string(), idx))
        .collect();
    if !REQUIRED_COLUMNS.iter().all(|c| columns.contains_key(*c)) {
        warn!("CSV header {:?} lacks required columns", header);
        return Ok(ImportOutcome::failure(
            "CSV header is incomplete or invalid. Required: name, description, video_url.",
        ));
    }

    let txn = db.begin().await?;
    let mut imported = 0u64;
    let mut errors = Vec::new();

    for (idx, record) in records.enumerate() {
        // Header is line 1; fall back to the record index when positions are unknown
        let fallback_line = idx as u64 + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(fallback_line);
                errors.push(format!("Row {}: invalid data - {}.", line, e));
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(fallback_line);
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }

        let row = match parse_row(&record, &columns) {
            Ok(row) => row,
            Err(reason) => {
                errors.push(format!(
                    "Row {}: invalid data - {}. Data: {:?}",
                    line,
                    reason,
                    record.iter().collect::<Vec<_>>()
                ));
                continue;
            }
        };

        let now = Utc::now().naive_utc();
        let inserted = course_content::ActiveModel {
            name: Set(row.name),
            description: Set(row.description),
            video_url: Set(row.video_url),
            file_attachment: Set(None),
            course_id: Set(course.id),
            parent_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await;

        match inserted {
            Ok(content) => {
                debug!("Row {} imported as content {}", line, content.id);
                imported += 1;
            }
            Err(e) => errors.push(format!(
                "Row {}: invalid data - {}. Data: {:?}",
                line,
                e,
                record.iter().collect::<Vec<_>>()
            )),
        }
    }

    if !errors.is_empty() {
        txn.rollback().await?;
        warn!("CSV import into course {} rolled back, {} bad rows", course.id, errors.len());
        return Ok(ImportOutcome::failure(format!("Import failed. {}", errors.join("\n"))));
    }

    txn.commit().await?;
    info!("Imported {} contents into course {}", imported, course.id);
    Ok(ImportOutcome::success(imported))
}
