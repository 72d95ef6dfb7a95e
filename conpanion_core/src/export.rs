//! CSV export of completed workout sessions.

use crate::{Result, WorkoutSessionRecord};
use std::path::Path;
use tempfile::NamedTempFile;

/// One performed set; session columns repeat on every row
#[derive(Debug, serde::Serialize)]
struct CsvRow<'a> {
    performed_at: String,
    plan: &'a str,
    exercise: &'a str,
    set_number: u32,
    reps: u32,
    weight_kg: f64,
    session_seconds: u64,
    calories_burned: i64,
}

/// Write one row per completed set to `path`, replacing any existing file
///
/// The file is written to a temporary sibling, synced, and then renamed
/// over `path`, so readers never see a partial export.
/// Returns the number of rows written.
pub fn export_sessions_csv(records: &[WorkoutSessionRecord], path: &Path) -> Result<usize> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let temp = NamedTempFile::new_in(dir)?;
    let mut writer = csv::Writer::from_writer(temp.as_file());
    let mut rows = 0;

    for record in records {
        let performed_at = record.performed_at().to_rfc3339();
        for exercise in &record.exercises {
            for set in &exercise.sets {
                writer.serialize(CsvRow {
                    performed_at: performed_at.clone(),
                    plan: &record.plan_name,
                    exercise: &exercise.exercise_name,
                    set_number: set.number,
                    reps: set.reps,
                    weight_kg: set.weight_kg,
                    session_seconds: record.session_seconds,
                    calories_burned: record.calories_burned,
                })?;
                rows += 1;
            }
        }
    }

    writer.flush()?;
    drop(writer);
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| crate::Error::Io(e.error))?;

    tracing::info!(
        "Exported {} sets from {} sessions to {:?}",
        rows,
        records.len(),
        path
    );
    Ok(rows)
}
