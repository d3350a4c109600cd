use std::path::{Path, PathBuf};
use thiserror::Error;

use tidybank_core::{CanonicalRecord, View};

use crate::render::{self, SourceStyle};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Dump one view to a CSV file for audit/offline use.
///
/// Order-preserving; the Source back-reference is rendered as plain text
/// since a file snapshot has nothing to re-evaluate a formula against.
pub fn write_view_csv(
    dir: &Path,
    view: &View,
    records: &[CanonicalRecord],
) -> Result<PathBuf, SnapshotError> {
    std::fs::create_dir_all(dir)?;
    let file_name = format!(
        "{}.csv",
        view.kind.sheet_name().to_lowercase().replace(' ', "_")
    );
    let path = dir.join(file_name);

    let (header, rows) = render::render_view(view, records, SourceStyle::PlainText);
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(&header)?;
    for row in &rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(path)
}
