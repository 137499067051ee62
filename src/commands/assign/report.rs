use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::AssignedValue;
use crate::util::ensure_parent_directory;

const REPORT_HEADER: [&str; 6] = ["document_id", "field", "entity", "value", "ground_truth", "evidence"];

pub fn append_report(path: &Path, rows: &[AssignedValue]) -> Result<usize> {
    ensure_parent_directory(path)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open report {}", path.display()))?;
    let needs_header = file
        .metadata()
        .with_context(|| format!("failed to stat report {}", path.display()))?
        .len()
        == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if needs_header {
        writer.write_record(REPORT_HEADER)?;
    }
    for row in rows {
        writer
            .serialize(row)
            .with_context(|| format!("failed to write report row for {}", row.field))?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush report {}", path.display()))?;
    Ok(rows.len())
}
