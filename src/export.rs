use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use directories::UserDirs;
use rust_xlsxwriter::{Format, Workbook};
use tracing::info;

use crate::engine::{ExportRow, COLUMNS};
use crate::model::{Schedule, ScheduleEvent};

pub const SHEET_NAME: &str = "Tasks";

/// Name of the workbook exported on `date`, e.g. `Schedule_October_19_2026.xlsx`.
pub fn file_name(date: NaiveDate) -> String {
    format!("Schedule_{}.xlsx", date.format("%B_%d_%Y"))
}

/// The user's download directory, or the current directory when the
/// platform has none.
pub fn default_export_dir() -> PathBuf {
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Encode the rows as an xlsx document: one sheet, a bold header row with
/// the column names, then one row per task.
pub fn workbook_bytes(rows: &[ExportRow]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(SHEET_NAME)
        .context("Failed to name the worksheet.")?;

    for (col, title) in COLUMNS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *title, &header)
            .context("Failed to write the header row.")?;
    }
    for (index, row) in rows.iter().enumerate() {
        let line = index as u32 + 1;
        for (col, cell) in row.cells().iter().enumerate() {
            worksheet
                .write_string(line, col as u16, *cell)
                .with_context(|| format!("Failed to write row {}.", line))?;
        }
    }
    worksheet.autofit();

    workbook
        .save_to_buffer()
        .context("Failed to encode the schedule workbook.")
}

/// Write the schedule to `dir` as the workbook for `date` and tell the
/// listeners about it. Returns the path of the written file.
pub fn export(schedule: &Schedule, dir: &Path, date: NaiveDate) -> Result<PathBuf> {
    let rows = schedule.export_table()?;
    let bytes = workbook_bytes(&rows)?;

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}.", dir.display()))?;
    let path = dir.join(file_name(date));
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}.", path.display()))?;

    info!(path = %path.display(), rows = rows.len(), "schedule exported");
    schedule.notify(&ScheduleEvent::Exported { path: path.clone() });
    Ok(path)
}
