use crate::domain::models::{BreakEntry, SheetRow, TIME_FORMAT};
use crate::infrastructure::config::SheetLayout;
use crate::infrastructure::error::InfraError;
use chrono::{Duration, NaiveTime};

const FIRST_DATA_ROW: u32 = 2;

/// 1-based index of the first row whose first cell is missing or empty, or `len + 1`.
pub fn find_first_empty_row(column: &[Vec<String>]) -> u32 {
    column
        .iter()
        .position(|row| row.first().is_none_or(|cell| cell.is_empty()))
        .unwrap_or(column.len()) as u32
        + 1
}

/// Shifts an `HH:MM:SS` string by a fixed number of minutes, wrapping at midnight.
pub fn shift_time(value: &str, offset_minutes: i64) -> Result<String, InfraError> {
    let parsed = NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|error| InfraError::Validation(format!("time '{value}' must be HH:MM:SS: {error}")))?;
    let offset = Duration::try_minutes(offset_minutes)
        .ok_or_else(|| InfraError::Validation(format!("time offset of {offset_minutes} minutes is out of range")))?;
    let (shifted, _) = parsed.overflowing_add_signed(offset);
    Ok(shifted.format(TIME_FORMAT).to_string())
}

pub fn column_range(layout: &SheetLayout, column: &str) -> String {
    qualify(layout, &format!("{column}:{column}"))
}

pub fn row_range(layout: &SheetLayout, row_index: u32) -> String {
    qualify(layout, &format!("A{row_index}:G{row_index}"))
}

fn qualify(layout: &SheetLayout, range: &str) -> String {
    match layout.sheet_name.as_deref() {
        Some(name) => format!("'{}'!{range}", name.replace('\'', "''")),
        None => range.to_string(),
    }
}

pub fn encode_break_row(
    entry: &BreakEntry,
    row_index: u32,
    layout: &SheetLayout,
) -> Result<SheetRow, InfraError> {
    // The range always contains the row itself, even above the first data row.
    let first = row_index.min(FIRST_DATA_ROW);
    let last = row_index.max(FIRST_DATA_ROW);
    Ok(SheetRow {
        row_index,
        date: entry.date.clone(),
        start_time: shift_time(&entry.start_time, layout.time_offset_minutes)?,
        end_time: shift_time(&entry.end_time, layout.time_offset_minutes)?,
        duration_formula: format!("=C{row_index}-B{row_index}"),
        reason: entry.reason.clone(),
        running_total_formula: format!(
            "=SUMIF(A{first}:A{last},A{row_index},D{first}:D{last})"
        ),
    })
}
