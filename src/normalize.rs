//! Record normalization: turns raw worksheet rows into canonical records,
//! isolating failures per row.
//!
//! Column labels follow the operator's spreadsheet convention (the sheets are
//! authored with Chinese headers) and are fixed, not configurable.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::{ImportError, Result};
use crate::sheet::{CellValue, Dataset};

pub const COL_ID: &str = "ID";
pub const COL_PROJECT: &str = "项目名称";
pub const COL_CHARACTER: &str = "角色名称";
pub const COL_ACTOR: &str = "演员姓名";
pub const COL_DATE: &str = "采集日期";
pub const COL_DURATION: &str = "拍摄时长";

/// All six columns must be present in a sheet's header row.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_ID,
    COL_PROJECT,
    COL_CHARACTER,
    COL_ACTOR,
    COL_DATE,
    COL_DURATION,
];

static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// The normalized, storage-ready representation of one source row.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// Unique business key; present and non-empty for every record.
    pub external_id: String,
    pub project_name: Option<String>,
    pub character_name: Option<String>,
    pub actor_name: Option<String>,
    pub capture_date: Option<NaiveDate>,
    pub duration_minutes: Option<i64>,
}

/// Per-row result channel: a row either yields a record or is skipped with a
/// reason. Recoverable field problems (bad date, bad duration) keep the row
/// and null the field instead.
#[derive(Debug)]
pub enum RowOutcome {
    Record(CanonicalRecord),
    Skipped { row: usize, reason: String },
}

/// Normalization result for one whole dataset.
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// Canonical records in original row order.
    pub records: Vec<CanonicalRecord>,
    /// Rows dropped for lacking an identifier.
    pub skipped_rows: usize,
}

struct ColumnIndexes {
    id: usize,
    project: usize,
    character: usize,
    actor: usize,
    date: usize,
    duration: usize,
}

fn resolve_columns(dataset: &Dataset) -> Result<ColumnIndexes> {
    let index = |name: &str| {
        dataset.column_index(name).ok_or_else(|| ImportError::Schema {
            column: name.to_string(),
        })
    };
    Ok(ColumnIndexes {
        id: index(COL_ID)?,
        project: index(COL_PROJECT)?,
        character: index(COL_CHARACTER)?,
        actor: index(COL_ACTOR)?,
        date: index(COL_DATE)?,
        duration: index(COL_DURATION)?,
    })
}

/// Normalizes every row of the dataset.
///
/// Fails fast with [`ImportError::Schema`] when a required column is missing;
/// otherwise each row is handled independently and a failure on one never
/// aborts the rest.
pub fn normalize_dataset(dataset: &Dataset) -> Result<NormalizedBatch> {
    let cols = resolve_columns(dataset)?;

    let mut batch = NormalizedBatch::default();
    for (idx, row) in dataset.rows().iter().enumerate() {
        match normalize_row(dataset, row, idx, &cols) {
            RowOutcome::Record(record) => batch.records.push(record),
            RowOutcome::Skipped { row, reason } => {
                // +2: sheet rows are 1-based and the header occupies row 1
                warn!(sheet_row = row + 2, %reason, "row skipped");
                batch.skipped_rows += 1;
            }
        }
    }
    Ok(batch)
}

fn normalize_row(
    dataset: &Dataset,
    row: &[CellValue],
    idx: usize,
    cols: &ColumnIndexes,
) -> RowOutcome {
    let external_id = match dataset.cell(row, cols.id).as_text() {
        Some(id) if !id.is_empty() => id,
        _ => {
            return RowOutcome::Skipped {
                row: idx,
                reason: "identifier cell is empty".to_string(),
            }
        }
    };

    let text_field = |col: usize| dataset.cell(row, col).as_text().filter(|s| !s.is_empty());

    let date_cell = dataset.cell(row, cols.date);
    let capture_date = match date_cell {
        CellValue::Empty => None,
        cell => {
            let parsed = parse_capture_date(cell);
            if parsed.is_none() {
                warn!(
                    sheet_row = idx + 2,
                    value = ?cell,
                    "unparseable capture date, field left absent"
                );
            }
            parsed
        }
    };

    let duration_cell = dataset.cell(row, cols.duration);
    let duration_minutes = match duration_cell {
        CellValue::Empty => None,
        cell => {
            let parsed = parse_duration_minutes(cell);
            if parsed.is_none() {
                warn!(
                    sheet_row = idx + 2,
                    value = ?cell,
                    "unparseable duration, field left absent"
                );
            }
            parsed
        }
    };

    RowOutcome::Record(CanonicalRecord {
        external_id,
        project_name: text_field(cols.project),
        character_name: text_field(cols.character),
        actor_name: text_field(cols.actor),
        capture_date,
        duration_minutes,
    })
}

/// Date policy, first match wins: a structured datetime cell is taken as-is;
/// text is tried against the operator's slash format, then a few generic
/// fallbacks.
pub fn parse_capture_date(cell: &CellValue) -> Option<NaiveDate> {
    match cell {
        CellValue::DateTime(dt) => Some(dt.date()),
        CellValue::Text(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

fn parse_date_text(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y/%m/%d") {
        return Some(date);
    }
    for fmt in ["%Y-%m-%d", "%Y.%m.%d", "%Y年%m月%d日"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Duration policy: a numeric cell is its integral value in minutes; text
/// yields the first maximal run of decimal digits (so `"2x60min"` is 2, not
/// 60 — the source convention is preserved as-is). Negative values and
/// digit-free text are absent.
pub fn parse_duration_minutes(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Number(n) if *n >= 0.0 => Some(*n as i64),
        CellValue::Text(s) => DIGIT_RUN
            .find(s)
            .and_then(|m| m.as_str().parse::<i64>().ok()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn row(id: &str, project: &str, character: &str, actor: &str, date: &str, duration: &str) -> Vec<CellValue> {
        [id, project, character, actor, date, duration]
            .iter()
            .map(|s| {
                if s.is_empty() {
                    CellValue::Empty
                } else {
                    text(s)
                }
            })
            .collect()
    }

    #[test]
    fn one_record_per_valid_row_in_order() {
        let dataset = Dataset::new(
            headers(),
            vec![
                row("A1", "P", "C", "N", "2024/01/01", "60min"),
                row("A2", "P", "C", "N", "2024/01/02", "90 min"),
            ],
        );
        let batch = normalize_dataset(&dataset).unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].external_id, "A1");
        assert_eq!(batch.records[1].external_id, "A2");
        assert_eq!(batch.skipped_rows, 0);
    }

    #[test]
    fn rows_without_identifier_are_dropped() {
        let dataset = Dataset::new(
            headers(),
            vec![
                row("A1", "P", "", "", "2024/01/01", "60min"),
                row("", "Q", "", "", "2024/01/02", "30min"),
                vec![CellValue::Empty; 6],
            ],
        );
        let batch = normalize_dataset(&dataset).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].external_id, "A1");
        assert_eq!(batch.skipped_rows, 2);
    }

    #[test]
    fn missing_required_column_is_a_schema_error() {
        let mut cols = headers();
        cols.remove(4); // drop the capture date column
        let dataset = Dataset::new(
            cols,
            vec![vec![
                text("A1"),
                text("P"),
                text("C"),
                text("N"),
                text("60min"),
            ]],
        );
        match normalize_dataset(&dataset) {
            Err(ImportError::Schema { column }) => assert_eq!(column, COL_DATE),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn slash_dates_parse() {
        assert_eq!(
            parse_capture_date(&text("2024/01/01")),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn structured_datetime_cells_take_precedence() {
        let dt = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(
            parse_capture_date(&CellValue::DateTime(dt)),
            NaiveDate::from_ymd_opt(2024, 3, 15)
        );
    }

    #[test]
    fn date_normalization_is_idempotent() {
        let date = parse_capture_date(&text("2024/06/30")).unwrap();
        let formatted = date.format("%Y-%m-%d").to_string();
        assert_eq!(parse_capture_date(&text(&formatted)), Some(date));
    }

    #[test]
    fn unparseable_date_keeps_the_row() {
        let dataset = Dataset::new(
            headers(),
            vec![row("A1", "P", "", "", "sometime soon", "60min")],
        );
        let batch = normalize_dataset(&dataset).unwrap();
        assert_eq!(batch.records.len(), 1);
        assert!(batch.records[0].capture_date.is_none());
        assert_eq!(batch.records[0].duration_minutes, Some(60));
    }

    #[test]
    fn duration_takes_first_digit_run() {
        assert_eq!(parse_duration_minutes(&text("120min")), Some(120));
        assert_eq!(parse_duration_minutes(&text("90 min")), Some(90));
        assert_eq!(parse_duration_minutes(&text("min")), None);
        // First run wins, by convention: "2x60min" means 2, not 60.
        assert_eq!(parse_duration_minutes(&text("2x60min")), Some(2));
    }

    #[test]
    fn numeric_duration_cells_are_taken_directly() {
        assert_eq!(parse_duration_minutes(&CellValue::Number(45.0)), Some(45));
        assert_eq!(parse_duration_minutes(&CellValue::Number(-5.0)), None);
    }

    #[test]
    fn datetime_duration_cells_are_absent_not_digit_mined() {
        // A date in the duration column is operator error; it yields absent
        // rather than the first digit run of its rendering (the year).
        let dt = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_duration_minutes(&CellValue::DateTime(dt)), None);
    }

    #[test]
    fn empty_optional_fields_are_absent_not_empty_strings() {
        let dataset = Dataset::new(headers(), vec![row("A1", "", "", "", "", "")]);
        let batch = normalize_dataset(&dataset).unwrap();
        let record = &batch.records[0];
        assert_eq!(record.project_name, None);
        assert_eq!(record.character_name, None);
        assert_eq!(record.actor_name, None);
        assert_eq!(record.capture_date, None);
        assert_eq!(record.duration_minutes, None);
    }

    #[test]
    fn numeric_identifier_cells_are_coerced_to_text() {
        let mut cells = row("", "P", "", "", "", "60min");
        cells[0] = CellValue::Number(1001.0);
        let dataset = Dataset::new(headers(), vec![cells]);
        let batch = normalize_dataset(&dataset).unwrap();
        assert_eq!(batch.records[0].external_id, "1001");
    }
}
