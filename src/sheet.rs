//! Dataset source: reads one worksheet of a workbook into a format-agnostic
//! table of named columns, so normalization never touches calamine types.

use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDateTime;
use std::path::Path;

use crate::error::{ImportError, Result};

/// A single cell after format-specific decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    DateTime(NaiveDateTime),
    Empty,
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    /// Coerces the cell to text the way a human reads it: integral floats
    /// render without a trailing `.0` so numeric IDs like `42` survive.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Text(s) => Some(s.trim().to_string()),
            CellValue::Number(f) => {
                if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                    Some(format!("{}", *f as i64))
                } else {
                    Some(format!("{}", f))
                }
            }
            CellValue::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
            CellValue::Empty => None,
        }
    }
}

/// One worksheet worth of rows, with a header row resolved to column names.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl Dataset {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Cell accessor tolerant of ragged rows: anything past the end of a
    /// short row is an absent cell.
    pub fn cell<'a>(&'a self, row: &'a [CellValue], col: usize) -> &'a CellValue {
        row.get(col).unwrap_or(&CellValue::Empty)
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => CellValue::DateTime(naive),
            None => CellValue::Empty,
        },
        Data::DateTimeIso(s) => CellValue::Text(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

/// Reads one worksheet of the workbook at `path` into a [`Dataset`].
///
/// When `sheet` is `None` the first worksheet is used, matching the operator
/// convention of one data sheet per file.
pub fn read_dataset(path: &Path, sheet: Option<&str>) -> Result<Dataset> {
    let workbook_err = |source| ImportError::Workbook {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(workbook_err)?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| workbook_err(calamine::Error::Msg("workbook has no sheets")))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ImportError::Workbook {
            path: path.to_path_buf(),
            source: e,
        })?;

    let mut rows_iter = range.rows();
    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| convert_cell(c).as_text().unwrap_or_default())
            .collect(),
        None => Vec::new(),
    };

    let rows: Vec<Vec<CellValue>> = rows_iter
        .map(|r| r.iter().map(convert_cell).collect())
        .collect();

    Ok(Dataset::new(headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_id_coerces_without_decimal_point() {
        assert_eq!(CellValue::Number(42.0).as_text().unwrap(), "42");
        assert_eq!(CellValue::Number(42.5).as_text().unwrap(), "42.5");
    }

    #[test]
    fn text_coercion_trims_whitespace() {
        assert_eq!(
            CellValue::Text("  A1 ".to_string()).as_text().unwrap(),
            "A1"
        );
        assert!(CellValue::Empty.as_text().is_none());
    }

    #[test]
    fn whitespace_only_source_cells_become_empty() {
        assert_eq!(convert_cell(&Data::String("   ".to_string())), CellValue::Empty);
        assert_eq!(convert_cell(&Data::Empty), CellValue::Empty);
    }

    #[test]
    fn ragged_rows_read_as_absent_cells() {
        let dataset = Dataset::new(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![CellValue::Text("x".to_string())]],
        );
        let row = &dataset.rows()[0];
        assert!(dataset.cell(row, 1).is_empty());
    }
}
