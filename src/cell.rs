//! Untyped spreadsheet cells and the row records built from them.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Placeholder the source workbooks use for "no value".
pub const PLACEHOLDER: &str = "-";

/// Column headers of the identity fields in the source exports.
pub mod columns {
    pub const PLAYER_NAME: &str = "Игрок";
    pub const TEAM_NAME: &str = "Команда";
    pub const POSITION: &str = "Позиция";
    pub const AGE: &str = "Возраст";
    pub const HEIGHT: &str = "Рост";
    pub const WEIGHT: &str = "Вес";
    pub const CITIZENSHIP: &str = "Гражданство";

    pub const REQUIRED: &[&str] = &[PLAYER_NAME, TEAM_NAME, POSITION];
    /// Identity columns read verbatim, never coerced to numbers.
    pub const TEXT: &[&str] = &[PLAYER_NAME, TEAM_NAME, POSITION, CITIZENSHIP];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub enum CellValue {
    #[default]
    Missing,
    Text(String),
    Number(f64),
}

/// Why a cell could not be read as a metric value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricCellError {
    NotNumeric(String),
    NonFinite(f64),
}

impl CellValue {
    /// Builds a cell from raw text, normalizing blanks and the placeholder to
    /// `Missing` and numeric text to `Number`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == PLACEHOLDER {
            return CellValue::Missing;
        }
        match parse_decimal(trimmed) {
            Some(n) => CellValue::Number(n),
            None => CellValue::Text(trimmed.to_string()),
        }
    }

    /// Like `from_raw`, but keeps any non-blank value as trimmed text.
    pub fn from_raw_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == PLACEHOLDER {
            CellValue::Missing
        } else {
            CellValue::Text(trimmed.to_string())
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Missing => true,
            CellValue::Text(s) => {
                let s = s.trim();
                s.is_empty() || s == PLACEHOLDER
            }
            CellValue::Number(_) => false,
        }
    }

    /// Metric coercion. `Ok(None)` for missing cells; non-finite values are
    /// reported separately from non-numeric text so callers can drop them
    /// without a warning.
    pub fn as_metric_value(&self) -> Result<Option<f64>, MetricCellError> {
        if self.is_missing() {
            return Ok(None);
        }
        let value = match self {
            CellValue::Number(n) => *n,
            CellValue::Text(s) => parse_decimal(s.trim())
                .ok_or_else(|| MetricCellError::NotNumeric(s.trim().to_string()))?,
            CellValue::Missing => return Ok(None),
        };
        if !value.is_finite() {
            return Err(MetricCellError::NonFinite(value));
        }
        Ok(Some(value))
    }

    /// Whole-number coercion for age, height and weight. Fractions are
    /// truncated toward zero.
    pub fn as_whole_number(&self) -> Result<Option<i64>, String> {
        match self.as_metric_value() {
            Ok(Some(v)) => Ok(Some(v.trunc() as i64)),
            Ok(None) => Ok(None),
            Err(MetricCellError::NotNumeric(raw)) => Err(raw),
            Err(MetricCellError::NonFinite(v)) => Err(v.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            CellValue::Text(s) => Some(s.trim().to_string()),
            CellValue::Number(n) if n.fract() == 0.0 => Some(format!("{}", *n as i64)),
            CellValue::Number(n) => Some(n.to_string()),
            CellValue::Missing => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

/// One spreadsheet row: external column label → cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowRecord {
    cells: HashMap<String, CellValue>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: impl Into<CellValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: &str, value: impl Into<CellValue>) {
        self.cells.insert(column.trim().to_string(), value.into());
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    /// Present and not blank / placeholder.
    pub fn has_value(&self, column: &str) -> bool {
        self.get(column).is_some_and(|cell| !cell.is_missing())
    }

    pub fn text(&self, column: &str) -> Option<String> {
        self.get(column).and_then(CellValue::as_text)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromIterator<(String, CellValue)> for RowRecord {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        let mut row = RowRecord::new();
        for (column, cell) in iter {
            row.insert(&column, cell);
        }
        row
    }
}

// Accepts both "3.2" and "3,2"; Russian-locale exports use the comma.
fn parse_decimal(raw: &str) -> Option<f64> {
    if let Ok(v) = raw.parse::<f64>() {
        return Some(v);
    }
    if raw.matches(',').count() == 1 && !raw.contains('.') {
        return raw.replace(',', ".").parse::<f64>().ok();
    }
    None
}
