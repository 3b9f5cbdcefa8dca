//! Reads tabular exports into `RowRecord`s.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};

use crate::cell::{CellValue, RowRecord, columns};

/// Header labels plus the rows under them.
#[derive(Debug, Clone, Default)]
pub struct RowTable {
    pub headers: Vec<String>,
    pub rows: Vec<RowRecord>,
}

impl RowTable {
    pub fn header_refs(&self) -> impl Iterator<Item = &str> {
        self.headers.iter().map(String::as_str)
    }
}

pub fn read_rows_csv(path: &Path) -> Result<RowTable> {
    let file =
        std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    read_rows_from_reader(file).with_context(|| format!("read rows from {}", path.display()))
}

/// Comma or semicolon delimited; the delimiter is taken from the header line.
/// Short rows leave their trailing columns missing; fully blank rows are
/// dropped.
pub fn read_rows_from_reader<R: Read>(mut reader: R) -> Result<RowTable> {
    let mut raw = Vec::new();
    reader.read_to_end(&mut raw).context("read csv input")?;
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(raw.as_slice());

    let mut rdr = ReaderBuilder::new()
        .delimiter(sniff_delimiter(raw))
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(raw);

    let headers = rdr
        .headers()
        .context("read csv header")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("read csv record {}", idx + 1))?;
        let row = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !header.is_empty())
            .map(|(header, raw)| {
                let cell = if columns::TEXT.contains(&header.as_str()) {
                    CellValue::from_raw_text(raw)
                } else {
                    CellValue::from_raw(raw)
                };
                (header.clone(), cell)
            })
            .collect::<RowRecord>();
        if row.columns().any(|c| row.has_value(c)) {
            rows.push(row);
        }
    }

    Ok(RowTable { headers, rows })
}

fn sniff_delimiter(raw: &[u8]) -> u8 {
    let first_line = raw.split(|b| *b == b'\n').next().unwrap_or_default();
    let semis = first_line.iter().filter(|b| **b == b';').count();
    let commas = first_line.iter().filter(|b| **b == b',').count();
    if semis > commas { b';' } else { b',' }
}
