// Tabular row sources for the import engine.
//
// Rows come from operator-maintained spreadsheets and CSV exports with
// arbitrary column casing and spacing. Keys are normalized once here into a
// fixed shape; everything downstream works on `SheetRow`. Spreadsheet
// workbooks that cannot be read are retried as delimited text before the
// import is declared fatal.

use anyhow::{anyhow, Context as _};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::error::{Error, Result};

/// One input row with normalized keys. Values are kept raw; access trims
/// and treats blank as absent.
#[derive(Debug, Clone, Default)]
pub struct SheetRow {
    values: HashMap<String, String>,
}

impl SheetRow {
    pub fn from_pairs<I, K, V>(pairs: I) -> SheetRow
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        SheetRow {
            values: pairs
                .into_iter()
                .map(|(k, v)| (normalize_key(k.as_ref()), v.into()))
                .collect(),
        }
    }

    /// First non-blank value among the given column names (already
    /// normalized). Aliases let the same logical field match both the
    /// English name and the legacy spreadsheet header.
    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| {
            self.values
                .get(*key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        })
    }

    pub fn get_owned(&self, keys: &[&str]) -> Option<String> {
        self.get(keys).map(str::to_string)
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(|v| v.trim().is_empty())
    }
}

impl From<HashMap<String, String>> for SheetRow {
    fn from(map: HashMap<String, String>) -> Self {
        SheetRow::from_pairs(map)
    }
}

/// Lowercase, trim, and replace internal spaces with underscores.
pub fn normalize_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// Read a delimited text file into rows. Exports from the field sites are
/// usually UTF-8 but older ones are Latin-1; an invalid UTF-8 stream is
/// re-decoded byte-for-byte rather than rejected.
pub fn read_delimited_rows(path: &Path) -> Result<Vec<SheetRow>> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::FatalIngestion(format!("cannot read {}: {e}", path.display())))?;
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        // Latin-1 code points map 1:1 onto Unicode scalars.
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    };
    parse_delimited(&text)
}

fn parse_delimited(text: &str) -> Result<Vec<SheetRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| Error::FatalIngestion(format!("unreadable header row: {e}")))?
        .iter()
        .map(normalize_key)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| Error::FatalIngestion(format!("unreadable record: {e}")))?;
        let row = SheetRow::from_pairs(
            headers
                .iter()
                .zip(record.iter())
                .map(|(header, value)| (header.as_str(), value.to_string())),
        );
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

/// Read the first worksheet of a spreadsheet workbook into rows. On any
/// workbook-level failure the file is retried as delimited text; only when
/// both parses fail does the import abort.
pub fn read_spreadsheet_rows(path: &Path) -> Result<Vec<SheetRow>> {
    match read_workbook(path) {
        Ok(rows) => Ok(rows),
        Err(workbook_err) => {
            warn!(
                path = %path.display(),
                error = %workbook_err,
                "workbook parse failed, retrying as delimited text"
            );
            read_delimited_rows(path).map_err(|_| {
                Error::FatalIngestion(format!(
                    "{} is neither a readable workbook ({workbook_err}) nor delimited text",
                    path.display()
                ))
            })
        }
    }
}

fn read_workbook(path: &Path) -> anyhow::Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.display()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook has no sheets"))??;

    let mut cells = range.rows();
    let headers: Vec<String> = cells
        .next()
        .ok_or_else(|| anyhow!("worksheet is empty"))?
        .iter()
        .map(|cell| normalize_key(&cell.to_string()))
        .collect();

    let mut rows = Vec::new();
    for record in cells {
        let row = SheetRow::from_pairs(headers.iter().zip(record.iter()).filter_map(
            |(header, cell)| cell_to_string(cell).map(|value| (header.as_str(), value)),
        ));
        if !row.is_empty() {
            rows.push(row);
        }
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(s.clone()),
        Data::Bool(b) => Some(b.to_string()),
        Data::Int(i) => Some(i.to_string()),
        // Spreadsheets hand back integers as floats; keep "10" over "10.0"
        // so asset tags and employee numbers survive.
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => Some(format!("{}", *f as i64)),
        Data::Float(f) => Some(f.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|naive| naive.format("%Y-%m-%d").to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(s.clone()),
    }
}
