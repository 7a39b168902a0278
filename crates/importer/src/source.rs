use crate::cell::{Cell, SheetRow};
use crate::error::ImportError;
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// One sheet's header labels and its non-blank data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetData {
    pub headers: Vec<String>,
    pub rows: Vec<SheetRow>,
}

impl SheetData {
    /// Builds a sheet from a header row and raw cell rows, dropping blank rows.
    /// Row indexes keep counting blank rows so they match the file's line numbers.
    pub fn from_rows(headers: Vec<String>, rows: impl IntoIterator<Item = Vec<Cell>>) -> Self {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, cells)| {
                let labelled = headers
                    .iter()
                    .cloned()
                    .zip(cells.into_iter().chain(std::iter::repeat(Cell::Empty)))
                    .filter(|(header, _)| !header.is_empty())
                    .collect();
                SheetRow::new(index, labelled)
            })
            .filter(|row| !row.is_blank())
            .collect();
        Self { headers, rows }
    }

    /// The expected labels that no header carries.
    pub fn missing_columns<'a>(&self, expected: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
        expected
            .into_iter()
            .filter(|label| !self.headers.iter().any(|h| h == label))
            .collect()
    }
}

/// Reads sheet `sheet_index` (zero-based) of a workbook, or the only sheet of a CSV file.
pub fn read_sheet(path: &Path, sheet_index: usize) -> Result<SheetData, ImportError> {
    if !path.exists() {
        return Err(ImportError::NotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if extension == "csv" {
        if sheet_index > 0 {
            tracing::debug!(sheet_index, "CSV sources have a single sheet; reading it.");
        }
        return read_csv(path);
    }
    if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        return read_workbook(path, sheet_index);
    }
    Err(ImportError::UnsupportedFormat(extension))
}

fn read_workbook(path: &Path, sheet_index: usize) -> Result<SheetData, ImportError> {
    let unreadable = |message: String| ImportError::Unreadable {
        path: path.to_path_buf(),
        message,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| unreadable(e.to_string()))?;
    let available = workbook.sheet_names().len();
    let range = workbook
        .worksheet_range_at(sheet_index)
        .ok_or(ImportError::MissingSheet {
            index: sheet_index,
            available,
        })?
        .map_err(|e| unreadable(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or(ImportError::MissingHeader)?
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::MissingHeader);
    }

    let data = SheetData::from_rows(headers, rows.map(|row| row.iter().map(to_cell).collect()));
    tracing::debug!(
        path = %path.display(),
        sheet_index,
        rows = data.rows.len(),
        "Workbook sheet loaded."
    );
    Ok(data)
}

fn read_csv(path: &Path) -> Result<SheetData, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(ImportError::MissingHeader);
    }

    let mut records = Vec::new();
    for record in reader.byte_records() {
        records.push(record?.iter().map(csv_cell).collect::<Vec<_>>());
    }

    Ok(SheetData::from_rows(headers, records))
}

/// Undecodable bytes become an error cell so only the affected row is skipped.
fn csv_cell(field: &[u8]) -> Cell {
    match std::str::from_utf8(field) {
        Ok(text) if text.trim().is_empty() => Cell::Empty,
        Ok(text) => Cell::Text(text.to_string()),
        Err(_) => Cell::Error(String::from_utf8_lossy(field).into_owned()),
    }
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Int(*i),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Cell::Date(datetime.date()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Error(e.to_string()),
    }
}
