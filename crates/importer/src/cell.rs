use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use std::fmt;
use std::str::FromStr;

/// Day zero of spreadsheet serial dates (the 1900 date system with its leap-year quirk).
const SERIAL_EPOCH: (i32, u32, u32) = (1899, 12, 30);
/// 9999-12-31 as a serial day number.
const MAX_SERIAL_DAY: i64 = 2_958_465;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// One spreadsheet cell, independent of the file format it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Int(i64),
    Bool(bool),
    Date(NaiveDate),
    /// A cell holding a spreadsheet error such as `#DIV/0!`.
    Error(String),
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Int(i) => write!(f, "{i}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::Error(e) => f.write_str(e),
        }
    }
}

impl Cell {
    /// Blank cells and whitespace-only text both count as absent.
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The trimmed text of the cell, or `None` when it is blank.
    pub fn text(&self) -> Option<String> {
        if self.is_empty() {
            return None;
        }
        match self {
            Cell::Text(s) => Some(s.trim().to_string()),
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            other => Some(other.to_string()),
        }
    }

    /// Reads a decimal amount or rate.
    ///
    /// Text may carry thousands separators or a trailing `%`, which divides by 100.
    /// A lone `-` is the spreadsheet convention for "no value".
    pub fn decimal(&self) -> Result<Option<Decimal>, &'static str> {
        const EXPECTED: &str = "number";
        match self {
            _ if self.is_empty() => Ok(None),
            Cell::Int(i) => Ok(Some(Decimal::from(*i))),
            Cell::Number(n) => float_to_decimal(*n).map(Some).ok_or(EXPECTED),
            Cell::Text(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
                if cleaned == "-" {
                    return Ok(None);
                }
                let (digits, percent) = match cleaned.strip_suffix('%') {
                    Some(digits) => (digits, true),
                    None => (cleaned.as_str(), false),
                };
                let value = Decimal::from_str(digits)
                    .or_else(|_| Decimal::from_scientific(digits))
                    .map_err(|_| EXPECTED)?;
                if percent {
                    Ok(Some(value / Decimal::ONE_HUNDRED))
                } else {
                    Ok(Some(value))
                }
            }
            _ => Err(EXPECTED),
        }
    }

    /// Reads a whole number. Fractional values are rejected rather than truncated.
    pub fn integer(&self) -> Result<Option<i64>, &'static str> {
        const EXPECTED: &str = "whole number";
        match self {
            Cell::Int(i) => Ok(Some(*i)),
            _ => match self.decimal().map_err(|_| EXPECTED)? {
                None => Ok(None),
                Some(value) if value.fract().is_zero() => {
                    i64::try_from(value).map(Some).map_err(|_| EXPECTED)
                }
                Some(_) => Err(EXPECTED),
            },
        }
    }

    /// Reads a calendar date from a date cell, a serial day number or date text.
    pub fn date(&self) -> Result<Option<NaiveDate>, &'static str> {
        const EXPECTED: &str = "date";
        match self {
            _ if self.is_empty() => Ok(None),
            Cell::Date(d) => Ok(Some(*d)),
            Cell::Int(i) => serial_to_date(*i as f64).map(Some).ok_or(EXPECTED),
            Cell::Number(n) => serial_to_date(*n).map(Some).ok_or(EXPECTED),
            Cell::Text(s) => parse_date_text(s.trim()).map(Some).ok_or(EXPECTED),
            _ => Err(EXPECTED),
        }
    }

    /// Reads a transaction identifier. Sheets often store it as a float (`12.0`),
    /// so the canonical form is the integer's decimal text.
    pub fn identifier(&self) -> Result<Option<String>, &'static str> {
        const EXPECTED: &str = "whole-number identifier";
        match self.integer() {
            Ok(Some(id)) => Ok(Some(id.to_string())),
            Ok(None) => Ok(None),
            Err(_) => Err(EXPECTED),
        }
    }
}

fn float_to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    // Display prints the shortest text that round-trips, which keeps 0.001425 as 0.001425.
    Decimal::from_str(&value.to_string())
        .ok()
        .or_else(|| Decimal::from_f64(value))
}

fn serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 || serial > MAX_SERIAL_DAY as f64 {
        return None;
    }
    let (y, m, d) = SERIAL_EPOCH;
    let epoch = NaiveDate::from_ymd_opt(y, m, d)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn parse_date_text(text: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                .map(|dt| dt.date())
        })
}

/// One data row of a sheet, with each cell labelled by its column header.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    /// Zero-based position among the data rows (the header is not counted).
    pub index: usize,
    pub cells: Vec<(String, Cell)>,
}

static EMPTY: Cell = Cell::Empty;

impl SheetRow {
    pub fn new(index: usize, cells: Vec<(String, Cell)>) -> Self {
        Self { index, cells }
    }

    /// The cell under `label`, or an empty cell when the column does not exist.
    pub fn get(&self, label: &str) -> &Cell {
        self.cells
            .iter()
            .find(|(header, _)| header == label)
            .map(|(_, cell)| cell)
            .unwrap_or(&EMPTY)
    }

    /// The line number a person sees in the spreadsheet (header on line 1).
    pub fn sheet_line(&self) -> usize {
        self.index + 2
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|(_, cell)| cell.is_empty())
    }

    /// The raw row as `{label: value, ...}` for diagnostics.
    pub fn describe(&self) -> String {
        let fields: Vec<String> = self
            .cells
            .iter()
            .map(|(label, cell)| format!("{label}: {cell}"))
            .collect();
        format!("{{{}}}", fields.join(", "))
    }
}
