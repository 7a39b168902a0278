//! # Ledger Import Reconciler
//!
//! Reads investment and dividend rows from a spreadsheet and reconciles them with
//! the ledger store, one isolated row at a time.
//!
//! ## Public API
//!
//! - `read_sheet`: Loads one sheet of an `.xlsx`/`.xls`/`.ods` workbook or a `.csv` file.
//! - `ImportReconciler`: Normalizes rows and upserts them by their natural key.
//! - `RowOutcome` / `ImportSummary`: What happened to each row.
//! - `ImportError`: Failures that abort the whole run.

pub mod cell;
pub mod error;
pub mod normalize;
pub mod outcome;
pub mod reconciler;
pub mod source;

pub use cell::{Cell, SheetRow};
pub use error::ImportError;
pub use normalize::{DividendRow, InvestmentRow, NormalizedRow};
pub use outcome::{ImportSummary, RowOutcome, RowPreview, RowReport};
pub use reconciler::{ImportKind, ImportReconciler};
pub use source::{read_sheet, SheetData};
