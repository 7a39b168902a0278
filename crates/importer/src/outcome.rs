use crate::normalize::NormalizedRow;
use std::fmt;

/// What happened to a single source row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Created {
        record: String,
    },
    /// The natural key already existed. An empty `changed_fields` means the row
    /// matched the stored record exactly and nothing was written.
    Updated {
        record: String,
        changed_fields: Vec<&'static str>,
    },
    /// An expected data problem; the row was left out.
    Skipped {
        reason: String,
    },
    /// An unexpected error while resolving or writing the row.
    Failed {
        error: String,
        raw_row: String,
    },
}

impl fmt::Display for RowOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowOutcome::Created { record } => write!(f, "created {record}"),
            RowOutcome::Updated {
                record,
                changed_fields,
            } if changed_fields.is_empty() => write!(f, "unchanged {record}"),
            RowOutcome::Updated {
                record,
                changed_fields,
            } => write!(f, "updated {record} [{}]", changed_fields.join(", ")),
            RowOutcome::Skipped { reason } => write!(f, "skipped: {reason}"),
            RowOutcome::Failed { error, raw_row } => {
                write!(f, "failed: {error}; row data: {raw_row}")
            }
        }
    }
}

/// A row outcome tagged with the row's position in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct RowReport {
    pub index: usize,
    pub outcome: RowOutcome,
}

impl fmt::Display for RowReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} (line {}): {}", self.index, self.index + 2, self.outcome)
    }
}

/// Every outcome of one import run, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportSummary {
    pub reports: Vec<RowReport>,
}

impl ImportSummary {
    pub fn push(&mut self, index: usize, outcome: RowOutcome) {
        self.reports.push(RowReport { index, outcome });
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Created { .. }))
    }

    /// Rows whose stored record actually changed.
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Updated { changed_fields, .. } if !changed_fields.is_empty()))
    }

    /// Rows that matched an existing record field for field.
    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Updated { changed_fields, .. } if changed_fields.is_empty()))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, RowOutcome::Failed { .. }))
    }

    fn count(&self, predicate: impl Fn(&RowOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| predicate(&r.outcome)).count()
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows: {} created, {} updated, {} unchanged, {} skipped, {} failed",
            self.reports.len(),
            self.created(),
            self.updated(),
            self.unchanged(),
            self.skipped(),
            self.failed()
        )
    }
}

/// A dry-run view of one row: its normalized fields, or why it would be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPreview {
    pub index: usize,
    pub row: Result<NormalizedRow, String>,
}
