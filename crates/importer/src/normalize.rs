use crate::cell::{Cell, SheetRow};
use chrono::NaiveDate;
use configuration::{DividendColumns, ImportSettings, InvestmentColumns};
use core_types::{DividendPatch, InvestmentPatch, TransactionType};

/// An investment row after field extraction and coercion. The stock is still a name.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestmentRow {
    pub transaction_id: String,
    pub stock_name: String,
    pub patch: InvestmentPatch,
}

/// A dividend row after field extraction and coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct DividendRow {
    pub stock_name: String,
    pub payout_date: NaiveDate,
    pub patch: DividendPatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedRow {
    Investment(InvestmentRow),
    Dividend(DividendRow),
}

/// Maps a source label to a transaction type. The stored codes `BUY`/`SELL` are
/// always understood, in addition to the configured labels.
pub fn transaction_type(label: &str, settings: &ImportSettings) -> Option<TransactionType> {
    let label = label.trim();
    if settings.buy_labels.iter().any(|l| l.trim() == label) {
        return Some(TransactionType::Buy);
    }
    if settings.sell_labels.iter().any(|l| l.trim() == label) {
        return Some(TransactionType::Sell);
    }
    label.parse().ok()
}

/// Extracts, maps and coerces one investment row. `Err` carries the skip reason.
pub fn investment_row(
    row: &SheetRow,
    columns: &InvestmentColumns,
    settings: &ImportSettings,
) -> Result<InvestmentRow, String> {
    let type_label = text_field(row, &columns.transaction_type)?;
    let stock_name = text_field(row, &columns.stock_name)?;
    let (type_label, stock_name) = match (type_label, stock_name) {
        (Some(t), Some(s)) => (t, s),
        (t, s) => {
            let mut missing = Vec::new();
            if t.is_none() {
                missing.push(columns.transaction_type.as_str());
            }
            if s.is_none() {
                missing.push(columns.stock_name.as_str());
            }
            return Err(format!("missing {}", missing.join(" and ")));
        }
    };

    let Some(transaction_type) = transaction_type(&type_label, settings) else {
        return Err(format!(
            "unknown {} '{}'",
            columns.transaction_type, type_label
        ));
    };

    let transaction_id = field(row, &columns.transaction_id, Cell::identifier)?
        .ok_or_else(|| format!("missing {}", columns.transaction_id))?;

    let patch = InvestmentPatch {
        transaction_type: Some(transaction_type),
        stock_id: None,
        buy_date: field(row, &columns.buy_date, Cell::date)?,
        buy_price: field(row, &columns.buy_price, Cell::decimal)?,
        quantity: field(row, &columns.quantity, Cell::integer)?,
        buy_amount: field(row, &columns.buy_amount, Cell::decimal)?,
        fee_rate: field(row, &columns.fee_rate, Cell::decimal)?,
        fee_amount: field(row, &columns.fee_amount, Cell::decimal)?,
        total_cost: field(row, &columns.total_cost, Cell::decimal)?,
        sell_date: field(row, &columns.sell_date, Cell::date)?,
        sell_amount: field(row, &columns.sell_amount, Cell::decimal)?,
        net_profit: field(row, &columns.net_profit, Cell::decimal)?,
        profit_rate: field(row, &columns.profit_rate, Cell::decimal)?,
        annual_return_rate: field(row, &columns.annual_return_rate, Cell::decimal)?,
        holding_days: field(row, &columns.holding_days, Cell::integer)?,
    };

    if patch.sell_date.is_some() != patch.sell_amount.is_some() {
        return Err(format!(
            "incomplete sell facts: {} and {} must both be filled or both be empty",
            columns.sell_date, columns.sell_amount
        ));
    }

    if let Some(days) = patch.holding_days.filter(|days| *days < 0) {
        return Err(format!(
            "invalid {}: '{days}' is a negative holding period",
            columns.holding_days
        ));
    }

    if let (Some(amount), Some(fee), Some(total)) =
        (patch.buy_amount, patch.fee_amount, patch.total_cost)
    {
        let Some(expected) = amount.checked_add(fee) else {
            return Err(format!(
                "invalid {} and {}: '{amount}' plus '{fee}' overflows",
                columns.buy_amount, columns.fee_amount
            ));
        };
        if expected != total {
            tracing::warn!(
                row = row.index,
                %transaction_id,
                %amount,
                %fee,
                %total,
                "Total cost differs from amount plus fee; keeping the sheet value."
            );
        }
    }

    Ok(InvestmentRow {
        transaction_id,
        stock_name,
        patch,
    })
}

/// Extracts and coerces one dividend row. `Err` carries the skip reason.
pub fn dividend_row(row: &SheetRow, columns: &DividendColumns) -> Result<DividendRow, String> {
    let stock_name = text_field(row, &columns.stock_name)?
        .ok_or_else(|| format!("missing {}", columns.stock_name))?;

    let payout_date = field(row, &columns.payout_date, Cell::date)?
        .ok_or_else(|| format!("missing {}", columns.payout_date))?;

    let patch = DividendPatch {
        quantity: field(row, &columns.quantity, Cell::integer)?,
        dividend_per_share: field(row, &columns.dividend_per_share, Cell::decimal)?,
        total_dividend: field(row, &columns.total_dividend, Cell::decimal)?,
        actual_income: field(row, &columns.actual_income, Cell::decimal)?,
        fee: field(row, &columns.fee, Cell::decimal)?,
    };

    Ok(DividendRow {
        stock_name,
        payout_date,
        patch,
    })
}

/// The trimmed text under `label`. Error cells (spreadsheet errors, undecodable
/// bytes) are rejected instead of being read as a name.
fn text_field(row: &SheetRow, label: &str) -> Result<Option<String>, String> {
    match row.get(label) {
        Cell::Error(value) => Err(format!("invalid {label}: '{value}' is not readable text")),
        cell => Ok(cell.text()),
    }
}

/// Coerces the cell under `label`, keeping the offending value in the skip reason.
fn field<T>(
    row: &SheetRow,
    label: &str,
    coerce: impl Fn(&Cell) -> Result<Option<T>, &'static str>,
) -> Result<Option<T>, String> {
    let cell = row.get(label);
    coerce(cell).map_err(|expected| format!("invalid {label}: '{cell}' is not a valid {expected}"))
}
