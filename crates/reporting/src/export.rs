use crate::ReportError;
use configuration::InvestmentColumns;
use core_types::InvestmentRecord;
use database::LedgerStore;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::io::Write;

/// Writes every investment record as one CSV row under the localized headers.
///
/// The stock is exported by name and the type by its stored code, so the file
/// can be imported again. Returns the number of records written.
pub async fn export_investments<W: Write>(
    store: &dyn LedgerStore,
    columns: &InvestmentColumns,
    writer: W,
) -> Result<usize, ReportError> {
    let stocks: HashMap<i64, String> = store
        .list_stocks()
        .await?
        .into_iter()
        .map(|stock| (stock.id, stock.name))
        .collect();
    let records = store.list_investments().await?;

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(header(columns))?;
    for record in &records {
        let stock_name = stocks.get(&record.stock_id).ok_or_else(|| ReportError::DanglingStock {
            transaction_id: record.transaction_id.clone(),
            stock_id: record.stock_id,
        })?;
        csv.write_record(row(record, stock_name))?;
    }
    csv.flush()?;

    tracing::info!(records = records.len(), "Exported investments.");
    Ok(records.len())
}

fn header(columns: &InvestmentColumns) -> [&str; 16] {
    [
        columns.transaction_id.as_str(),
        columns.transaction_type.as_str(),
        columns.stock_name.as_str(),
        columns.buy_date.as_str(),
        columns.sell_date.as_str(),
        columns.buy_price.as_str(),
        columns.quantity.as_str(),
        columns.buy_amount.as_str(),
        columns.fee_rate.as_str(),
        columns.fee_amount.as_str(),
        columns.total_cost.as_str(),
        columns.sell_amount.as_str(),
        columns.net_profit.as_str(),
        columns.profit_rate.as_str(),
        columns.annual_return_rate.as_str(),
        columns.holding_days.as_str(),
    ]
}

fn row(record: &InvestmentRecord, stock_name: &str) -> [String; 16] {
    [
        record.transaction_id.clone(),
        record.transaction_type.to_string(),
        stock_name.to_string(),
        record.buy_date.format("%Y-%m-%d").to_string(),
        optional(record.sell_date.map(|d| d.format("%Y-%m-%d").to_string())),
        record.buy_price.normalize().to_string(),
        record.quantity.to_string(),
        record.buy_amount.normalize().to_string(),
        record.fee_rate.normalize().to_string(),
        record.fee_amount.normalize().to_string(),
        record.total_cost.normalize().to_string(),
        decimal(record.sell_amount),
        decimal(record.net_profit),
        decimal(record.profit_rate),
        decimal(record.annual_return_rate),
        optional(record.holding_days.map(|d| d.to_string())),
    ]
}

fn decimal(value: Option<Decimal>) -> String {
    optional(value.map(|v| v.normalize().to_string()))
}

fn optional(value: Option<String>) -> String {
    value.unwrap_or_default()
}
