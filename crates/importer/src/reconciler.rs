use crate::cell::SheetRow;
use crate::normalize::{self, DividendRow, InvestmentRow, NormalizedRow};
use crate::outcome::{ImportSummary, RowOutcome, RowPreview};
use crate::source::SheetData;
use analytics::{MetricsEngine, PositionFacts};
use configuration::{ColumnLabels, ImportSettings};
use core_types::{DividendLabel, InvestmentLabel, InvestmentPatch, InvestmentRecord, Stock};
use database::{DbError, LedgerStore};
use std::fmt;

/// Which record kind a sheet holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Investments,
    Dividends,
}

impl ImportKind {
    /// The configured sheet index this kind is read from.
    pub fn sheet_index(&self, settings: &ImportSettings) -> usize {
        match self {
            ImportKind::Investments => settings.investment_sheet,
            ImportKind::Dividends => settings.dividend_sheet,
        }
    }
}

impl fmt::Display for ImportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportKind::Investments => f.write_str("investments"),
            ImportKind::Dividends => f.write_str("dividends"),
        }
    }
}

/// Why a row did not reach the store.
enum RowError {
    Skip(String),
    Fail(String),
}

impl From<DbError> for RowError {
    fn from(e: DbError) -> Self {
        RowError::Fail(e.to_string())
    }
}

/// Reconciles spreadsheet rows with the ledger store.
///
/// Rows are handled one at a time in source order. Each row is isolated: a skip or a
/// store failure is recorded and the next row is processed.
pub struct ImportReconciler<'a> {
    store: &'a dyn LedgerStore,
    settings: &'a ImportSettings,
    columns: &'a ColumnLabels,
    engine: MetricsEngine,
}

impl<'a> ImportReconciler<'a> {
    pub fn new(
        store: &'a dyn LedgerStore,
        settings: &'a ImportSettings,
        columns: &'a ColumnLabels,
    ) -> Self {
        Self {
            store,
            settings,
            columns,
            engine: MetricsEngine::new(),
        }
    }

    /// Imports every row of the sheet.
    pub async fn run(&self, sheet: &SheetData, kind: ImportKind) -> ImportSummary {
        self.run_with(sheet, kind, |_, _| {}).await
    }

    /// Imports every row, calling `observe` after each one (for progress output).
    pub async fn run_with(
        &self,
        sheet: &SheetData,
        kind: ImportKind,
        mut observe: impl FnMut(&SheetRow, &RowOutcome),
    ) -> ImportSummary {
        self.warn_missing_columns(sheet, kind);

        let mut summary = ImportSummary::default();
        for row in &sheet.rows {
            let outcome = self.import_row(row, kind).await;
            observe(row, &outcome);
            summary.push(row.index, outcome);
        }

        tracing::info!(%kind, "{summary}");
        summary
    }

    /// Normalizes, resolves and upserts a single row.
    pub async fn import_row(&self, row: &SheetRow, kind: ImportKind) -> RowOutcome {
        let result = match self.normalize(row, kind) {
            Ok(NormalizedRow::Investment(parsed)) => self.upsert_investment(parsed).await,
            Ok(NormalizedRow::Dividend(parsed)) => self.upsert_dividend(parsed).await,
            Err(reason) => Err(RowError::Skip(reason)),
        };

        match result {
            Ok(outcome) => {
                tracing::info!(row = row.index, "{outcome}");
                outcome
            }
            Err(RowError::Skip(reason)) => {
                tracing::warn!(row = row.index, %reason, "Row skipped.");
                RowOutcome::Skipped { reason }
            }
            Err(RowError::Fail(error)) => {
                let raw_row = row.describe();
                tracing::error!(row = row.index, %error, %raw_row, "Row import failed.");
                RowOutcome::Failed { error, raw_row }
            }
        }
    }

    /// Normalizes the first `limit` rows without touching the store.
    pub fn preview(&self, sheet: &SheetData, kind: ImportKind, limit: usize) -> Vec<RowPreview> {
        self.warn_missing_columns(sheet, kind);
        sheet
            .rows
            .iter()
            .take(limit)
            .map(|row| RowPreview {
                index: row.index,
                row: self.normalize(row, kind),
            })
            .collect()
    }

    fn normalize(&self, row: &SheetRow, kind: ImportKind) -> Result<NormalizedRow, String> {
        match kind {
            ImportKind::Investments => {
                normalize::investment_row(row, &self.columns.investments, self.settings)
                    .map(NormalizedRow::Investment)
            }
            ImportKind::Dividends => {
                normalize::dividend_row(row, &self.columns.dividends).map(NormalizedRow::Dividend)
            }
        }
    }

    fn warn_missing_columns(&self, sheet: &SheetData, kind: ImportKind) {
        let missing = match kind {
            ImportKind::Investments => sheet.missing_columns(
                self.columns.investments.entries().into_iter().map(|(_, label)| label),
            ),
            ImportKind::Dividends => sheet.missing_columns(
                self.columns.dividends.entries().into_iter().map(|(_, label)| label),
            ),
        };
        if !missing.is_empty() {
            tracing::warn!(%kind, missing = ?missing, "Source sheet lacks expected columns.");
        }
    }

    /// Every check that can skip the row runs before the stock is created, so a
    /// skipped row never leaves a stock behind.
    async fn upsert_investment(&self, parsed: InvestmentRow) -> Result<RowOutcome, RowError> {
        let InvestmentRow {
            transaction_id,
            stock_name,
            mut patch,
        } = parsed;

        let existing = self.store.find_investment(&transaction_id).await?;
        self.complete_closed_position(&mut patch, existing.as_ref())?;
        if existing.is_none() {
            let missing = patch.missing_fields();
            if !missing.is_empty() {
                return Err(RowError::Skip(format!(
                    "new record {} = {transaction_id} is missing {}",
                    self.columns.investments.transaction_id,
                    self.investment_labels(&missing)
                )));
            }
        }

        let stock = self.resolve_stock(&stock_name).await?;
        patch.stock_id = Some(stock.id);

        match existing {
            Some(mut record) => {
                let changed_fields = record.merge(&patch);
                if !changed_fields.is_empty() {
                    self.store.update_investment(&record).await?;
                }
                Ok(RowOutcome::Updated {
                    record: label(&record, &stock.name),
                    changed_fields,
                })
            }
            None => {
                let new = patch
                    .into_new(&transaction_id)
                    .map_err(|e| RowError::Fail(e.to_string()))?;
                let record = self.store.insert_investment(new).await?;
                Ok(RowOutcome::Created {
                    record: label(&record, &stock.name),
                })
            }
        }
    }

    async fn upsert_dividend(&self, parsed: DividendRow) -> Result<RowOutcome, RowError> {
        let DividendRow {
            stock_name,
            payout_date,
            patch,
        } = parsed;

        let existing = match self.store.find_stock(&stock_name).await? {
            Some(stock) => self.store.find_dividend(stock.id, payout_date).await?,
            None => None,
        };
        if existing.is_none() {
            let missing = patch.missing_fields();
            if !missing.is_empty() {
                let labels: Vec<&str> = missing
                    .iter()
                    .map(|field| self.columns.dividends.label_for(field))
                    .collect();
                return Err(RowError::Skip(format!(
                    "new dividend for {stock_name} on {payout_date} is missing {}",
                    labels.join(", ")
                )));
            }
        }

        let stock = self.resolve_stock(&stock_name).await?;

        match existing {
            Some(mut record) => {
                let changed_fields = record.merge(&patch);
                if !changed_fields.is_empty() {
                    self.store.update_dividend(&record).await?;
                }
                Ok(RowOutcome::Updated {
                    record: DividendLabel { record: &record, stock_name: &stock.name }.to_string(),
                    changed_fields,
                })
            }
            None => {
                let new = patch
                    .into_new(stock.id, payout_date)
                    .map_err(|e| RowError::Fail(e.to_string()))?;
                let record = self.store.insert_dividend(new).await?;
                Ok(RowOutcome::Created {
                    record: DividendLabel { record: &record, stock_name: &stock.name }.to_string(),
                })
            }
        }
    }

    async fn resolve_stock(&self, name: &str) -> Result<Stock, RowError> {
        let (stock, created) = self.store.get_or_create_stock(name).await?;
        if created {
            tracing::info!(stock = %stock.name, "Created stock.");
        }
        Ok(stock)
    }

    fn investment_labels(&self, fields: &[&'static str]) -> String {
        let labels: Vec<&str> = fields
            .iter()
            .map(|field| self.columns.investments.label_for(field))
            .collect();
        labels.join(", ")
    }

    /// Fills the metrics a closing row leaves blank and rejects sells before buys.
    ///
    /// Buy facts come from the row when it has them, otherwise from the stored record.
    /// A row that leaves the position open may not supply closing metrics.
    fn complete_closed_position(
        &self,
        patch: &mut InvestmentPatch,
        existing: Option<&InvestmentRecord>,
    ) -> Result<(), RowError> {
        let (Some(sell_date), Some(sell_amount)) = (patch.sell_date, patch.sell_amount) else {
            let stays_open = existing.is_none_or(InvestmentRecord::is_open);
            let derived = patch.derived_fields();
            if stays_open && !derived.is_empty() {
                return Err(RowError::Skip(format!(
                    "open position cannot carry {}; fill {} and {} or clear them",
                    self.investment_labels(&derived),
                    self.columns.investments.sell_date,
                    self.columns.investments.sell_amount
                )));
            }
            return Ok(());
        };
        let buy_date = patch.buy_date.or(existing.map(|r| r.buy_date));
        let buy_amount = patch.buy_amount.or(existing.map(|r| r.buy_amount));
        let fee_amount = patch.fee_amount.or(existing.map(|r| r.fee_amount));
        let total_cost = patch.total_cost.or(existing.map(|r| r.total_cost));
        let buy_price = patch.buy_price.or(existing.map(|r| r.buy_price));
        let quantity = patch.quantity.or(existing.map(|r| r.quantity));

        let (Some(buy_date), Some(buy_amount), Some(fee_amount), Some(buy_price), Some(quantity)) =
            (buy_date, buy_amount, fee_amount, buy_price, quantity)
        else {
            // Not enough buy facts; creating the record will report what is missing.
            return Ok(());
        };

        let facts = PositionFacts {
            buy_price,
            quantity,
            buy_amount,
            fee_amount,
            buy_date,
            sell_amount,
            sell_date,
        };
        let metrics = match total_cost {
            Some(cost) => self.engine.calculate_with_cost(&facts, cost),
            None => self.engine.calculate(&facts),
        }
        .map_err(|e| RowError::Skip(e.to_string()))?;

        patch.net_profit = patch.net_profit.or(Some(metrics.net_profit));
        patch.profit_rate = patch.profit_rate.or(metrics.profit_rate);
        patch.annual_return_rate = patch.annual_return_rate.or(metrics.annual_return_rate);
        patch.holding_days = patch.holding_days.or(Some(metrics.holding_days));
        Ok(())
    }
}

fn label(record: &InvestmentRecord, stock_name: &str) -> String {
    InvestmentLabel { record, stock_name }.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use core_types::{DividendRecord, NewDividend, NewInvestment, Stock};
    use database::{InMemoryStore, StockSummary};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn text(s: &str) -> Cell {
        Cell::Text(s.to_string())
    }

    fn buy_row(index: usize, transaction_id: &str, stock: &str, buy_date: &str) -> SheetRow {
        SheetRow::new(
            index,
            vec![
                ("交易ID".into(), text(transaction_id)),
                ("交易類型".into(), text("庫存")),
                ("名稱".into(), text(stock)),
                ("買進日期".into(), text(buy_date)),
                ("買進價".into(), Cell::Number(10.0)),
                ("張數".into(), Cell::Int(1000)),
                ("金額".into(), Cell::Int(10000)),
                ("手續費率".into(), Cell::Number(0.002)),
                ("手續費".into(), Cell::Int(20)),
                ("總成本".into(), Cell::Int(10020)),
                ("賣出日期".into(), Cell::Empty),
                ("賣出價".into(), Cell::Empty),
            ],
        )
    }

    fn sold(mut row: SheetRow, sell_date: &str, sell_amount: i64) -> SheetRow {
        for (label, cell) in row.cells.iter_mut() {
            match label.as_str() {
                "交易類型" => *cell = text("賣"),
                "賣出日期" => *cell = text(sell_date),
                "賣出價" => *cell = Cell::Int(sell_amount),
                _ => {}
            }
        }
        row
    }

    fn dividend_row(index: usize, payout_date: &str, actual_income: i64) -> SheetRow {
        SheetRow::new(
            index,
            vec![
                ("名稱".into(), text("0056")),
                ("發放日期".into(), text(payout_date)),
                ("張數".into(), Cell::Int(3)),
                ("每股股利".into(), Cell::Number(1.07)),
                ("總股利".into(), Cell::Int(3210)),
                ("實際進帳".into(), Cell::Int(actual_income)),
                ("手續費".into(), Cell::Int(10)),
            ],
        )
    }

    fn sheet(rows: Vec<SheetRow>) -> SheetData {
        let headers = rows
            .first()
            .map(|r| r.cells.iter().map(|(l, _)| l.clone()).collect())
            .unwrap_or_default();
        SheetData { headers, rows }
    }

    #[tokio::test]
    async fn reimporting_the_same_sheet_changes_nothing() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let source = sheet(vec![
            buy_row(0, "1", "台積電", "2024-03-01"),
            sold(buy_row(1, "2", "鴻海", "2024-03-01"), "2024-03-31", 10500),
        ]);

        let first = reconciler.run(&source, ImportKind::Investments).await;
        assert_eq!(first.created(), 2);

        let second = reconciler.run(&source, ImportKind::Investments).await;
        assert_eq!(second.created(), 0);
        assert_eq!(second.updated(), 0);
        assert_eq!(second.unchanged(), 2);
        assert_eq!(store.list_investments().await.unwrap().len(), 2);
        assert_eq!(store.list_stocks().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn closing_a_position_updates_in_place_and_derives_metrics() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);

        reconciler
            .run(&sheet(vec![buy_row(0, "7", "台積電", "2024-03-01")]), ImportKind::Investments)
            .await;
        let summary = reconciler
            .run(
                &sheet(vec![sold(buy_row(0, "7", "台積電", "2024-03-01"), "2024-03-31", 10500)]),
                ImportKind::Investments,
            )
            .await;

        match &summary.reports[0].outcome {
            RowOutcome::Updated { changed_fields, .. } => {
                assert!(changed_fields.contains(&"sell_date"));
                assert!(changed_fields.contains(&"net_profit"));
            }
            other => panic!("expected an update, got {other:?}"),
        }

        let records = store.list_investments().await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.transaction_type, core_types::TransactionType::Sell);
        assert_eq!(record.net_profit, Some(dec!(480)));
        assert_eq!(record.holding_days, Some(30));
        let annual = record.annual_return_rate.unwrap();
        assert!((annual - dec!(0.5828)).abs() < dec!(0.0001));
        assert_eq!(store.sum_open_total_cost().await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn sheet_metrics_take_precedence_over_derived_ones() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let mut row = sold(buy_row(0, "9", "台積電", "2024-03-01"), "2024-03-31", 10500);
        row.cells.push(("淨利".into(), Cell::Int(470)));

        reconciler.run(&sheet(vec![row]), ImportKind::Investments).await;

        let record = store.find_investment("9").await.unwrap().unwrap();
        assert_eq!(record.net_profit, Some(dec!(470)));
        assert_eq!(record.holding_days, Some(30));
    }

    #[tokio::test]
    async fn same_day_round_trip_has_no_annual_rate() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let row = sold(buy_row(0, "3", "台積電", "2024-03-01"), "2024-03-01", 10100);

        reconciler.run(&sheet(vec![row]), ImportKind::Investments).await;

        let record = store.find_investment("3").await.unwrap().unwrap();
        assert_eq!(record.holding_days, Some(0));
        assert_eq!(record.net_profit, Some(dec!(80)));
        assert!(record.profit_rate.is_some());
        assert_eq!(record.annual_return_rate, None);
    }

    #[tokio::test]
    async fn bad_rows_are_skipped_and_later_rows_still_import() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let source = sheet(vec![
            buy_row(0, "1", "台積電", "not a date"),
            sold(buy_row(1, "2", "台積電", "2024-03-10"), "2024-03-01", 10500),
            buy_row(2, "3", "台積電", "2024-03-01"),
        ]);

        let summary = reconciler.run(&source, ImportKind::Investments).await;

        assert_eq!(summary.skipped(), 2);
        assert_eq!(summary.created(), 1);
        match &summary.reports[0].outcome {
            RowOutcome::Skipped { reason } => assert!(reason.contains("'not a date'")),
            other => panic!("expected a skip, got {other:?}"),
        }
        match &summary.reports[1].outcome {
            RowOutcome::Skipped { reason } => assert!(reason.contains("before buy date")),
            other => panic!("expected a skip, got {other:?}"),
        }
        assert!(store.find_investment("3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn new_record_without_buy_facts_is_skipped_with_labels() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let mut row = buy_row(0, "5", "台積電", "2024-03-01");
        row.cells.retain(|(label, _)| label != "總成本");

        let outcome = reconciler.import_row(&row, ImportKind::Investments).await;

        match outcome {
            RowOutcome::Skipped { reason } => {
                assert_eq!(reason, "new record 交易ID = 5 is missing 總成本");
            }
            other => panic!("expected a skip, got {other:?}"),
        }
        assert!(store.list_investments().await.unwrap().is_empty());
        assert!(store.list_stocks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn skipped_rows_never_leave_a_stock_behind() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let mut incomplete_dividend = dividend_row(1, "2024-07-11", 3200);
        incomplete_dividend.cells.retain(|(label, _)| label != "手續費");

        let sold_early = sold(buy_row(0, "8", "鴻海", "2024-03-10"), "2024-03-01", 10500);
        let outcome = reconciler.import_row(&sold_early, ImportKind::Investments).await;
        assert!(matches!(outcome, RowOutcome::Skipped { .. }));

        let outcome = reconciler.import_row(&incomplete_dividend, ImportKind::Dividends).await;
        match outcome {
            RowOutcome::Skipped { reason } => {
                assert_eq!(reason, "new dividend for 0056 on 2024-07-11 is missing 手續費");
            }
            other => panic!("expected a skip, got {other:?}"),
        }

        assert!(store.list_stocks().await.unwrap().is_empty());
        assert!(store.stock_summaries().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn open_rows_cannot_carry_closing_metrics() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let mut with_profit = buy_row(0, "4", "台積電", "2024-03-01");
        with_profit.cells.push(("淨利".into(), Cell::Int(999)));
        let mut with_negative_days = buy_row(1, "5", "台積電", "2024-03-01");
        with_negative_days.cells.push(("持有天數".into(), Cell::Int(-5)));

        let summary = reconciler
            .run(&sheet(vec![with_profit, with_negative_days]), ImportKind::Investments)
            .await;

        assert_eq!(summary.skipped(), 2);
        match &summary.reports[0].outcome {
            RowOutcome::Skipped { reason } => {
                assert_eq!(
                    reason,
                    "open position cannot carry 淨利; fill 賣出日期 and 賣出價 or clear them"
                );
            }
            other => panic!("expected a skip, got {other:?}"),
        }
        match &summary.reports[1].outcome {
            RowOutcome::Skipped { reason } => assert!(reason.contains("negative holding period")),
            other => panic!("expected a skip, got {other:?}"),
        }
        assert!(store.list_investments().await.unwrap().is_empty());
        assert_eq!(store.sum_net_profit(None).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn closed_record_accepts_a_metrics_only_correction() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        reconciler
            .import_row(
                &sold(buy_row(0, "6", "台積電", "2024-03-01"), "2024-03-31", 10500),
                ImportKind::Investments,
            )
            .await;

        let correction = SheetRow::new(
            1,
            vec![
                ("交易ID".into(), text("6")),
                ("交易類型".into(), text("賣")),
                ("名稱".into(), text("台積電")),
                ("淨利".into(), Cell::Int(470)),
            ],
        );
        let outcome = reconciler.import_row(&correction, ImportKind::Investments).await;

        match outcome {
            RowOutcome::Updated { changed_fields, .. } => assert_eq!(changed_fields, vec!["net_profit"]),
            other => panic!("expected an update, got {other:?}"),
        }
        let record = store.find_investment("6").await.unwrap().unwrap();
        assert_eq!(record.net_profit, Some(dec!(470)));
    }

    #[tokio::test]
    async fn changed_sell_amount_recomputes_blank_metrics() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        reconciler
            .import_row(
                &sold(buy_row(0, "7", "台積電", "2024-03-01"), "2024-03-31", 10500),
                ImportKind::Investments,
            )
            .await;

        let outcome = reconciler
            .import_row(
                &sold(buy_row(0, "7", "台積電", "2024-03-01"), "2024-03-31", 10600),
                ImportKind::Investments,
            )
            .await;

        match outcome {
            RowOutcome::Updated { changed_fields, .. } => {
                assert!(changed_fields.contains(&"sell_amount"));
                assert!(changed_fields.contains(&"net_profit"));
                assert!(changed_fields.contains(&"profit_rate"));
                assert!(!changed_fields.contains(&"holding_days"));
            }
            other => panic!("expected an update, got {other:?}"),
        }
        let records = store.list_investments().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sell_amount, Some(dec!(10600)));
        assert_eq!(records[0].net_profit, Some(dec!(580)));
    }

    #[tokio::test]
    async fn partial_row_merges_into_existing_record() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        reconciler
            .import_row(&buy_row(0, "5", "台積電", "2024-03-01"), ImportKind::Investments)
            .await;

        let partial = SheetRow::new(
            1,
            vec![
                ("交易ID".into(), Cell::Number(5.0)),
                ("交易類型".into(), text("庫存")),
                ("名稱".into(), text("台積電")),
                ("手續費".into(), Cell::Int(25)),
            ],
        );
        let outcome = reconciler.import_row(&partial, ImportKind::Investments).await;

        assert_eq!(
            outcome,
            RowOutcome::Updated {
                record: "台積電 BUY (2024-03-01 - holding)".to_string(),
                changed_fields: vec!["fee_amount"],
            }
        );
        let record = store.find_investment("5").await.unwrap().unwrap();
        assert_eq!(record.fee_amount, dec!(25));
        assert_eq!(record.total_cost, dec!(10020));
    }

    #[tokio::test]
    async fn repeated_dividend_key_keeps_the_last_value() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let source = sheet(vec![
            dividend_row(0, "2024-07-11", 3200),
            dividend_row(1, "2024-07-11", 3190),
        ]);

        let summary = reconciler.run(&source, ImportKind::Dividends).await;

        assert_eq!(summary.created(), 1);
        assert_eq!(summary.updated(), 1);
        let stock = store.find_stock("0056").await.unwrap().unwrap();
        let payout = NaiveDate::from_ymd_opt(2024, 7, 11).unwrap();
        let record = store.find_dividend(stock.id, payout).await.unwrap().unwrap();
        assert_eq!(record.actual_income, dec!(3190));
        assert_eq!(store.sum_actual_income(None).await.unwrap(), dec!(3190));
    }

    #[tokio::test]
    async fn reimporting_dividends_changes_nothing() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let source = sheet(vec![
            dividend_row(0, "2024-07-11", 3200),
            dividend_row(1, "2025-01-15", 3100),
        ]);

        let first = reconciler.run(&source, ImportKind::Dividends).await;
        assert_eq!(first.created(), 2);

        let second = reconciler.run(&source, ImportKind::Dividends).await;
        assert_eq!(second.unchanged(), 2);
        assert_eq!(second.created() + second.updated(), 0);
        match &second.reports[0].outcome {
            RowOutcome::Updated { record, .. } => assert_eq!(record, "0056 dividend 2024-07-11: 3200"),
            other => panic!("expected an unchanged row, got {other:?}"),
        }
        assert_eq!(store.sum_actual_income(Some("0056")).await.unwrap(), dec!(6300));
    }

    #[tokio::test]
    async fn preview_never_writes() {
        let store = InMemoryStore::new();
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let source = sheet((0..8).map(|i| dividend_row(i, "2024-07-11", 3200)).collect());

        let previews = reconciler.preview(&source, ImportKind::Dividends, 5);

        assert_eq!(previews.len(), 5);
        assert!(previews.iter().all(|p| p.row.is_ok()));
        assert!(store.list_stocks().await.unwrap().is_empty());
    }

    /// Delegates to an in-memory store but refuses to insert one transaction id.
    struct FlakyStore {
        inner: InMemoryStore,
        poisoned_transaction: &'static str,
    }

    #[async_trait]
    impl LedgerStore for FlakyStore {
        async fn get_or_create_stock(&self, name: &str) -> Result<(Stock, bool), DbError> {
            self.inner.get_or_create_stock(name).await
        }
        async fn find_stock(&self, name: &str) -> Result<Option<Stock>, DbError> {
            self.inner.find_stock(name).await
        }
        async fn list_stocks(&self) -> Result<Vec<Stock>, DbError> {
            self.inner.list_stocks().await
        }
        async fn delete_stock(&self, name: &str) -> Result<bool, DbError> {
            self.inner.delete_stock(name).await
        }
        async fn find_investment(
            &self,
            transaction_id: &str,
        ) -> Result<Option<InvestmentRecord>, DbError> {
            self.inner.find_investment(transaction_id).await
        }
        async fn insert_investment(
            &self,
            investment: NewInvestment,
        ) -> Result<InvestmentRecord, DbError> {
            if investment.transaction_id == self.poisoned_transaction {
                return Err(DbError::NotFound("connection reset".to_string()));
            }
            self.inner.insert_investment(investment).await
        }
        async fn update_investment(&self, record: &InvestmentRecord) -> Result<(), DbError> {
            self.inner.update_investment(record).await
        }
        async fn list_investments(&self) -> Result<Vec<InvestmentRecord>, DbError> {
            self.inner.list_investments().await
        }
        async fn find_dividend(
            &self,
            stock_id: i64,
            payout_date: NaiveDate,
        ) -> Result<Option<DividendRecord>, DbError> {
            self.inner.find_dividend(stock_id, payout_date).await
        }
        async fn insert_dividend(&self, dividend: NewDividend) -> Result<DividendRecord, DbError> {
            self.inner.insert_dividend(dividend).await
        }
        async fn update_dividend(&self, record: &DividendRecord) -> Result<(), DbError> {
            self.inner.update_dividend(record).await
        }
        async fn sum_open_total_cost(&self) -> Result<Decimal, DbError> {
            self.inner.sum_open_total_cost().await
        }
        async fn sum_net_profit(&self, stock: Option<&str>) -> Result<Decimal, DbError> {
            self.inner.sum_net_profit(stock).await
        }
        async fn sum_actual_income(&self, stock: Option<&str>) -> Result<Decimal, DbError> {
            self.inner.sum_actual_income(stock).await
        }
        async fn stock_summaries(&self) -> Result<Vec<StockSummary>, DbError> {
            self.inner.stock_summaries().await
        }
    }

    #[tokio::test]
    async fn store_failure_is_reported_with_the_raw_row_and_the_batch_continues() {
        let store = FlakyStore {
            inner: InMemoryStore::new(),
            poisoned_transaction: "2",
        };
        let settings = ImportSettings::default();
        let columns = ColumnLabels::default();
        let reconciler = ImportReconciler::new(&store, &settings, &columns);
        let source = sheet(vec![
            buy_row(0, "1", "台積電", "2024-03-01"),
            buy_row(1, "2", "台積電", "2024-03-02"),
            buy_row(2, "3", "台積電", "2024-03-03"),
        ]);

        let summary = reconciler.run(&source, ImportKind::Investments).await;

        assert_eq!(summary.created(), 2);
        assert_eq!(summary.failed(), 1);
        let report = &summary.reports[1];
        assert_eq!(report.index, 1);
        match &report.outcome {
            RowOutcome::Failed { error, raw_row } => {
                assert!(error.contains("connection reset"));
                assert!(raw_row.contains("交易ID: 2"));
            }
            other => panic!("expected a failure, got {other:?}"),
        }
        assert!(report.to_string().starts_with("row 1 (line 3): failed:"));
    }
}
