//! Read-only views over the ledger: aggregate totals, per-stock summaries and
//! the flat investment export.

use database::{LedgerStore, StockSummary};
use rust_decimal::Decimal;

pub mod error;
pub mod export;

pub use error::ReportError;
pub use export::export_investments;

/// Answers aggregate questions against an injected store.
pub struct LedgerReporter<'a> {
    store: &'a dyn LedgerStore,
}

impl<'a> LedgerReporter<'a> {
    pub fn new(store: &'a dyn LedgerStore) -> Self {
        Self { store }
    }

    /// Capital still tied up in open positions.
    pub async fn total_cost_in_stock(&self) -> Result<Decimal, ReportError> {
        let total = self.store.sum_open_total_cost().await?;
        tracing::debug!(%total, "Computed total cost in stock.");
        Ok(total)
    }

    /// Realized profit, overall or for one stock. An unknown stock totals zero.
    pub async fn total_profit(&self, stock: Option<&str>) -> Result<Decimal, ReportError> {
        let total = self.store.sum_net_profit(stock.map(str::trim)).await?;
        tracing::debug!(?stock, %total, "Computed total profit.");
        Ok(total)
    }

    /// Dividend income actually received, overall or for one stock.
    pub async fn total_dividend(&self, stock: Option<&str>) -> Result<Decimal, ReportError> {
        let total = self.store.sum_actual_income(stock.map(str::trim)).await?;
        tracing::debug!(?stock, %total, "Computed total dividend.");
        Ok(total)
    }

    pub async fn stock_summaries(&self) -> Result<Vec<StockSummary>, ReportError> {
        Ok(self.store.stock_summaries().await?)
    }
}
