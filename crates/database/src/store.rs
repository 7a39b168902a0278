use crate::DbError;
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DividendRecord, InvestmentRecord, NewDividend, NewInvestment, Stock};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Read-only aggregates for one stock.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct StockSummary {
    pub stock_id: i64,
    pub name: String,
    /// Sum of `total_cost` over open positions.
    pub open_cost: Decimal,
    /// Sum of `net_profit` over every position that has one.
    pub realized_profit: Decimal,
    /// Sum of `actual_income` over dividend payouts.
    pub dividend_income: Decimal,
    pub open_positions: i64,
    pub closed_positions: i64,
}

/// The persistence contract consumed by imports, reports and exports.
///
/// Every method is a single atomic operation; there is no multi-call transaction.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Returns the stock with this exact name, creating it when absent.
    /// The flag is `true` when the stock was created by this call.
    async fn get_or_create_stock(&self, name: &str) -> Result<(Stock, bool), DbError>;

    async fn find_stock(&self, name: &str) -> Result<Option<Stock>, DbError>;

    /// All stocks ordered by name.
    async fn list_stocks(&self) -> Result<Vec<Stock>, DbError>;

    /// Deletes a stock together with its investment and dividend records.
    /// Returns `false` when no stock had that name.
    async fn delete_stock(&self, name: &str) -> Result<bool, DbError>;

    async fn find_investment(&self, transaction_id: &str)
    -> Result<Option<InvestmentRecord>, DbError>;

    async fn insert_investment(&self, investment: NewInvestment)
    -> Result<InvestmentRecord, DbError>;

    /// Overwrites every non-key field of the record with the same `id`.
    async fn update_investment(&self, record: &InvestmentRecord) -> Result<(), DbError>;

    /// All investments ordered by buy date, then transaction id.
    async fn list_investments(&self) -> Result<Vec<InvestmentRecord>, DbError>;

    async fn find_dividend(
        &self,
        stock_id: i64,
        payout_date: NaiveDate,
    ) -> Result<Option<DividendRecord>, DbError>;

    async fn insert_dividend(&self, dividend: NewDividend) -> Result<DividendRecord, DbError>;

    async fn update_dividend(&self, record: &DividendRecord) -> Result<(), DbError>;

    /// Sum of `total_cost` over open positions; zero when there are none.
    async fn sum_open_total_cost(&self) -> Result<Decimal, DbError>;

    /// Sum of `net_profit`, overall or for one stock name; zero when there is nothing to sum.
    async fn sum_net_profit(&self, stock: Option<&str>) -> Result<Decimal, DbError>;

    /// Sum of dividend `actual_income`, overall or for one stock name.
    async fn sum_actual_income(&self, stock: Option<&str>) -> Result<Decimal, DbError>;

    /// Per-stock aggregates ordered by stock name.
    async fn stock_summaries(&self) -> Result<Vec<StockSummary>, DbError>;
}
