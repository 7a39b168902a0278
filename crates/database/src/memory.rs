use crate::DbError;
use crate::store::{LedgerStore, StockSummary};
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DividendRecord, InvestmentRecord, NewDividend, NewInvestment, Stock};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct MemoryState {
    next_id: i64,
    stocks: BTreeMap<i64, Stock>,
    investments: BTreeMap<i64, InvestmentRecord>,
    dividends: BTreeMap<i64, DividendRecord>,
}

impl MemoryState {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn stock_id(&self, name: &str) -> Option<i64> {
        self.stocks.values().find(|s| s.name == name).map(|s| s.id)
    }

    fn require_stock(&self, stock_id: i64) -> Result<(), DbError> {
        if self.stocks.contains_key(&stock_id) {
            Ok(())
        } else {
            Err(DbError::NotFound(format!("stock {stock_id}")))
        }
    }

    /// `None` selects everything; an unknown name selects nothing.
    fn matches_stock(&self, filter: Option<&str>, stock_id: i64) -> bool {
        match filter {
            None => true,
            Some(name) => self.stock_id(name) == Some(stock_id),
        }
    }
}

/// A process-local `LedgerStore` with the same key and cascade rules as the
/// PostgreSQL schema. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn get_or_create_stock(&self, name: &str) -> Result<(Stock, bool), DbError> {
        let mut state = self.state.lock().await;
        if let Some(id) = state.stock_id(name) {
            return Ok((state.stocks[&id].clone(), false));
        }
        let id = state.allocate_id();
        let stock = Stock { id, name: name.to_string() };
        state.stocks.insert(id, stock.clone());
        Ok((stock, true))
    }

    async fn find_stock(&self, name: &str) -> Result<Option<Stock>, DbError> {
        let state = self.state.lock().await;
        Ok(state.stock_id(name).map(|id| state.stocks[&id].clone()))
    }

    async fn list_stocks(&self) -> Result<Vec<Stock>, DbError> {
        let state = self.state.lock().await;
        let mut stocks: Vec<Stock> = state.stocks.values().cloned().collect();
        stocks.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stocks)
    }

    async fn delete_stock(&self, name: &str) -> Result<bool, DbError> {
        let mut state = self.state.lock().await;
        let Some(id) = state.stock_id(name) else {
            return Ok(false);
        };
        state.stocks.remove(&id);
        state.investments.retain(|_, r| r.stock_id != id);
        state.dividends.retain(|_, r| r.stock_id != id);
        Ok(true)
    }

    async fn find_investment(
        &self,
        transaction_id: &str,
    ) -> Result<Option<InvestmentRecord>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .investments
            .values()
            .find(|r| r.transaction_id == transaction_id)
            .cloned())
    }

    async fn insert_investment(
        &self,
        investment: NewInvestment,
    ) -> Result<InvestmentRecord, DbError> {
        let mut state = self.state.lock().await;
        state.require_stock(investment.stock_id)?;
        if state
            .investments
            .values()
            .any(|r| r.transaction_id == investment.transaction_id)
        {
            return Err(DbError::Conflict(format!(
                "transaction_id '{}'",
                investment.transaction_id
            )));
        }
        let id = state.allocate_id();
        let record = investment.into_record(id);
        state.investments.insert(id, record.clone());
        Ok(record)
    }

    async fn update_investment(&self, record: &InvestmentRecord) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        state.require_stock(record.stock_id)?;
        match state.investments.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(DbError::NotFound(format!("investment record {}", record.id))),
        }
    }

    async fn list_investments(&self) -> Result<Vec<InvestmentRecord>, DbError> {
        let state = self.state.lock().await;
        let mut records: Vec<InvestmentRecord> = state.investments.values().cloned().collect();
        records.sort_by(|a, b| {
            a.buy_date
                .cmp(&b.buy_date)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        Ok(records)
    }

    async fn find_dividend(
        &self,
        stock_id: i64,
        payout_date: NaiveDate,
    ) -> Result<Option<DividendRecord>, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .dividends
            .values()
            .find(|r| r.stock_id == stock_id && r.payout_date == payout_date)
            .cloned())
    }

    async fn insert_dividend(&self, dividend: NewDividend) -> Result<DividendRecord, DbError> {
        let mut state = self.state.lock().await;
        state.require_stock(dividend.stock_id)?;
        if state
            .dividends
            .values()
            .any(|r| r.stock_id == dividend.stock_id && r.payout_date == dividend.payout_date)
        {
            return Err(DbError::Conflict(format!(
                "dividend for stock {} on {}",
                dividend.stock_id, dividend.payout_date
            )));
        }
        let id = state.allocate_id();
        let record = dividend.into_record(id);
        state.dividends.insert(id, record.clone());
        Ok(record)
    }

    async fn update_dividend(&self, record: &DividendRecord) -> Result<(), DbError> {
        let mut state = self.state.lock().await;
        match state.dividends.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(DbError::NotFound(format!("dividend record {}", record.id))),
        }
    }

    async fn sum_open_total_cost(&self) -> Result<Decimal, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .investments
            .values()
            .filter(|r| r.is_open())
            .map(|r| r.total_cost)
            .try_fold(Decimal::ZERO, |sum, v| checked_add(sum, v, "open total cost"))?)
    }

    async fn sum_net_profit(&self, stock: Option<&str>) -> Result<Decimal, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .investments
            .values()
            .filter(|r| state.matches_stock(stock, r.stock_id))
            .filter_map(|r| r.net_profit)
            .try_fold(Decimal::ZERO, |sum, v| checked_add(sum, v, "net profit"))?)
    }

    async fn sum_actual_income(&self, stock: Option<&str>) -> Result<Decimal, DbError> {
        let state = self.state.lock().await;
        Ok(state
            .dividends
            .values()
            .filter(|r| state.matches_stock(stock, r.stock_id))
            .map(|r| r.actual_income)
            .try_fold(Decimal::ZERO, |sum, v| checked_add(sum, v, "dividend income"))?)
    }

    async fn stock_summaries(&self) -> Result<Vec<StockSummary>, DbError> {
        let state = self.state.lock().await;
        let mut summaries = Vec::with_capacity(state.stocks.len());
        for stock in state.stocks.values() {
            let mut summary = StockSummary {
                stock_id: stock.id,
                name: stock.name.clone(),
                open_cost: Decimal::ZERO,
                realized_profit: Decimal::ZERO,
                dividend_income: Decimal::ZERO,
                open_positions: 0,
                closed_positions: 0,
            };
            for record in state.investments.values().filter(|r| r.stock_id == stock.id) {
                if record.is_open() {
                    summary.open_cost = checked_add(summary.open_cost, record.total_cost, "open cost")?;
                    summary.open_positions += 1;
                } else {
                    summary.closed_positions += 1;
                }
                if let Some(profit) = record.net_profit {
                    summary.realized_profit =
                        checked_add(summary.realized_profit, profit, "realized profit")?;
                }
            }
            for record in state.dividends.values().filter(|r| r.stock_id == stock.id) {
                summary.dividend_income =
                    checked_add(summary.dividend_income, record.actual_income, "dividend income")?;
            }
            summaries.push(summary);
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }
}

fn checked_add(sum: Decimal, value: Decimal, what: &str) -> Result<Decimal, DbError> {
    sum.checked_add(value)
        .ok_or_else(|| DbError::Overflow(what.to_string()))
}
