use crate::DbError;
use crate::store::{LedgerStore, StockSummary};
use async_trait::async_trait;
use chrono::NaiveDate;
use core_types::{DividendRecord, InvestmentRecord, NewDividend, NewInvestment, Stock};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;

const INVESTMENT_COLUMNS: &str = "id, transaction_id, transaction_type, stock_id, buy_date, \
     buy_price, quantity, buy_amount, fee_rate, fee_amount, total_cost, sell_date, sell_amount, \
     net_profit, profit_rate, annual_return_rate, holding_days";

const DIVIDEND_COLUMNS: &str = "id, stock_id, quantity, payout_date, dividend_per_share, \
     total_dividend, actual_income, fee";

/// The `DbRepository` is the PostgreSQL implementation of `LedgerStore`.
/// It encapsulates all SQL queries and data access logic.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for DbRepository {
    async fn get_or_create_stock(&self, name: &str) -> Result<(Stock, bool), DbError> {
        // `DO NOTHING` returns no row on conflict, which tells us the stock already existed.
        let inserted = sqlx::query_as::<_, Stock>(
            "INSERT INTO stocks (name) VALUES ($1) ON CONFLICT (name) DO NOTHING RETURNING id, name",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(stock) = inserted {
            return Ok((stock, true));
        }

        let stock = self
            .find_stock(name)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("stock '{name}'")))?;
        Ok((stock, false))
    }

    async fn find_stock(&self, name: &str) -> Result<Option<Stock>, DbError> {
        let stock = sqlx::query_as::<_, Stock>("SELECT id, name FROM stocks WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(stock)
    }

    async fn list_stocks(&self) -> Result<Vec<Stock>, DbError> {
        let stocks = sqlx::query_as::<_, Stock>("SELECT id, name FROM stocks ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(stocks)
    }

    async fn delete_stock(&self, name: &str) -> Result<bool, DbError> {
        // Investment and dividend rows go with it through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM stocks WHERE name = $1")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_investment(
        &self,
        transaction_id: &str,
    ) -> Result<Option<InvestmentRecord>, DbError> {
        let record = sqlx::query_as::<_, InvestmentRecord>(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investment_records WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert_investment(
        &self,
        investment: NewInvestment,
    ) -> Result<InvestmentRecord, DbError> {
        let record = sqlx::query_as::<_, InvestmentRecord>(&format!(
            r#"
            INSERT INTO investment_records (
                transaction_id, transaction_type, stock_id, buy_date, buy_price, quantity,
                buy_amount, fee_rate, fee_amount, total_cost, sell_date, sell_amount,
                net_profit, profit_rate, annual_return_rate, holding_days
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16
            )
            RETURNING {INVESTMENT_COLUMNS}
            "#
        ))
        .bind(&investment.transaction_id)
        .bind(investment.transaction_type.as_str())
        .bind(investment.stock_id)
        .bind(investment.buy_date)
        .bind(investment.buy_price)
        .bind(investment.quantity)
        .bind(investment.buy_amount)
        .bind(investment.fee_rate)
        .bind(investment.fee_amount)
        .bind(investment.total_cost)
        .bind(investment.sell_date)
        .bind(investment.sell_amount)
        .bind(investment.net_profit)
        .bind(investment.profit_rate)
        .bind(investment.annual_return_rate)
        .bind(investment.holding_days)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_investment(&self, record: &InvestmentRecord) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE investment_records SET
                transaction_type = $2, stock_id = $3, buy_date = $4, buy_price = $5,
                quantity = $6, buy_amount = $7, fee_rate = $8, fee_amount = $9,
                total_cost = $10, sell_date = $11, sell_amount = $12, net_profit = $13,
                profit_rate = $14, annual_return_rate = $15, holding_days = $16
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.transaction_type.as_str())
        .bind(record.stock_id)
        .bind(record.buy_date)
        .bind(record.buy_price)
        .bind(record.quantity)
        .bind(record.buy_amount)
        .bind(record.fee_rate)
        .bind(record.fee_amount)
        .bind(record.total_cost)
        .bind(record.sell_date)
        .bind(record.sell_amount)
        .bind(record.net_profit)
        .bind(record.profit_rate)
        .bind(record.annual_return_rate)
        .bind(record.holding_days)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("investment record {}", record.id)));
        }
        Ok(())
    }

    async fn list_investments(&self) -> Result<Vec<InvestmentRecord>, DbError> {
        let records = sqlx::query_as::<_, InvestmentRecord>(&format!(
            "SELECT {INVESTMENT_COLUMNS} FROM investment_records ORDER BY buy_date ASC, transaction_id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn find_dividend(
        &self,
        stock_id: i64,
        payout_date: NaiveDate,
    ) -> Result<Option<DividendRecord>, DbError> {
        let record = sqlx::query_as::<_, DividendRecord>(&format!(
            "SELECT {DIVIDEND_COLUMNS} FROM dividend_records WHERE stock_id = $1 AND payout_date = $2"
        ))
        .bind(stock_id)
        .bind(payout_date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn insert_dividend(&self, dividend: NewDividend) -> Result<DividendRecord, DbError> {
        let record = sqlx::query_as::<_, DividendRecord>(&format!(
            r#"
            INSERT INTO dividend_records (
                stock_id, quantity, payout_date, dividend_per_share, total_dividend, actual_income, fee
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {DIVIDEND_COLUMNS}
            "#
        ))
        .bind(dividend.stock_id)
        .bind(dividend.quantity)
        .bind(dividend.payout_date)
        .bind(dividend.dividend_per_share)
        .bind(dividend.total_dividend)
        .bind(dividend.actual_income)
        .bind(dividend.fee)
        .fetch_one(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update_dividend(&self, record: &DividendRecord) -> Result<(), DbError> {
        let result = sqlx::query(
            r#"
            UPDATE dividend_records SET
                quantity = $2, dividend_per_share = $3, total_dividend = $4,
                actual_income = $5, fee = $6
            WHERE id = $1
            "#,
        )
        .bind(record.id)
        .bind(record.quantity)
        .bind(record.dividend_per_share)
        .bind(record.total_dividend)
        .bind(record.actual_income)
        .bind(record.fee)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("dividend record {}", record.id)));
        }
        Ok(())
    }

    async fn sum_open_total_cost(&self) -> Result<Decimal, DbError> {
        let row: (Option<Decimal>,) = sqlx::query_as(
            "SELECT COALESCE(SUM(total_cost), 0) FROM investment_records WHERE sell_date IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0.unwrap_or(Decimal::ZERO))
    }

    async fn sum_net_profit(&self, stock: Option<&str>) -> Result<Decimal, DbError> {
        let row: (Option<Decimal>,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(ir.net_profit), 0)
            FROM investment_records AS ir
            JOIN stocks AS s ON s.id = ir.stock_id
            WHERE $1::TEXT IS NULL OR s.name = $1
            "#,
        )
        .bind(stock)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0.unwrap_or(Decimal::ZERO))
    }

    async fn sum_actual_income(&self, stock: Option<&str>) -> Result<Decimal, DbError> {
        let row: (Option<Decimal>,) = sqlx::query_as(
            r#"
            SELECT COALESCE(SUM(dr.actual_income), 0)
            FROM dividend_records AS dr
            JOIN stocks AS s ON s.id = dr.stock_id
            WHERE $1::TEXT IS NULL OR s.name = $1
            "#,
        )
        .bind(stock)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0.unwrap_or(Decimal::ZERO))
    }

    async fn stock_summaries(&self) -> Result<Vec<StockSummary>, DbError> {
        let summaries = sqlx::query_as::<_, StockSummary>(
            r#"
            SELECT
                s.id AS stock_id,
                s.name AS name,
                COALESCE((SELECT SUM(ir.total_cost) FROM investment_records AS ir
                          WHERE ir.stock_id = s.id AND ir.sell_date IS NULL), 0) AS open_cost,
                COALESCE((SELECT SUM(ir.net_profit) FROM investment_records AS ir
                          WHERE ir.stock_id = s.id), 0) AS realized_profit,
                COALESCE((SELECT SUM(dr.actual_income) FROM dividend_records AS dr
                          WHERE dr.stock_id = s.id), 0) AS dividend_income,
                (SELECT COUNT(*) FROM investment_records AS ir
                 WHERE ir.stock_id = s.id AND ir.sell_date IS NULL) AS open_positions,
                (SELECT COUNT(*) FROM investment_records AS ir
                 WHERE ir.stock_id = s.id AND ir.sell_date IS NOT NULL) AS closed_positions
            FROM stocks AS s
            ORDER BY s.name ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }
}
