use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The buy and sell facts of one closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFacts {
    pub buy_price: Decimal,
    pub quantity: i64,
    pub buy_amount: Decimal,
    pub fee_amount: Decimal,
    pub buy_date: NaiveDate,
    pub sell_amount: Decimal,
    pub sell_date: NaiveDate,
}

/// The derived metrics of a closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionMetrics {
    pub total_cost: Decimal,
    pub net_profit: Decimal,
    pub profit_rate: Option<Decimal>, // None when total_cost is zero
    pub annual_return_rate: Option<Decimal>, // None for same-day round trips
    pub holding_days: i64,
}
