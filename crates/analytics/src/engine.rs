use crate::error::AnalyticsError;
use crate::report::{PositionFacts, PositionMetrics};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Annualization basis for return rates.
pub const DAYS_PER_YEAR: i64 = 365;

/// A stateless calculator for deriving the metrics of a closed position.
#[derive(Debug, Default)]
pub struct MetricsEngine {}

impl MetricsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The main entry point: derives every metric from the position's facts.
    ///
    /// The total cost is recomputed as `buy_amount + fee_amount`.
    pub fn calculate(&self, facts: &PositionFacts) -> Result<PositionMetrics, AnalyticsError> {
        let total_cost = facts
            .buy_amount
            .checked_add(facts.fee_amount)
            .ok_or(AnalyticsError::Overflow("total_cost"))?;
        self.calculate_with_cost(facts, total_cost)
    }

    /// Like `calculate`, but trusts a total cost the caller already knows
    /// (for example the value a spreadsheet row carries).
    pub fn calculate_with_cost(
        &self,
        facts: &PositionFacts,
        total_cost: Decimal,
    ) -> Result<PositionMetrics, AnalyticsError> {
        let holding_days = holding_days(facts.buy_date, facts.sell_date)?;
        let net_profit = net_profit(facts.sell_amount, total_cost)?;
        let profit_rate = profit_rate(net_profit, total_cost);
        let annual_return_rate = match profit_rate {
            Some(rate) => annualize(rate, holding_days)?,
            None => None,
        };

        tracing::trace!(
            %net_profit,
            ?profit_rate,
            ?annual_return_rate,
            holding_days,
            "Derived position metrics."
        );

        Ok(PositionMetrics {
            total_cost,
            net_profit,
            profit_rate,
            annual_return_rate,
            holding_days,
        })
    }
}

/// `sell_amount - total_cost`, exact.
pub fn net_profit(sell_amount: Decimal, total_cost: Decimal) -> Result<Decimal, AnalyticsError> {
    sell_amount
        .checked_sub(total_cost)
        .ok_or(AnalyticsError::Overflow("net_profit"))
}

/// `net_profit / total_cost`, undefined for a zero cost basis.
pub fn profit_rate(net_profit: Decimal, total_cost: Decimal) -> Option<Decimal> {
    if total_cost.is_zero() {
        return None;
    }
    net_profit.checked_div(total_cost)
}

/// Whole days between buy and sell. A sell before the buy is invalid input.
pub fn holding_days(buy_date: NaiveDate, sell_date: NaiveDate) -> Result<i64, AnalyticsError> {
    let days = (sell_date - buy_date).num_days();
    if days < 0 {
        return Err(AnalyticsError::NegativeHoldingPeriod {
            buy_date,
            sell_date,
            days,
        });
    }
    Ok(days)
}

/// Scales a profit rate to a 365-day holding period.
///
/// Returns `None` for a same-day round trip, where annualization is undefined.
pub fn annualize(profit_rate: Decimal, holding_days: i64) -> Result<Option<Decimal>, AnalyticsError> {
    if holding_days <= 0 {
        return Ok(None);
    }
    profit_rate
        .checked_mul(Decimal::from(DAYS_PER_YEAR))
        .and_then(|scaled| scaled.checked_div(Decimal::from(holding_days)))
        .map(Some)
        .ok_or(AnalyticsError::Overflow("annual_return_rate"))
}
