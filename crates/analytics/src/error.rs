use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AnalyticsError {
    #[error("Sell date {sell_date} is before buy date {buy_date} ({days} holding days)")]
    NegativeHoldingPeriod {
        buy_date: NaiveDate,
        sell_date: NaiveDate,
        days: i64,
    },

    #[error("Decimal overflow while calculating '{0}'")]
    Overflow(&'static str),
}
