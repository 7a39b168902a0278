use crate::enums::TransactionType;
use crate::error::CoreError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// A listed stock. Its name is the natural key used by imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Stock {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for Stock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One buy transaction, optionally closed by a sell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InvestmentRecord {
    pub id: i64,
    pub transaction_id: String,
    #[sqlx(try_from = "String")]
    pub transaction_type: TransactionType,
    pub stock_id: i64,
    pub buy_date: NaiveDate,
    pub buy_price: Decimal,
    pub quantity: i64,
    pub buy_amount: Decimal,
    pub fee_rate: Decimal,
    pub fee_amount: Decimal,
    pub total_cost: Decimal,

    // Sell side, null until the position is closed.
    pub sell_date: Option<NaiveDate>,
    pub sell_amount: Option<Decimal>,
    pub net_profit: Option<Decimal>,
    pub profit_rate: Option<Decimal>,
    pub annual_return_rate: Option<Decimal>,
    pub holding_days: Option<i64>,
}

impl InvestmentRecord {
    /// An open position has no recorded sell date.
    pub fn is_open(&self) -> bool {
        self.sell_date.is_none()
    }

    /// Merges every field the patch supplies into this record.
    ///
    /// Fields the patch leaves as `None` are untouched. Returns the names of the
    /// fields whose stored value actually changed, so an identical re-import
    /// returns an empty list.
    pub fn merge(&mut self, patch: &InvestmentPatch) -> Vec<&'static str> {
        let mut changed = Vec::new();
        set(&mut self.transaction_type, &patch.transaction_type, "transaction_type", &mut changed);
        set(&mut self.stock_id, &patch.stock_id, "stock_id", &mut changed);
        set(&mut self.buy_date, &patch.buy_date, "buy_date", &mut changed);
        set(&mut self.buy_price, &patch.buy_price, "buy_price", &mut changed);
        set(&mut self.quantity, &patch.quantity, "quantity", &mut changed);
        set(&mut self.buy_amount, &patch.buy_amount, "buy_amount", &mut changed);
        set(&mut self.fee_rate, &patch.fee_rate, "fee_rate", &mut changed);
        set(&mut self.fee_amount, &patch.fee_amount, "fee_amount", &mut changed);
        set(&mut self.total_cost, &patch.total_cost, "total_cost", &mut changed);
        set_nullable(&mut self.sell_date, &patch.sell_date, "sell_date", &mut changed);
        set_nullable(&mut self.sell_amount, &patch.sell_amount, "sell_amount", &mut changed);
        set_nullable(&mut self.net_profit, &patch.net_profit, "net_profit", &mut changed);
        set_nullable(&mut self.profit_rate, &patch.profit_rate, "profit_rate", &mut changed);
        set_nullable(
            &mut self.annual_return_rate,
            &patch.annual_return_rate,
            "annual_return_rate",
            &mut changed,
        );
        set_nullable(&mut self.holding_days, &patch.holding_days, "holding_days", &mut changed);
        changed
    }
}

/// Rendered as `<stock> <type> (<buy_date> - <sell_date | holding>)` once the
/// caller supplies the stock name.
pub struct InvestmentLabel<'a> {
    pub record: &'a InvestmentRecord,
    pub stock_name: &'a str,
}

impl fmt::Display for InvestmentLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sell = match self.record.sell_date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => "holding".to_string(),
        };
        write!(
            f,
            "{} {} ({} - {})",
            self.stock_name, self.record.transaction_type, self.record.buy_date, sell
        )
    }
}

/// A fully specified investment, ready to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInvestment {
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub stock_id: i64,
    pub buy_date: NaiveDate,
    pub buy_price: Decimal,
    pub quantity: i64,
    pub buy_amount: Decimal,
    pub fee_rate: Decimal,
    pub fee_amount: Decimal,
    pub total_cost: Decimal,
    pub sell_date: Option<NaiveDate>,
    pub sell_amount: Option<Decimal>,
    pub net_profit: Option<Decimal>,
    pub profit_rate: Option<Decimal>,
    pub annual_return_rate: Option<Decimal>,
    pub holding_days: Option<i64>,
}

impl NewInvestment {
    pub fn into_record(self, id: i64) -> InvestmentRecord {
        InvestmentRecord {
            id,
            transaction_id: self.transaction_id,
            transaction_type: self.transaction_type,
            stock_id: self.stock_id,
            buy_date: self.buy_date,
            buy_price: self.buy_price,
            quantity: self.quantity,
            buy_amount: self.buy_amount,
            fee_rate: self.fee_rate,
            fee_amount: self.fee_amount,
            total_cost: self.total_cost,
            sell_date: self.sell_date,
            sell_amount: self.sell_amount,
            net_profit: self.net_profit,
            profit_rate: self.profit_rate,
            annual_return_rate: self.annual_return_rate,
            holding_days: self.holding_days,
        }
    }
}

/// The non-key investment fields one source row supplied.
///
/// `None` means "not present in the source", never "clear this field".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InvestmentPatch {
    pub transaction_type: Option<TransactionType>,
    pub stock_id: Option<i64>,
    pub buy_date: Option<NaiveDate>,
    pub buy_price: Option<Decimal>,
    pub quantity: Option<i64>,
    pub buy_amount: Option<Decimal>,
    pub fee_rate: Option<Decimal>,
    pub fee_amount: Option<Decimal>,
    pub total_cost: Option<Decimal>,
    pub sell_date: Option<NaiveDate>,
    pub sell_amount: Option<Decimal>,
    pub net_profit: Option<Decimal>,
    pub profit_rate: Option<Decimal>,
    pub annual_return_rate: Option<Decimal>,
    pub holding_days: Option<i64>,
}

impl InvestmentPatch {
    /// Required fields of a new record that this patch leaves empty. The stock id is
    /// not listed; callers resolve it from the stock name.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        check(&self.transaction_type, "transaction_type", &mut missing);
        check(&self.buy_date, "buy_date", &mut missing);
        check(&self.buy_price, "buy_price", &mut missing);
        check(&self.quantity, "quantity", &mut missing);
        check(&self.buy_amount, "buy_amount", &mut missing);
        check(&self.fee_rate, "fee_rate", &mut missing);
        check(&self.fee_amount, "fee_amount", &mut missing);
        check(&self.total_cost, "total_cost", &mut missing);
        missing
    }

    /// The closing metrics this patch supplies.
    pub fn derived_fields(&self) -> Vec<&'static str> {
        let mut present = Vec::new();
        if self.net_profit.is_some() {
            present.push("net_profit");
        }
        if self.profit_rate.is_some() {
            present.push("profit_rate");
        }
        if self.annual_return_rate.is_some() {
            present.push("annual_return_rate");
        }
        if self.holding_days.is_some() {
            present.push("holding_days");
        }
        present
    }

    /// Builds an insertable investment, failing with every missing required field named.
    pub fn into_new(self, transaction_id: &str) -> Result<NewInvestment, CoreError> {
        let mut missing = self.missing_fields();
        if self.stock_id.is_none() {
            let after_type = usize::from(self.transaction_type.is_none());
            missing.insert(after_type, "stock_id");
        }

        match (
            self.transaction_type,
            self.stock_id,
            self.buy_date,
            self.buy_price,
            self.quantity,
            self.buy_amount,
            self.fee_rate,
            self.fee_amount,
            self.total_cost,
        ) {
            (
                Some(transaction_type),
                Some(stock_id),
                Some(buy_date),
                Some(buy_price),
                Some(quantity),
                Some(buy_amount),
                Some(fee_rate),
                Some(fee_amount),
                Some(total_cost),
            ) => Ok(NewInvestment {
                transaction_id: transaction_id.to_string(),
                transaction_type,
                stock_id,
                buy_date,
                buy_price,
                quantity,
                buy_amount,
                fee_rate,
                fee_amount,
                total_cost,
                sell_date: self.sell_date,
                sell_amount: self.sell_amount,
                net_profit: self.net_profit,
                profit_rate: self.profit_rate,
                annual_return_rate: self.annual_return_rate,
                holding_days: self.holding_days,
            }),
            _ => Err(CoreError::MissingFields(missing)),
        }
    }
}

/// One dividend payout. `(stock_id, payout_date)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct DividendRecord {
    pub id: i64,
    pub stock_id: i64,
    pub quantity: i64,
    pub payout_date: NaiveDate,
    pub dividend_per_share: Decimal,
    pub total_dividend: Decimal,
    pub actual_income: Decimal,
    pub fee: Decimal,
}

impl DividendRecord {
    pub fn merge(&mut self, patch: &DividendPatch) -> Vec<&'static str> {
        let mut changed = Vec::new();
        set(&mut self.quantity, &patch.quantity, "quantity", &mut changed);
        set(
            &mut self.dividend_per_share,
            &patch.dividend_per_share,
            "dividend_per_share",
            &mut changed,
        );
        set(&mut self.total_dividend, &patch.total_dividend, "total_dividend", &mut changed);
        set(&mut self.actual_income, &patch.actual_income, "actual_income", &mut changed);
        set(&mut self.fee, &patch.fee, "fee", &mut changed);
        changed
    }
}

/// Rendered as `<stock> dividend <payout_date>: <actual_income>`.
pub struct DividendLabel<'a> {
    pub record: &'a DividendRecord,
    pub stock_name: &'a str,
}

impl fmt::Display for DividendLabel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} dividend {}: {}",
            self.stock_name, self.record.payout_date, self.record.actual_income
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewDividend {
    pub stock_id: i64,
    pub payout_date: NaiveDate,
    pub quantity: i64,
    pub dividend_per_share: Decimal,
    pub total_dividend: Decimal,
    pub actual_income: Decimal,
    pub fee: Decimal,
}

impl NewDividend {
    pub fn into_record(self, id: i64) -> DividendRecord {
        DividendRecord {
            id,
            stock_id: self.stock_id,
            quantity: self.quantity,
            payout_date: self.payout_date,
            dividend_per_share: self.dividend_per_share,
            total_dividend: self.total_dividend,
            actual_income: self.actual_income,
            fee: self.fee,
        }
    }
}

/// The non-key dividend fields one source row supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DividendPatch {
    pub quantity: Option<i64>,
    pub dividend_per_share: Option<Decimal>,
    pub total_dividend: Option<Decimal>,
    pub actual_income: Option<Decimal>,
    pub fee: Option<Decimal>,
}

impl DividendPatch {
    /// Required fields of a new payout that this patch leaves empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        check(&self.quantity, "quantity", &mut missing);
        check(&self.dividend_per_share, "dividend_per_share", &mut missing);
        check(&self.total_dividend, "total_dividend", &mut missing);
        check(&self.actual_income, "actual_income", &mut missing);
        check(&self.fee, "fee", &mut missing);
        missing
    }

    pub fn into_new(self, stock_id: i64, payout_date: NaiveDate) -> Result<NewDividend, CoreError> {
        let missing = self.missing_fields();

        match (
            self.quantity,
            self.dividend_per_share,
            self.total_dividend,
            self.actual_income,
            self.fee,
        ) {
            (
                Some(quantity),
                Some(dividend_per_share),
                Some(total_dividend),
                Some(actual_income),
                Some(fee),
            ) => Ok(NewDividend {
                stock_id,
                payout_date,
                quantity,
                dividend_per_share,
                total_dividend,
                actual_income,
                fee,
            }),
            _ => Err(CoreError::MissingFields(missing)),
        }
    }
}

fn set<T: PartialEq + Clone>(
    slot: &mut T,
    value: &Option<T>,
    name: &'static str,
    changed: &mut Vec<&'static str>,
) {
    if let Some(value) = value {
        if slot != value {
            *slot = value.clone();
            changed.push(name);
        }
    }
}

fn set_nullable<T: PartialEq + Clone>(
    slot: &mut Option<T>,
    value: &Option<T>,
    name: &'static str,
    changed: &mut Vec<&'static str>,
) {
    if let Some(value) = value {
        if slot.as_ref() != Some(value) {
            *slot = Some(value.clone());
            changed.push(name);
        }
    }
}

fn check<T>(value: &Option<T>, name: &'static str, missing: &mut Vec<&'static str>) {
    if value.is_none() {
        missing.push(name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn open_record() -> InvestmentRecord {
        InvestmentRecord {
            id: 1,
            transaction_id: "42".into(),
            transaction_type: TransactionType::Buy,
            stock_id: 7,
            buy_date: date(2024, 1, 2),
            buy_price: dec!(10.0),
            quantity: 1000,
            buy_amount: dec!(10000),
            fee_rate: dec!(0.002),
            fee_amount: dec!(20),
            total_cost: dec!(10020),
            sell_date: None,
            sell_amount: None,
            net_profit: None,
            profit_rate: None,
            annual_return_rate: None,
            holding_days: None,
        }
    }

    #[test]
    fn merge_leaves_unsupplied_fields_untouched() {
        let mut record = open_record();
        let patch = InvestmentPatch {
            sell_date: Some(date(2024, 2, 1)),
            sell_amount: Some(dec!(10500)),
            ..Default::default()
        };

        let changed = record.merge(&patch);

        assert_eq!(changed, vec!["sell_date", "sell_amount"]);
        assert_eq!(record.buy_amount, dec!(10000));
        assert_eq!(record.sell_amount, Some(dec!(10500)));
        assert!(!record.is_open());
    }

    #[test]
    fn merge_of_equal_values_reports_no_change() {
        let mut record = open_record();
        let patch = InvestmentPatch {
            buy_price: Some(dec!(10.00)),
            quantity: Some(1000),
            ..Default::default()
        };
        assert!(record.merge(&patch).is_empty());
    }

    #[test]
    fn into_new_names_every_missing_field() {
        let patch = InvestmentPatch {
            transaction_type: Some(TransactionType::Buy),
            stock_id: Some(1),
            buy_date: Some(date(2024, 1, 2)),
            ..Default::default()
        };
        let err = patch.into_new("9").unwrap_err().to_string();
        assert!(err.contains("buy_price"));
        assert!(err.contains("total_cost"));
        assert!(!err.contains("buy_date"));
    }

    #[test]
    fn label_shows_holding_for_open_positions() {
        let record = open_record();
        let label = InvestmentLabel { record: &record, stock_name: "TSMC" }.to_string();
        assert_eq!(label, "TSMC BUY (2024-01-02 - holding)");
    }

    #[test]
    fn dividend_merge_overwrites_income() {
        let mut record = DividendPatch {
            quantity: Some(2),
            dividend_per_share: Some(dec!(1.5)),
            total_dividend: Some(dec!(3000)),
            actual_income: Some(dec!(2990)),
            fee: Some(dec!(10)),
        }
        .into_new(3, date(2024, 7, 11))
        .unwrap()
        .into_record(1);

        let changed = record.merge(&DividendPatch {
            actual_income: Some(dec!(2980)),
            ..Default::default()
        });

        assert_eq!(changed, vec!["actual_income"]);
        assert_eq!(record.actual_income, dec!(2980));
    }

    #[test]
    fn missing_fields_leave_the_stock_to_the_caller() {
        let patch = InvestmentPatch {
            buy_date: Some(date(2024, 1, 2)),
            ..Default::default()
        };
        assert_eq!(
            patch.missing_fields(),
            vec![
                "transaction_type",
                "buy_price",
                "quantity",
                "buy_amount",
                "fee_rate",
                "fee_amount",
                "total_cost"
            ]
        );
        match patch.into_new("1").unwrap_err() {
            CoreError::MissingFields(fields) => assert_eq!(&fields[..2], ["transaction_type", "stock_id"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn only_a_missing_stock_id_blocks_an_otherwise_complete_patch() {
        let record = open_record();
        let patch = InvestmentPatch {
            transaction_type: Some(record.transaction_type),
            buy_date: Some(record.buy_date),
            buy_price: Some(record.buy_price),
            quantity: Some(record.quantity),
            buy_amount: Some(record.buy_amount),
            fee_rate: Some(record.fee_rate),
            fee_amount: Some(record.fee_amount),
            total_cost: Some(record.total_cost),
            ..Default::default()
        };
        assert!(patch.missing_fields().is_empty());
        match patch.into_new("1").unwrap_err() {
            CoreError::MissingFields(fields) => assert_eq!(fields, vec!["stock_id"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn derived_fields_lists_supplied_metrics() {
        let patch = InvestmentPatch {
            net_profit: Some(dec!(999)),
            holding_days: Some(-5),
            ..Default::default()
        };
        assert_eq!(patch.derived_fields(), vec!["net_profit", "holding_days"]);
        assert!(InvestmentPatch::default().derived_fields().is_empty());
    }

    #[test]
    fn dividend_label_shows_payout_and_income() {
        let record = DividendPatch {
            quantity: Some(3),
            dividend_per_share: Some(dec!(1.07)),
            total_dividend: Some(dec!(3210)),
            actual_income: Some(dec!(3200)),
            fee: Some(dec!(10)),
        }
        .into_new(1, date(2024, 7, 11))
        .unwrap()
        .into_record(4);
        let label = DividendLabel { record: &record, stock_name: "0056" }.to_string();
        assert_eq!(label, "0056 dividend 2024-07-11: 3200");
    }
}
