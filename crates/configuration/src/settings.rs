use serde::Deserialize;

/// The root configuration structure for the entire application.
///
/// Every section has defaults, so an absent `config.toml` is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub import: ImportSettings,
    pub columns: ColumnLabels,
    pub logging: LoggingSettings,
}

/// Contains parameters for spreadsheet imports.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Zero-based sheet index holding investment rows.
    pub investment_sheet: usize,
    /// Zero-based sheet index holding dividend rows.
    pub dividend_sheet: usize,
    /// How many normalized rows a dry run prints.
    pub preview_rows: usize,
    /// Transaction type labels that mean a buy (an open inventory lot).
    pub buy_labels: Vec<String>,
    /// Transaction type labels that mean a sell.
    pub sell_labels: Vec<String>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            investment_sheet: 0,
            dividend_sheet: 1,
            preview_rows: 5,
            buy_labels: vec!["庫存".to_string()],
            sell_labels: vec!["賣".to_string()],
        }
    }
}

/// The header labels the importer and exporter are bound to.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnLabels {
    pub investments: InvestmentColumns,
    pub dividends: DividendColumns,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InvestmentColumns {
    pub transaction_id: String,
    pub transaction_type: String,
    pub stock_name: String,
    pub buy_date: String,
    pub buy_price: String,
    pub quantity: String,
    pub buy_amount: String,
    pub fee_rate: String,
    pub fee_amount: String,
    pub total_cost: String,
    pub sell_date: String,
    /// The sheet calls this column a price, but it holds the sell amount.
    pub sell_amount: String,
    pub net_profit: String,
    pub profit_rate: String,
    pub annual_return_rate: String,
    pub holding_days: String,
}

impl Default for InvestmentColumns {
    fn default() -> Self {
        Self {
            transaction_id: "交易ID".to_string(),
            transaction_type: "交易類型".to_string(),
            stock_name: "名稱".to_string(),
            buy_date: "買進日期".to_string(),
            buy_price: "買進價".to_string(),
            quantity: "張數".to_string(),
            buy_amount: "金額".to_string(),
            fee_rate: "手續費率".to_string(),
            fee_amount: "手續費".to_string(),
            total_cost: "總成本".to_string(),
            sell_date: "賣出日期".to_string(),
            sell_amount: "賣出價".to_string(),
            net_profit: "淨利".to_string(),
            profit_rate: "獲利率".to_string(),
            annual_return_rate: "年化報酬率".to_string(),
            holding_days: "持有天數".to_string(),
        }
    }
}

impl InvestmentColumns {
    /// Pairs every label with the record field it feeds.
    pub fn entries(&self) -> [(&'static str, &str); 16] {
        [
            ("transaction_id", self.transaction_id.as_str()),
            ("transaction_type", self.transaction_type.as_str()),
            ("stock_name", self.stock_name.as_str()),
            ("buy_date", self.buy_date.as_str()),
            ("buy_price", self.buy_price.as_str()),
            ("quantity", self.quantity.as_str()),
            ("buy_amount", self.buy_amount.as_str()),
            ("fee_rate", self.fee_rate.as_str()),
            ("fee_amount", self.fee_amount.as_str()),
            ("total_cost", self.total_cost.as_str()),
            ("sell_date", self.sell_date.as_str()),
            ("sell_amount", self.sell_amount.as_str()),
            ("net_profit", self.net_profit.as_str()),
            ("profit_rate", self.profit_rate.as_str()),
            ("annual_return_rate", self.annual_return_rate.as_str()),
            ("holding_days", self.holding_days.as_str()),
        ]
    }

    /// The header label for a record field name, falling back to the field name itself.
    pub fn label_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.entries()
            .into_iter()
            .find(|(name, _)| *name == field)
            .map(|(_, label)| label)
            .unwrap_or(field)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DividendColumns {
    pub stock_name: String,
    pub payout_date: String,
    pub quantity: String,
    pub dividend_per_share: String,
    pub total_dividend: String,
    pub actual_income: String,
    pub fee: String,
}

impl Default for DividendColumns {
    fn default() -> Self {
        Self {
            stock_name: "名稱".to_string(),
            payout_date: "發放日期".to_string(),
            quantity: "張數".to_string(),
            dividend_per_share: "每股股利".to_string(),
            total_dividend: "總股利".to_string(),
            actual_income: "實際進帳".to_string(),
            fee: "手續費".to_string(),
        }
    }
}

impl DividendColumns {
    pub fn entries(&self) -> [(&'static str, &str); 7] {
        [
            ("stock_name", self.stock_name.as_str()),
            ("payout_date", self.payout_date.as_str()),
            ("quantity", self.quantity.as_str()),
            ("dividend_per_share", self.dividend_per_share.as_str()),
            ("total_dividend", self.total_dividend.as_str()),
            ("actual_income", self.actual_income.as_str()),
            ("fee", self.fee.as_str()),
        ]
    }

    pub fn label_for<'a>(&'a self, field: &'a str) -> &'a str {
        self.entries()
            .into_iter()
            .find(|(name, _)| *name == field)
            .map(|(_, label)| label)
            .unwrap_or(field)
    }
}

/// Console output style for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Full,
}

/// Contains parameters for log output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
    /// When set, events are also written to a daily rolling file in this directory.
    pub directory: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}
