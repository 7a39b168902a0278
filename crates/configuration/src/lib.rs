use crate::error::ConfigError;
use crate::settings::Config;
use std::collections::HashSet;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    ColumnLabels, DividendColumns, ImportSettings, InvestmentColumns, LogFormat, LoggingSettings,
};

/// The default configuration file name, resolved relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Loads the application configuration.
///
/// Reads the TOML file at `path` if it exists, then applies `LEDGER__*` environment
/// overrides (e.g. `LEDGER__IMPORT__PREVIEW_ROWS=10`), deserializes the result into
/// the strongly-typed `Config` and validates it.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("LEDGER").separator("__"))
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    validate(&config)?;

    tracing::debug!(path, "Configuration loaded.");
    Ok(config)
}

/// Rejects configurations the importer cannot work with.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.import.preview_rows == 0 {
        return Err(ConfigError::ValidationError(
            "import.preview_rows must be at least 1".to_string(),
        ));
    }

    let investment_labels = config.columns.investments.entries();
    let dividend_labels = config.columns.dividends.entries();
    let blank = investment_labels
        .iter()
        .map(|(field, label)| ("investments", *field, *label))
        .chain(dividend_labels.iter().map(|(field, label)| ("dividends", *field, *label)))
        .find(|(_, _, label)| label.trim().is_empty());
    if let Some((section, field, _)) = blank {
        return Err(ConfigError::ValidationError(format!(
            "columns.{section}.{field} must not be empty"
        )));
    }

    if config.import.buy_labels.is_empty() || config.import.sell_labels.is_empty() {
        return Err(ConfigError::ValidationError(
            "import.buy_labels and import.sell_labels need at least one label each".to_string(),
        ));
    }
    let buys: HashSet<&str> = config.import.buy_labels.iter().map(|l| l.trim()).collect();
    if let Some(both) = config.import.sell_labels.iter().find(|l| buys.contains(l.trim())) {
        return Err(ConfigError::ValidationError(format!(
            "transaction label '{both}' is listed as both buy and sell"
        )));
    }

    Ok(())
}
