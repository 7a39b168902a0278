use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Database error: {0}")]
    Database(#[from] database::DbError),

    #[error("Failed to write the export: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to write the export: {0}")]
    Io(#[from] std::io::Error),

    #[error("Investment {transaction_id} refers to unknown stock id {stock_id}")]
    DanglingStock { transaction_id: String, stock_id: i64 },
}
