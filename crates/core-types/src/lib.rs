pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::TransactionType;
pub use error::CoreError;
pub use structs::{
    DividendLabel, DividendPatch, DividendRecord, InvestmentLabel, InvestmentPatch, InvestmentRecord,
    NewDividend, NewInvestment, Stock,
};
