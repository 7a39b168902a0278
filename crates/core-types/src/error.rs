use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Missing required field(s) for a new record: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}
