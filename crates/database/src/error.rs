use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Failed to load environment variables for database connection: {0}")]
    ConnectionConfigError(String),

    #[error("Database query failed: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("The requested data was not found in the database: {0}")]
    NotFound(String),

    #[error("A record with the same key already exists: {0}")]
    Conflict(String),

    #[error("Decimal overflow while summing {0}")]
    Overflow(String),
}
