//! # Ledger Database Crate
//!
//! This crate is the ledger's persistence layer. Everything above it talks to the
//! `LedgerStore` trait and never to SQL directly.
//!
//! ## Architectural Principles
//!
//! - **Layer 2 Adapter:** The store trait hides whether records live in PostgreSQL or
//!   in memory. Imports, reports and exports receive the store as an injected handle.
//! - **Explicit Upserts:** The trait exposes `find_*`, `insert_*` and `update_*`
//!   separately; callers decide between create and merge-update themselves.
//! - **Cascading Ownership:** Deleting a stock deletes its investment and dividend records.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: Open the PostgreSQL pool and bring the schema up-to-date.
//! - `LedgerStore`: The persistence contract.
//! - `DbRepository`: The PostgreSQL implementation.
//! - `InMemoryStore`: A process-local implementation for tests and trial imports.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::InMemoryStore;
pub use repository::DbRepository;
pub use store::{LedgerStore, StockSummary};
