// src/lib.rs
// PostgreSQL schema and data export to a replayable SQL script.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod logging;
pub mod sql;

pub use db::accessors::{ConnectionProvider, PostgresAccessor};
pub use db::models::{ExportMode, ExportRequest, TableDescriptor, TableSelection};
pub use error::{ExportError, Result};
pub use export::orchestrator::{ExportOptions, ExportOrchestrator, ExportOutcome, ExportSummary};
