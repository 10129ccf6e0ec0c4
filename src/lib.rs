pub mod analytics;
pub mod cli;
pub mod cli_handlers;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod maintenance;
pub mod market;
pub mod models;

pub use crate::core::Ledger;
pub use error::{LedgerError, Result, ValidationError};
pub use models::*;
