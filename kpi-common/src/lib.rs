//! # KPI Common Library
//!
//! Shared code for the KPI evaluation service including:
//! - Persisted domain model (indicators, values, sources, execution logs)
//! - SQLite schema initialization
//! - Configuration loading
//! - Error type and timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, ErrorKind, Result};
