//! # DLM Common Library
//!
//! Shared code for the data-labeling marketplace services:
//! - Common error type
//! - Configuration loading and root folder resolution
//! - SQLite database initialization and schema
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
