//! Error types for meterbill
//!
//! This module defines the error types used throughout the meterbill crates.
//! All errors are derived from `thiserror` for convenient error handling
//! and automatic `From` implementations.
//!
//! # Example
//!
//! ```
//! use meterbill_core::error::{MeterbillError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // This will automatically convert io::Error to MeterbillError
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

use crate::types::ModelName;

/// Main error type for meterbill operations
///
/// Cost computation for validated pricing is total and never produces one
/// of these. The core reports invalid billing periods and invalid pricing;
/// the remaining variants belong to loading events and summing costs.
#[derive(Error, Debug)]
pub enum MeterbillError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// No pricing is known for the model
    #[error("Unknown model: {0}")]
    UnknownModel(ModelName),

    /// A billing period was built from impossible calendar fields
    #[error("Invalid billing period: {0}")]
    InvalidPeriod(String),

    /// A model price is negative or too large to compute costs with
    #[error("Invalid pricing: {0}")]
    InvalidPricing(String),

    /// A cost or token sum does not fit its numeric type
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// Invalid date format
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Parse error with file context
    #[error("Parse error in {file}: {error}")]
    Parse {
        /// The file that caused the error
        file: PathBuf,
        /// The error message
        error: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience type alias for Results in meterbill
///
/// # Example
///
/// ```
/// use meterbill_core::Result;
///
/// fn process_data() -> Result<String> {
///     Ok("Processed successfully".to_string())
/// }
/// ```
pub type Result<T> = std::result::Result<T, MeterbillError>;
