//! Error types for meterbill
//!
//! The error enum is shared with the core crates so that failures from
//! period construction, pricing and file loading all surface as one type.
//!
//! # Example
//!
//! ```
//! use meterbill::error::{MeterbillError, Result};
//!
//! fn example_function() -> Result<()> {
//!     // io::Error converts into MeterbillError automatically
//!     let _file = std::fs::read_to_string("nonexistent.txt")?;
//!     Ok(())
//! }
//!
//! assert!(matches!(example_function(), Err(MeterbillError::Io(_))));
//! ```

pub use meterbill_core::error::{MeterbillError, Result};
