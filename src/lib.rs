//! meterbill - Price token usage events and roll them up into billing periods
//!
//! This library provides functionality to:
//! - Load usage events from JSONL files
//! - Price events against a model pricing catalog, in exact decimal cents
//! - Aggregate costs into daily, weekly, or monthly billing periods
//! - Generate reports in table and JSON formats
//!
//! The pure building blocks (periods, cost computation) live in the
//! `meterbill-core` and `meterbill-pricing` crates; this crate wires them to
//! files, filters and the command line.
//!
//! # Examples
//!
//! ```no_run
//! use meterbill::{
//!     aggregation::Aggregator,
//!     data_loader::DataLoader,
//!     filters::UsageFilter,
//!     repository::MemoryBillingStore,
//!     types::PeriodKind,
//! };
//! use meterbill_pricing::{CostCalculator, PricingCatalog};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> meterbill::Result<()> {
//!     // Initialize components
//!     let catalog = Arc::new(PricingCatalog::load("pricing.json").await?);
//!     let cost_calculator = Arc::new(CostCalculator::new(catalog));
//!     let aggregator = Aggregator::new(cost_calculator, PeriodKind::Daily);
//!
//!     // Load, aggregate, and store
//!     let data_loader = DataLoader::new()?;
//!     let store = MemoryBillingStore::new();
//!     let records = aggregator
//!         .run(&data_loader, UsageFilter::new(), &store)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod aggregation;
pub mod cli;
pub mod data_loader;
pub mod error;
pub mod filters;
pub mod output;
pub mod repository;
pub mod types;

// Re-export commonly used types
pub use error::{MeterbillError, Result};
pub use types::{BillingPeriod, CalendarPeriod, CostResult, ModelName, PeriodKind, UsageEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
