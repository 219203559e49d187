//! Core types, billing periods, and error handling for meterbill
//!
//! This crate provides the foundational values shared by every other
//! meterbill crate: usage events, model pricing, cost results, the billing
//! period family and the common error type. Nothing in here performs I/O.

pub mod error;
pub mod period;
pub mod types;

// Re-export commonly used types
pub use error::{MeterbillError, Result};
pub use period::{BillingPeriod, CalendarPeriod, DailyPeriod, MonthlyPeriod, PeriodKind, WeeklyPeriod};
pub use types::{CostResult, ModelName, ModelPricing, UsageEvent};
