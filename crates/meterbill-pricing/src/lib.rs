//! Pricing catalog and cost calculator for meterbill
//!
//! This crate holds per-model price schedules and turns usage events into
//! cost breakdowns in cents.

pub mod cost_calculator;
pub mod pricing_catalog;

pub use cost_calculator::CostCalculator;
pub use pricing_catalog::PricingCatalog;
