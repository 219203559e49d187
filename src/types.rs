//! Domain types for meterbill
//!
//! Usage events, pricing, cost results and billing periods, re-exported
//! from `meterbill-core` so callers only need this crate.

pub use meterbill_core::period::{
    BillingPeriod, CalendarPeriod, DailyPeriod, MonthlyPeriod, PeriodKind, WeeklyPeriod,
};
pub use meterbill_core::types::{CostResult, ModelName, ModelPricing, UsageEvent};
