//! Output formatting module for meterbill
//!
//! This module provides formatters for displaying billing records:
//! - Table format for human-readable terminal output
//! - JSON format for machine-readable output
//!
//! Costs are in cents. The table rounds them to five decimal places for
//! display; JSON output carries the exact decimal values as strings.
//!
//! # Examples
//!
//! ```
//! use meterbill::output::get_formatter;
//! use meterbill::aggregation::{BillingRecord, Totals};
//! use meterbill::types::{BillingPeriod, CostResult};
//! use rust_decimal::Decimal;
//!
//! let records = vec![BillingRecord {
//!     period: BillingPeriod::monthly(2025, 1).unwrap(),
//!     user_id: None,
//!     event_count: 3,
//!     input_tokens: 1038,
//!     output_tokens: 500,
//!     cost: CostResult::new(Decimal::new(10000038, 5), Decimal::new(100, 0)),
//!     models_used: vec!["gpt-4o".to_string()],
//! }];
//! let totals = Totals::from_records(&records).unwrap();
//!
//! let table = get_formatter(false).format_records(&records, &totals).unwrap();
//! assert!(table.contains("monthly-2025-01"));
//!
//! let json = get_formatter(true).format_records(&records, &totals).unwrap();
//! assert!(json.contains("\"100.00038\""));
//! ```

use crate::aggregation::{BillingRecord, Totals};
use crate::error::Result;
use crate::types::CalendarPeriod;
use chrono::SecondsFormat;
use prettytable::{Cell, Row, Table, format, row};
use rust_decimal::Decimal;
use serde_json::json;

/// Decimal places shown for cent amounts in tables
const DISPLAY_CENT_PLACES: u32 = 5;

/// Trait for output formatters
pub trait OutputFormatter {
    /// Format billing records together with their totals
    fn format_records(&self, records: &[BillingRecord], totals: &Totals) -> Result<String>;
}

/// Table formatter for human-readable output
pub struct TableFormatter;

impl TableFormatter {
    /// Format a number with thousands separators
    fn format_number(n: u64) -> String {
        let s = n.to_string();
        let mut result = String::new();

        for (count, ch) in s.chars().rev().enumerate() {
            if count > 0 && count % 3 == 0 {
                result.push(',');
            }
            result.push(ch);
        }

        result.chars().rev().collect()
    }

    /// Format a cent amount, rounded for display only
    fn format_cents(amount: Decimal) -> String {
        format!("{}¢", amount.round_dp(DISPLAY_CENT_PLACES).normalize())
    }

    fn has_users(records: &[BillingRecord]) -> bool {
        records.iter().any(|r| r.user_id.is_some())
    }
}

impl OutputFormatter for TableFormatter {
    fn format_records(&self, records: &[BillingRecord], totals: &Totals) -> Result<String> {
        let with_users = Self::has_users(records);

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);

        let mut titles = vec![Cell::new("Period").style_spec("b")];
        if with_users {
            titles.push(Cell::new("User").style_spec("b"));
        }
        for title in [
            "Events",
            "Input",
            "Output",
            "Input Cost",
            "Output Cost",
            "Total Cost",
            "Models",
        ] {
            titles.push(Cell::new(title).style_spec("b"));
        }
        table.set_titles(Row::new(titles));

        for record in records {
            let mut cells = vec![Cell::new(&record.period.key())];
            if with_users {
                cells.push(Cell::new(record.user_id.as_deref().unwrap_or("")));
            }
            cells.extend([
                Cell::new(&Self::format_number(record.event_count)).style_spec("r"),
                Cell::new(&Self::format_number(record.input_tokens)).style_spec("r"),
                Cell::new(&Self::format_number(record.output_tokens)).style_spec("r"),
                Cell::new(&Self::format_cents(record.cost.input_cost_cents())).style_spec("r"),
                Cell::new(&Self::format_cents(record.cost.output_cost_cents())).style_spec("r"),
                Cell::new(&Self::format_cents(record.cost.total_cost_cents())).style_spec("r"),
                Cell::new(&record.models_used.join(", ")),
            ]);
            table.add_row(Row::new(cells));
        }

        let width = if with_users { 9 } else { 8 };
        table.add_row(Row::new(vec![Cell::new(""); width]));

        let mut total_row = row![b -> "TOTAL"];
        if with_users {
            total_row.add_cell(Cell::new(""));
        }
        for value in [
            Self::format_number(totals.event_count),
            Self::format_number(totals.input_tokens),
            Self::format_number(totals.output_tokens),
            Self::format_cents(totals.cost.input_cost_cents()),
            Self::format_cents(totals.cost.output_cost_cents()),
            Self::format_cents(totals.cost.total_cost_cents()),
        ] {
            total_row.add_cell(Cell::new(&value).style_spec("br"));
        }
        total_row.add_cell(Cell::new(""));
        table.add_row(total_row);

        Ok(table.to_string())
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_records(&self, records: &[BillingRecord], totals: &Totals) -> Result<String> {
        let output = json!({
            "records": records.iter().map(|r| {
                let (start, end) = r.period.time_range();
                let mut record_json = json!({
                    "period": r.period.key(),
                    "kind": r.period.kind().to_string(),
                    "start": start.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    "end": end.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    "event_count": r.event_count,
                    "tokens": {
                        "input_tokens": r.input_tokens,
                        "output_tokens": r.output_tokens,
                    },
                    "cost_cents": r.cost,
                    "models_used": r.models_used,
                });
                if let Some(user) = &r.user_id {
                    record_json["user_id"] = json!(user);
                }
                record_json
            }).collect::<Vec<_>>(),
            "totals": {
                "event_count": totals.event_count,
                "tokens": {
                    "input_tokens": totals.input_tokens,
                    "output_tokens": totals.output_tokens,
                },
                "cost_cents": totals.cost,
            }
        });

        Ok(serde_json::to_string_pretty(&output)?)
    }
}

/// Get the formatter for the requested output mode
pub fn get_formatter(json: bool) -> Box<dyn OutputFormatter> {
    if json {
        Box::new(JsonFormatter)
    } else {
        Box::new(TableFormatter)
    }
}
