//! CLI interface for meterbill
//!
//! This module defines the command-line interface using clap. Global flags
//! select inputs, filters and the output format; the subcommand picks the
//! billing period kind to report on.
//!
//! # Example
//!
//! ```bash
//! # Daily costs for January 2025
//! meterbill --since 2025-01-01 --until 2025-01-31 daily
//!
//! # Monthly costs split per user, as JSON
//! meterbill --json monthly --by-user
//!
//! # A single ISO week
//! meterbill period weekly-2025-W03
//! ```

use crate::data_loader::DATA_PATH_ENV;
use crate::error::{MeterbillError, Result};
use crate::types::{BillingPeriod, PeriodKind};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable naming the pricing catalog file
pub const PRICING_PATH_ENV: &str = "METERBILL_PRICING";

/// Compute token usage costs and roll them up into billing periods
#[derive(Parser, Debug, Clone)]
#[command(name = "meterbill")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational output (default is quiet mode with only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Pricing catalog file (defaults to ~/.meterbill/pricing.json)
    #[arg(long, env = PRICING_PATH_ENV, global = true)]
    pub pricing: Option<PathBuf>,

    /// Usage data file or directory (defaults to ~/.meterbill/usage)
    #[arg(long, env = DATA_PATH_ENV, global = true)]
    pub data: Option<PathBuf>,

    /// Filter by start date (YYYY-MM-DD, inclusive)
    #[arg(long, global = true)]
    pub since: Option<String>,

    /// Filter by end date (YYYY-MM-DD, inclusive)
    #[arg(long, global = true)]
    pub until: Option<String>,

    /// Only include events for this model
    #[arg(long, short = 'm', global = true)]
    pub model: Option<String>,

    /// Only include events for this user
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by every report
#[derive(Args, Debug, Clone, Default)]
pub struct ReportArgs {
    /// Split each period per user
    #[arg(long)]
    pub by_user: bool,

    /// Skip events whose model has no pricing instead of failing
    #[arg(long)]
    pub skip_unpriced: bool,
}

/// Available reports
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show costs per UTC day
    Daily(ReportArgs),

    /// Show costs per ISO week
    Weekly(ReportArgs),

    /// Show costs per calendar month
    Monthly(ReportArgs),

    /// Show costs for a single period
    Period {
        /// Period key, e.g. daily-2025-01-15, weekly-2025-W03, monthly-2025-01
        #[arg(value_parser = parse_period_key)]
        key: BillingPeriod,

        #[command(flatten)]
        args: ReportArgs,
    },
}

impl Command {
    /// Kind of period the report groups by
    pub fn period_kind(&self) -> PeriodKind {
        match self {
            Command::Daily(_) => PeriodKind::Daily,
            Command::Weekly(_) => PeriodKind::Weekly,
            Command::Monthly(_) => PeriodKind::Monthly,
            Command::Period { key, .. } => key.kind(),
        }
    }

    /// Report arguments of the subcommand
    pub fn report_args(&self) -> &ReportArgs {
        match self {
            Command::Daily(args) | Command::Weekly(args) | Command::Monthly(args) => args,
            Command::Period { args, .. } => args,
        }
    }

    /// The single period requested, if any
    pub fn period(&self) -> Option<&BillingPeriod> {
        match self {
            Command::Period { key, .. } => Some(key),
            _ => None,
        }
    }
}

fn parse_period_key(key: &str) -> std::result::Result<BillingPeriod, String> {
    key.parse().map_err(|e: MeterbillError| e.to_string())
}

/// Parse date filter from string
///
/// # Examples
///
/// ```
/// use meterbill::cli::parse_date_filter;
/// use chrono::Datelike;
///
/// let date = parse_date_filter("2025-01-15").unwrap();
/// assert_eq!(date.year(), 2025);
/// assert_eq!(date.day(), 15);
///
/// assert!(parse_date_filter("2025-02-30").is_err());
/// ```
pub fn parse_date_filter(date_str: &str) -> Result<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| {
        MeterbillError::InvalidDate(format!(
            "Invalid date format '{date_str}', expected YYYY-MM-DD"
        ))
    })
}
