//! meterbill - Compute token usage costs and roll them up into billing periods

use meterbill::{
    aggregation::{Aggregator, Totals},
    cli::{Cli, parse_date_filter},
    data_loader::DataLoader,
    error::{MeterbillError, Result},
    filters::UsageFilter,
    output::get_formatter,
    repository::MemoryBillingStore,
};
use clap::Parser;
use meterbill_pricing::{CostCalculator, PricingCatalog};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pricing catalog location when none is given
fn default_pricing_path() -> Result<PathBuf> {
    Ok(dirs::home_dir()
        .ok_or_else(|| MeterbillError::Config("Cannot determine home directory".into()))?
        .join(".meterbill")
        .join("pricing.json"))
}

/// Build the event filter from the global CLI flags
fn build_filter(cli: &Cli) -> Result<UsageFilter> {
    let mut filter = match cli.command.period() {
        Some(period) => UsageFilter::for_period(period),
        None => UsageFilter::new(),
    };

    if let Some(since_str) = &cli.since {
        filter = filter.with_since(parse_date_filter(since_str)?);
    }
    if let Some(until_str) = &cli.until {
        filter = filter.with_until(parse_date_filter(until_str)?);
    }
    if let (Some(since), Some(until)) = (filter.since_date, filter.until_date) {
        if since > until {
            return Err(MeterbillError::InvalidArgument(format!(
                "--since {since} is after --until {until}"
            )));
        }
    }
    if let Some(model) = &cli.model {
        filter = filter.with_model(model.clone());
    }
    if let Some(user) = &cli.user {
        filter = filter.with_user(user.clone());
    }

    Ok(filter)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Quiet unless asked; --verbose overrides RUST_LOG
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("meterbill=info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let period_kind = cli.command.period_kind();
    let report_args = cli.command.report_args().clone();
    info!("Running {} billing report", period_kind);

    let pricing_path = match &cli.pricing {
        Some(path) => path.clone(),
        None => default_pricing_path()?,
    };
    let catalog = Arc::new(PricingCatalog::load(&pricing_path).await?);
    let cost_calculator = Arc::new(CostCalculator::new(catalog));

    let data_loader = match &cli.data {
        Some(path) => DataLoader::from_path(path),
        None => DataLoader::new()?,
    };
    info!("Reading usage data from {}", data_loader.data_path().display());

    let show_progress = !cli.json && is_terminal::is_terminal(std::io::stdout());
    let aggregator = Aggregator::new(cost_calculator, period_kind)
        .with_progress(show_progress)
        .with_skip_unpriced(report_args.skip_unpriced)
        .with_by_user(report_args.by_user);

    let filter = build_filter(&cli)?;
    let store = MemoryBillingStore::new();
    let records = aggregator.run(&data_loader, filter, &store).await?;

    let totals = Totals::from_records(&records)?;
    let formatter = get_formatter(cli.json);
    println!("{}", formatter.format_records(&records, &totals)?);

    Ok(())
}
