//! Aggregation module for rolling usage costs up into billing periods
//!
//! Every event is priced through the [`CostCalculator`], assigned to the
//! billing period of the configured kind that contains its timestamp, and
//! accumulated into one [`BillingRecord`] per period (or per period and
//! user). Costs are summed as decimals, so a record's total is always the
//! exact sum of its input and output costs.
//!
//! # Examples
//!
//! ```no_run
//! use meterbill::{
//!     aggregation::Aggregator,
//!     data_loader::DataLoader,
//!     repository::UsageEventSource,
//!     types::PeriodKind,
//! };
//! use meterbill_pricing::{CostCalculator, PricingCatalog};
//! use std::sync::Arc;
//!
//! # async fn example() -> meterbill::Result<()> {
//! let catalog = PricingCatalog::load("pricing.json").await?;
//! let cost_calculator = Arc::new(CostCalculator::new(Arc::new(catalog)));
//! let aggregator = Aggregator::new(cost_calculator, PeriodKind::Monthly);
//!
//! let data_loader = DataLoader::new()?;
//! let monthly = aggregator.aggregate(data_loader.load_events()).await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{MeterbillError, Result};
use crate::filters::UsageFilter;
use crate::repository::{BillingRecordSink, UsageEventSource};
use crate::types::{BillingPeriod, CalendarPeriod, CostResult, ModelName, PeriodKind, UsageEvent};
use futures::stream::{Stream, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use meterbill_pricing::CostCalculator;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// User bucket for events that carry no user when grouping by user
pub const ANONYMOUS_USER: &str = "anonymous";

/// Usage and cost rolled up over one billing period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingRecord {
    /// Period the record covers
    pub period: BillingPeriod,
    /// User the record belongs to, when grouped by user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Number of events folded into the record
    pub event_count: u64,
    /// Recorded input tokens; absent counts contribute nothing
    pub input_tokens: u64,
    /// Recorded output tokens; absent counts contribute nothing
    pub output_tokens: u64,
    /// Summed cost in cents
    pub cost: CostResult,
    /// Distinct models used, sorted
    pub models_used: Vec<String>,
}

impl BillingRecord {
    /// Storage key: the period key, suffixed with the user when present
    pub fn key(&self) -> String {
        match &self.user_id {
            Some(user) => format!("{}/{}", self.period.key(), user),
            None => self.period.key(),
        }
    }
}

/// Grand totals over a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Totals {
    /// Events across all records
    pub event_count: u64,
    /// Input tokens across all records
    pub input_tokens: u64,
    /// Output tokens across all records
    pub output_tokens: u64,
    /// Summed cost in cents
    pub cost: CostResult,
}

impl Totals {
    /// Sum counts, tokens and costs over `records`
    ///
    /// # Errors
    ///
    /// Returns `MeterbillError::Overflow` if a sum does not fit its type.
    pub fn from_records(records: &[BillingRecord]) -> Result<Self> {
        let mut totals = Self::default();
        for record in records {
            totals.event_count =
                checked_sum(totals.event_count, record.event_count, "event count")?;
            totals.input_tokens =
                checked_sum(totals.input_tokens, record.input_tokens, "input tokens")?;
            totals.output_tokens =
                checked_sum(totals.output_tokens, record.output_tokens, "output tokens")?;
            totals.cost = totals
                .cost
                .checked_add(record.cost)
                .ok_or_else(|| overflow("cost"))?;
        }
        Ok(totals)
    }
}

fn overflow(what: &str) -> MeterbillError {
    MeterbillError::Overflow(format!("{what} total exceeds the representable range"))
}

fn checked_sum(total: u64, value: u64, what: &str) -> Result<u64> {
    total.checked_add(value).ok_or_else(|| overflow(what))
}

/// Accumulator for one period bucket
#[derive(Default)]
struct PeriodAccumulator {
    event_count: u64,
    input_tokens: u64,
    output_tokens: u64,
    cost: CostResult,
    models: BTreeSet<ModelName>,
}

impl PeriodAccumulator {
    fn add_event(&mut self, event: &UsageEvent, cost: CostResult) -> Result<()> {
        let input_tokens =
            checked_sum(self.input_tokens, event.input_tokens.unwrap_or(0), "input tokens")?;
        let output_tokens =
            checked_sum(self.output_tokens, event.output_tokens.unwrap_or(0), "output tokens")?;
        let cost = self.cost.checked_add(cost).ok_or_else(|| overflow("cost"))?;
        let event_count = checked_sum(self.event_count, 1, "event count")?;

        self.event_count = event_count;
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self.cost = cost;
        self.models.insert(event.model.clone());
        Ok(())
    }

    fn into_record(self, period: BillingPeriod, user_id: Option<String>) -> BillingRecord {
        BillingRecord {
            period,
            user_id,
            event_count: self.event_count,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            cost: self.cost,
            models_used: self.models.into_iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Main aggregation engine
pub struct Aggregator {
    cost_calculator: Arc<CostCalculator>,
    period_kind: PeriodKind,
    show_progress: bool,
    skip_unpriced: bool,
    by_user: bool,
}

impl Aggregator {
    /// Create an aggregator producing periods of `period_kind`
    pub fn new(cost_calculator: Arc<CostCalculator>, period_kind: PeriodKind) -> Self {
        Self {
            cost_calculator,
            period_kind,
            show_progress: false,
            skip_unpriced: false,
            by_user: false,
        }
    }

    /// Enable or disable progress spinners
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Skip events whose model has no pricing instead of failing
    pub fn with_skip_unpriced(mut self, skip_unpriced: bool) -> Self {
        self.skip_unpriced = skip_unpriced;
        self
    }

    /// Group by user as well as period in [`Aggregator::run`]
    pub fn with_by_user(mut self, by_user: bool) -> Self {
        self.by_user = by_user;
        self
    }

    /// Kind of period records are grouped into
    pub fn period_kind(&self) -> PeriodKind {
        self.period_kind
    }

    /// Aggregate events into one record per period, in period order
    pub async fn aggregate(
        &self,
        events: impl Stream<Item = Result<UsageEvent>>,
    ) -> Result<Vec<BillingRecord>> {
        self.aggregate_grouped(events, false).await
    }

    /// Aggregate events into one record per period and user
    ///
    /// Events without a user land in the [`ANONYMOUS_USER`] bucket.
    pub async fn aggregate_by_user(
        &self,
        events: impl Stream<Item = Result<UsageEvent>>,
    ) -> Result<Vec<BillingRecord>> {
        self.aggregate_grouped(events, true).await
    }

    /// Load from a source, aggregate the events passing `filter`, and store
    /// the records in a sink
    pub async fn run(
        &self,
        source: &dyn UsageEventSource,
        filter: UsageFilter,
        sink: &dyn BillingRecordSink,
    ) -> Result<Vec<BillingRecord>> {
        let events = filter.filter_stream(source.load_events());
        let records = self.aggregate_grouped(events, self.by_user).await?;

        sink.store(&records).await?;
        info!("Stored {} {} billing records", records.len(), self.period_kind);
        Ok(records)
    }

    fn progress_spinner(&self, message: &'static str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed_precise}] {pos} events processed")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Some(pb)
    }

    async fn aggregate_grouped(
        &self,
        events: impl Stream<Item = Result<UsageEvent>>,
        by_user: bool,
    ) -> Result<Vec<BillingRecord>> {
        let mut buckets: BTreeMap<(BillingPeriod, Option<String>), PeriodAccumulator> =
            BTreeMap::new();
        let progress = self.progress_spinner("Aggregating usage");

        let mut count = 0u64;
        let mut skipped = 0u64;

        tokio::pin!(events);
        while let Some(result) = events.next().await {
            let event = result?;

            let cost = match self.cost_calculator.cost_for_event(&event) {
                Ok(cost) => cost,
                Err(MeterbillError::UnknownModel(model)) if self.skip_unpriced => {
                    warn!("Skipping event {}: no pricing for model {}", event.id, model);
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let period = BillingPeriod::containing(self.period_kind, event.timestamp)?;
            let user = if by_user {
                Some(
                    event
                        .user_id
                        .clone()
                        .unwrap_or_else(|| ANONYMOUS_USER.to_string()),
                )
            } else {
                None
            };

            buckets
                .entry((period, user))
                .or_default()
                .add_event(&event, cost)?;

            count += 1;
            if let Some(ref pb) = progress {
                pb.set_position(count);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!(
                "Aggregated {} events into {} periods",
                count,
                buckets.len()
            ));
        }

        debug!(
            "Aggregated {} events into {} {} buckets ({} skipped)",
            count,
            buckets.len(),
            self.period_kind,
            skipped
        );

        Ok(buckets
            .into_iter()
            .map(|((period, user), acc)| acc.into_record(period, user))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryBillingStore, MemoryUsageStore};
    use crate::types::ModelPricing;
    use chrono::{TimeZone, Utc};
    use meterbill_pricing::PricingCatalog;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn calculator() -> Arc<CostCalculator> {
        let catalog = PricingCatalog::new()
            .with_model(
                ModelName::new("gpt-4o"),
                ModelPricing::new(dec("0.001"), dec("0.002")),
            )
            .with_model(
                ModelName::new("flash-lite"),
                ModelPricing::new(dec("0.0000001"), dec("0.0000004")),
            );
        Arc::new(CostCalculator::new(Arc::new(catalog)))
    }

    fn event(
        id: &str,
        model: &str,
        (month, day, hour): (u32, u32, u32),
        input: Option<u64>,
        output: Option<u64>,
    ) -> UsageEvent {
        UsageEvent {
            id: id.to_string(),
            model: ModelName::new(model),
            timestamp: Utc.with_ymd_and_hms(2025, month, day, hour, 0, 0).unwrap(),
            user_id: None,
            input_tokens: input,
            output_tokens: output,
        }
    }

    fn stream(events: Vec<UsageEvent>) -> impl Stream<Item = Result<UsageEvent>> {
        futures::stream::iter(events.into_iter().map(Ok))
    }

    #[test]
    fn test_period_accumulator() {
        let mut acc = PeriodAccumulator::default();
        let e1 = event("a", "gpt-4o", (1, 1, 0), Some(100), None);
        let e2 = event("b", "flash-lite", (1, 1, 1), None, Some(50));

        acc.add_event(&e1, CostResult::new(dec("10"), Decimal::ZERO)).unwrap();
        acc.add_event(&e2, CostResult::new(Decimal::ZERO, dec("0.002"))).unwrap();

        let record = acc.into_record(BillingPeriod::monthly(2025, 1).unwrap(), None);
        assert_eq!(record.event_count, 2);
        assert_eq!(record.input_tokens, 100);
        assert_eq!(record.output_tokens, 50);
        assert_eq!(record.cost.total_cost_cents(), dec("10.002"));
        assert_eq!(record.models_used, vec!["flash-lite", "gpt-4o"]);
    }

    #[tokio::test]
    async fn test_aggregate_daily() {
        let aggregator = Aggregator::new(calculator(), PeriodKind::Daily);
        let events = vec![
            event("a", "gpt-4o", (1, 15, 10), Some(1000), Some(500)),
            event("b", "gpt-4o", (1, 15, 23), None, Some(500)),
            event("c", "flash-lite", (1, 16, 0), Some(38), None),
        ];

        let records = aggregator.aggregate(stream(events)).await.unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].key(), "daily-2025-01-15");
        assert_eq!(records[0].event_count, 2);
        assert_eq!(records[0].cost.input_cost_cents(), dec("100"));
        assert_eq!(records[0].cost.output_cost_cents(), dec("200"));
        assert_eq!(records[0].cost.total_cost_cents(), dec("300"));

        assert_eq!(records[1].key(), "daily-2025-01-16");
        assert_eq!(records[1].cost.total_cost_cents(), dec("0.00038"));
        assert_eq!(records[1].models_used, vec!["flash-lite"]);
    }

    #[tokio::test]
    async fn test_aggregate_monthly_keeps_sub_cent_sums() {
        let aggregator = Aggregator::new(calculator(), PeriodKind::Monthly);
        let events: Vec<UsageEvent> = (1..=28)
            .map(|day| event(&format!("e{day}"), "flash-lite", (2, day, 12), Some(38), None))
            .collect();

        let records = aggregator.aggregate(stream(events)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key(), "monthly-2025-02");
        assert_eq!(records[0].event_count, 28);
        // 28 * 0.00038
        assert_eq!(records[0].cost.total_cost_cents(), dec("0.01064"));
    }

    #[tokio::test]
    async fn test_aggregate_by_user() {
        let aggregator = Aggregator::new(calculator(), PeriodKind::Monthly);
        let mut with_user = event("a", "gpt-4o", (1, 2, 0), Some(1000), None);
        with_user.user_id = Some("alice".to_string());
        let anonymous = event("b", "gpt-4o", (1, 3, 0), Some(1000), None);

        let records = aggregator
            .aggregate_by_user(stream(vec![with_user, anonymous]))
            .await
            .unwrap();

        let keys: Vec<String> = records.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["monthly-2025-01/alice", "monthly-2025-01/anonymous"]);
    }

    #[tokio::test]
    async fn test_unknown_model_fails_by_default() {
        let aggregator = Aggregator::new(calculator(), PeriodKind::Daily);
        let result = aggregator
            .aggregate(stream(vec![event("a", "mystery", (1, 1, 0), Some(1), None)]))
            .await;
        assert!(matches!(result, Err(MeterbillError::UnknownModel(_))));
    }

    #[tokio::test]
    async fn test_unknown_model_skipped_when_enabled() {
        let aggregator =
            Aggregator::new(calculator(), PeriodKind::Daily).with_skip_unpriced(true);
        let records = aggregator
            .aggregate(stream(vec![
                event("a", "mystery", (1, 1, 0), Some(1), None),
                event("b", "gpt-4o", (1, 1, 0), Some(1), None),
            ]))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event_count, 1);
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let aggregator = Aggregator::new(calculator(), PeriodKind::Daily);
        let items: Vec<Result<UsageEvent>> =
            vec![Err(MeterbillError::InvalidArgument("broken".to_string()))];

        let result = aggregator.aggregate(futures::stream::iter(items)).await;
        assert!(matches!(result, Err(MeterbillError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_run_stores_records() {
        let source = MemoryUsageStore::new(vec![
            event("a", "gpt-4o", (1, 31, 23), Some(1000), None),
            event("b", "gpt-4o", (2, 1, 0), Some(1000), None),
            event("c", "gpt-4o", (3, 1, 0), Some(1000), None),
        ]);
        let sink = MemoryBillingStore::new();
        let aggregator = Aggregator::new(calculator(), PeriodKind::Monthly);

        let filter = UsageFilter::new()
            .with_until(chrono::NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
        let records = aggregator.run(&source, filter, &sink).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(sink.records().await, records);
    }

    #[test]
    fn test_totals() {
        let period = BillingPeriod::monthly(2025, 1).unwrap();
        let records = vec![
            BillingRecord {
                period,
                user_id: None,
                event_count: 2,
                input_tokens: 10,
                output_tokens: 20,
                cost: CostResult::new(dec("1.5"), dec("0.00001")),
                models_used: vec![],
            },
            BillingRecord {
                period: period.next().unwrap(),
                user_id: None,
                event_count: 1,
                input_tokens: 5,
                output_tokens: 0,
                cost: CostResult::new(dec("0.5"), Decimal::ZERO),
                models_used: vec![],
            },
        ];

        let totals = Totals::from_records(&records).unwrap();
        assert_eq!(totals.event_count, 3);
        assert_eq!(totals.input_tokens, 15);
        assert_eq!(totals.output_tokens, 20);
        assert_eq!(totals.cost.total_cost_cents(), dec("2.00001"));
    }

    #[test]
    fn test_totals_overflow_is_an_error() {
        let record = BillingRecord {
            period: BillingPeriod::monthly(2025, 1).unwrap(),
            user_id: None,
            event_count: 1,
            input_tokens: 0,
            output_tokens: 0,
            cost: CostResult::new(Decimal::MAX, Decimal::ZERO),
            models_used: vec![],
        };

        let result = Totals::from_records(&[record.clone(), record]);
        assert!(matches!(result, Err(MeterbillError::Overflow(_))));
    }

    #[test]
    fn test_accumulator_rejects_token_overflow() {
        let mut acc = PeriodAccumulator::default();
        let e = event("a", "gpt-4o", (1, 1, 0), Some(u64::MAX), None);

        acc.add_event(&e, CostResult::zero()).unwrap();
        let result = acc.add_event(&e, CostResult::zero());
        assert!(matches!(result, Err(MeterbillError::Overflow(_))));
        assert_eq!(acc.event_count, 1);
        assert_eq!(acc.input_tokens, u64::MAX);
    }

    #[tokio::test]
    async fn test_aggregate_reports_overflow() {
        let catalog = PricingCatalog::new().with_model(
            ModelName::new("max-model"),
            ModelPricing::new(ModelPricing::MAX_TOKEN_PRICE, ModelPricing::MAX_TOKEN_PRICE),
        );
        let aggregator = Aggregator::new(
            Arc::new(CostCalculator::new(Arc::new(catalog))),
            PeriodKind::Monthly,
        );

        let events = vec![
            event("a", "max-model", (1, 1, 0), Some(u64::MAX), None),
            event("b", "max-model", (1, 2, 0), Some(u64::MAX), None),
        ];
        let result = aggregator.aggregate(stream(events)).await;
        assert!(matches!(result, Err(MeterbillError::Overflow(_))));
    }
}
