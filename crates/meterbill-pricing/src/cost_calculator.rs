//! Cost calculator module for computing usage costs
//!
//! Converts one usage event and one pricing schedule into a cost breakdown
//! in cents. The computation is pure decimal arithmetic:
//!
//! - input cost  = input tokens  x input price  x 100, or 0 when absent
//! - output cost = output tokens x output price x 100, or 0 when absent
//! - total       = input cost + output cost
//!
//! # Examples
//!
//! ```
//! use meterbill_core::types::{ModelName, ModelPricing, UsageEvent};
//! use meterbill_pricing::{CostCalculator, PricingCatalog};
//! use chrono::Utc;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! let pricing = ModelPricing::new(Decimal::new(1, 7), Decimal::new(4, 7));
//! let event = UsageEvent::new("evt-1", ModelName::new("gemini-2.5-flash-lite"), Utc::now())
//!     .with_input_tokens(38);
//!
//! // Pure computation with pricing already at hand
//! let cost = CostCalculator::compute_cost(&event, &pricing);
//! assert_eq!(cost.total_cost_cents().to_string(), "0.00038");
//!
//! // Catalog-backed lookup by the event's model
//! let catalog = PricingCatalog::new().with_model(ModelName::new("gemini-2.5-flash-lite"), pricing);
//! let calculator = CostCalculator::new(Arc::new(catalog));
//! assert_eq!(calculator.cost_for_event(&event).unwrap(), cost);
//! ```

use crate::pricing_catalog::PricingCatalog;
use meterbill_core::error::{MeterbillError, Result};
use meterbill_core::types::{CostResult, ModelPricing, UsageEvent};
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Prices are per major currency unit, costs are reported in cents
const CENTS_PER_UNIT: Decimal = Decimal::ONE_HUNDRED;

fn token_cost_cents(tokens: Option<u64>, price: Decimal) -> Decimal {
    match tokens {
        Some(tokens) => Decimal::from(tokens) * price * CENTS_PER_UNIT,
        None => Decimal::ZERO,
    }
}

fn checked_token_cost_cents(tokens: Option<u64>, price: Decimal) -> Option<Decimal> {
    match tokens {
        Some(tokens) => Decimal::from(tokens)
            .checked_mul(price)?
            .checked_mul(CENTS_PER_UNIT),
        None => Some(Decimal::ZERO),
    }
}

/// Calculates costs based on token usage and pricing
pub struct CostCalculator {
    /// Pricing used when looking up an event's model
    catalog: Arc<PricingCatalog>,
}

impl CostCalculator {
    /// Create a new CostCalculator backed by a pricing catalog
    pub fn new(catalog: Arc<PricingCatalog>) -> Self {
        Self { catalog }
    }

    /// The catalog this calculator prices against
    pub fn catalog(&self) -> &PricingCatalog {
        &self.catalog
    }

    /// Compute the cost of one event under one pricing schedule
    ///
    /// Total over its domain: absent token counts contribute exactly zero
    /// and zero prices give zero costs. Sub-cent fractions are kept as is.
    ///
    /// # Panics
    ///
    /// Panics on `Decimal` overflow, which cannot happen for prices that
    /// pass [`ModelPricing::validate`]. Use [`CostCalculator::checked_cost`]
    /// for pricing that was never validated.
    pub fn compute_cost(event: &UsageEvent, pricing: &ModelPricing) -> CostResult {
        CostResult::new(
            token_cost_cents(event.input_tokens, pricing.input_token_price),
            token_cost_cents(event.output_tokens, pricing.output_token_price),
        )
    }

    /// Compute the cost of one event, reporting overflow instead of panicking
    ///
    /// # Errors
    ///
    /// Returns `MeterbillError::Overflow` if a component or the total does
    /// not fit in a `Decimal`.
    pub fn checked_cost(event: &UsageEvent, pricing: &ModelPricing) -> Result<CostResult> {
        let overflow = || {
            MeterbillError::Overflow(format!(
                "cost of event {} under {} pricing",
                event.id, event.model
            ))
        };

        let input = checked_token_cost_cents(event.input_tokens, pricing.input_token_price)
            .ok_or_else(overflow)?;
        let output = checked_token_cost_cents(event.output_tokens, pricing.output_token_price)
            .ok_or_else(overflow)?;
        input.checked_add(output).ok_or_else(overflow)?;

        Ok(CostResult::new(input, output))
    }

    /// Compute costs for many events under one pricing schedule in parallel
    ///
    /// Results are in the same order as `events`.
    pub fn compute_batch(events: &[UsageEvent], pricing: &ModelPricing) -> Vec<CostResult> {
        events
            .par_iter()
            .map(|event| Self::compute_cost(event, pricing))
            .collect()
    }

    /// Compute the cost of an event using its model's catalog pricing
    ///
    /// # Errors
    ///
    /// Returns `MeterbillError::UnknownModel` if the catalog has no pricing
    /// for the event's model, or `MeterbillError::Overflow` if the cost does
    /// not fit in a `Decimal`.
    pub fn cost_for_event(&self, event: &UsageEvent) -> Result<CostResult> {
        let pricing = self
            .catalog
            .get(&event.model)
            .ok_or_else(|| MeterbillError::UnknownModel(event.model.clone()))?;

        Self::checked_cost(event, pricing)
    }

    /// Catalog-priced costs for many events, computed in parallel
    ///
    /// # Errors
    ///
    /// Fails on the first event whose model has no pricing.
    pub fn costs_for_events(&self, events: &[UsageEvent]) -> Result<Vec<CostResult>> {
        events
            .par_iter()
            .map(|event| self.cost_for_event(event))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use meterbill_core::types::ModelName;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn event(input: Option<u64>, output: Option<u64>) -> UsageEvent {
        UsageEvent {
            id: "evt".to_string(),
            model: ModelName::new("test-model"),
            timestamp: Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap(),
            user_id: None,
            input_tokens: input,
            output_tokens: output,
        }
    }

    fn pricing(input: &str, output: &str) -> ModelPricing {
        ModelPricing::new(dec(input), dec(output))
    }

    #[test]
    fn test_cost_calculation_reference_cases() {
        let cases = [
            (
                "basic cost calculation",
                event(Some(1000), Some(500)),
                pricing("0.001", "0.002"),
                ("100", "100", "200"),
            ),
            (
                "free model pricing",
                event(Some(1000), Some(500)),
                pricing("0", "0"),
                ("0", "0", "0"),
            ),
            (
                "missing input tokens",
                event(None, Some(500)),
                pricing("0.001", "0.002"),
                ("0", "100", "100"),
            ),
            (
                "missing output tokens",
                event(Some(1000), None),
                pricing("0.001", "0.002"),
                ("100", "0", "100"),
            ),
            (
                "high precision pricing",
                event(Some(1), Some(1)),
                pricing("0.00001", "0.00001"),
                ("0.001", "0.001", "0.002"),
            ),
            (
                "large token counts",
                event(Some(100_000), Some(50_000)),
                pricing("0.03", "0.06"),
                ("300000", "300000", "600000"),
            ),
            (
                "tiny per-token price",
                event(Some(38), None),
                pricing("0.0000001", "0.0000004"),
                ("0.00038", "0", "0.00038"),
            ),
        ];

        for (name, event, pricing, (input, output, total)) in cases {
            let cost = CostCalculator::compute_cost(&event, &pricing);
            assert_eq!(cost.input_cost_cents(), dec(input), "{name}: input cost mismatch");
            assert_eq!(cost.output_cost_cents(), dec(output), "{name}: output cost mismatch");
            assert_eq!(cost.total_cost_cents(), dec(total), "{name}: total cost mismatch");
        }
    }

    #[test]
    fn test_all_tokens_absent_is_zero() {
        let cost = CostCalculator::compute_cost(&event(None, None), &pricing("0.5", "0.75"));
        assert!(cost.is_zero());
        assert_eq!(cost, CostResult::zero());
    }

    #[test]
    fn test_zero_tokens_is_zero_cost() {
        let cost = CostCalculator::compute_cost(&event(Some(0), Some(0)), &pricing("0.5", "0.75"));
        assert!(cost.is_zero());
    }

    #[test]
    fn test_sub_cent_values_are_not_rounded() {
        let cost = CostCalculator::compute_cost(
            &event(Some(1), Some(1)),
            &pricing("0.0000001", "0.0000001"),
        );
        assert_eq!(cost.input_cost_cents().to_string(), "0.00001");
        assert_eq!(cost.total_cost_cents().to_string(), "0.00002");
        assert!(cost.total_cost_cents() > Decimal::ZERO);
    }

    #[test]
    fn test_compute_batch_matches_single() {
        let p = pricing("0.000003", "0.000015");
        let events: Vec<UsageEvent> = (0..100)
            .map(|i| event(Some(i * 10), if i % 3 == 0 { None } else { Some(i) }))
            .collect();

        let batch = CostCalculator::compute_batch(&events, &p);
        assert_eq!(batch.len(), events.len());
        for (event, cost) in events.iter().zip(&batch) {
            assert_eq!(*cost, CostCalculator::compute_cost(event, &p));
        }
    }

    #[test]
    fn test_max_tokens_at_max_price_does_not_overflow() {
        let max = ModelPricing::new(ModelPricing::MAX_TOKEN_PRICE, ModelPricing::MAX_TOKEN_PRICE);
        let event = event(Some(u64::MAX), Some(u64::MAX));

        let cost = CostCalculator::compute_cost(&event, &max);
        assert_eq!(cost.input_cost_cents(), dec("7378697629483820646000000000"));
        assert_eq!(cost.output_cost_cents(), dec("7378697629483820646000000000"));
        assert_eq!(cost.total_cost_cents(), dec("14757395258967641292000000000"));
        assert_eq!(CostCalculator::checked_cost(&event, &max).unwrap(), cost);
    }

    #[test]
    fn test_checked_cost_reports_overflow() {
        let event = event(Some(u64::MAX), None);
        let result = CostCalculator::checked_cost(&event, &pricing("10000000000", "0"));
        assert!(matches!(result, Err(MeterbillError::Overflow(_))));

        // Unvalidated catalog pricing surfaces as an error, not a panic
        let catalog = PricingCatalog::new()
            .with_model(ModelName::new("test-model"), pricing("10000000000", "0"));
        let calculator = CostCalculator::new(Arc::new(catalog));
        assert!(matches!(
            calculator.cost_for_event(&event),
            Err(MeterbillError::Overflow(_))
        ));
        assert!(calculator.costs_for_events(&[event]).is_err());
    }

    #[test]
    fn test_cost_for_event_uses_catalog() {
        let catalog = PricingCatalog::new()
            .with_model(ModelName::new("test-model"), pricing("0.001", "0.002"));
        let calculator = CostCalculator::new(Arc::new(catalog));

        let cost = calculator
            .cost_for_event(&event(Some(1000), Some(500)))
            .unwrap();
        assert_eq!(cost.total_cost_cents(), dec("200"));
    }

    #[test]
    fn test_cost_for_event_unknown_model() {
        let calculator = CostCalculator::new(Arc::new(PricingCatalog::new()));

        let result = calculator.cost_for_event(&event(Some(1), Some(1)));
        match result {
            Err(MeterbillError::UnknownModel(model)) => assert_eq!(model.as_str(), "test-model"),
            other => panic!("expected UnknownModel, got {other:?}"),
        }

        assert!(
            calculator
                .costs_for_events(&[event(Some(1), None)])
                .is_err()
        );
    }
}
