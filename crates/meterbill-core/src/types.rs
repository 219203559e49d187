//! Core domain types for meterbill
//!
//! This module contains the values that flow through cost computation:
//! model names, metered usage events, per-model pricing and the resulting
//! cost breakdown. Monetary amounts are `rust_decimal::Decimal` so that
//! prices as small as 1e-7 per token survive multiplication and summation
//! without drifting.

use crate::error::{MeterbillError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Strongly-typed model name wrapper
///
/// # Examples
/// ```
/// use meterbill_core::types::ModelName;
///
/// let model = ModelName::new("gemini-2.5-flash-lite");
/// assert_eq!(model.as_str(), "gemini-2.5-flash-lite");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelName(String);

impl ModelName {
    /// Create a new ModelName from any string-like type
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ModelName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One metered interaction against a priced model
///
/// Token counts are optional: `None` means no tokens of that kind were
/// recorded, which is not the same thing as a recorded zero.
///
/// # Examples
/// ```
/// use meterbill_core::types::{ModelName, UsageEvent};
/// use chrono::{TimeZone, Utc};
///
/// let event = UsageEvent::new(
///     "evt-1",
///     ModelName::new("gpt-4o"),
///     Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap(),
/// )
/// .with_input_tokens(1000)
/// .with_user("alice");
///
/// assert_eq!(event.input_tokens, Some(1000));
/// assert_eq!(event.output_tokens, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    /// Identifier assigned by the metering source
    pub id: String,
    /// Model the tokens were consumed against
    pub model: ModelName,
    /// When the interaction happened
    pub timestamp: DateTime<Utc>,
    /// User the usage is attributed to, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Input tokens, if any were recorded
    #[serde(default)]
    pub input_tokens: Option<u64>,
    /// Output tokens, if any were recorded
    #[serde(default)]
    pub output_tokens: Option<u64>,
}

impl UsageEvent {
    /// Create an event with no token counts recorded
    pub fn new(id: impl Into<String>, model: ModelName, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            model,
            timestamp,
            user_id: None,
            input_tokens: None,
            output_tokens: None,
        }
    }

    /// Set the input token count
    pub fn with_input_tokens(mut self, tokens: u64) -> Self {
        self.input_tokens = Some(tokens);
        self
    }

    /// Set the output token count
    pub fn with_output_tokens(mut self, tokens: u64) -> Self {
        self.output_tokens = Some(tokens);
        self
    }

    /// Attribute the event to a user
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Price schedule for one model
///
/// Prices are in the currency's major unit per token and may be arbitrarily
/// small. A usable price lies in `0..=MAX_TOKEN_PRICE`; within that range the
/// cost of any `u64` token count, and the sum of both components, fits in a
/// `Decimal`.
///
/// # Examples
/// ```
/// use meterbill_core::types::ModelPricing;
/// use rust_decimal::Decimal;
///
/// // $0.0000001 per input token, $0.0000004 per output token
/// let pricing = ModelPricing::new(Decimal::new(1, 7), Decimal::new(4, 7));
/// assert_eq!(pricing.input_token_price.to_string(), "0.0000001");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per input token
    pub input_token_price: Decimal,
    /// Price per output token
    pub output_token_price: Decimal,
}

impl ModelPricing {
    /// Largest accepted price per token
    ///
    /// `u64::MAX` tokens at this price, in cents, is about 7.4e27, so both
    /// components together stay below `Decimal::MAX` (about 7.9e28).
    pub const MAX_TOKEN_PRICE: Decimal = Decimal::from_parts(4_000_000, 0, 0, false, 0);

    /// Create a new pricing schedule
    pub fn new(input_token_price: Decimal, output_token_price: Decimal) -> Self {
        Self {
            input_token_price,
            output_token_price,
        }
    }

    /// Check both prices lie in `0..=MAX_TOKEN_PRICE`
    ///
    /// # Errors
    ///
    /// Returns `MeterbillError::InvalidPricing` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        for (field, price) in [
            ("input_token_price", self.input_token_price),
            ("output_token_price", self.output_token_price),
        ] {
            if price < Decimal::ZERO {
                return Err(MeterbillError::InvalidPricing(format!(
                    "{field} {price} is negative"
                )));
            }
            if price > Self::MAX_TOKEN_PRICE {
                return Err(MeterbillError::InvalidPricing(format!(
                    "{field} {price} exceeds the maximum of {}",
                    Self::MAX_TOKEN_PRICE
                )));
            }
        }
        Ok(())
    }
}

/// Cost of usage, in hundredths of the pricing currency's major unit
///
/// Values keep their sub-cent fractions. The total is always the exact sum
/// of the input and output components; the fields are private so that no
/// caller can break that.
///
/// # Examples
/// ```
/// use meterbill_core::types::CostResult;
/// use rust_decimal::Decimal;
///
/// let a = CostResult::new(Decimal::new(100, 0), Decimal::new(50, 0));
/// let b = CostResult::new(Decimal::new(38, 5), Decimal::ZERO);
/// let sum = a + b;
///
/// assert_eq!(sum.total_cost_cents(), sum.input_cost_cents() + sum.output_cost_cents());
/// assert_eq!(sum.input_cost_cents().to_string(), "100.00038");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CostResult {
    input_cost_cents: Decimal,
    output_cost_cents: Decimal,
    total_cost_cents: Decimal,
}

impl CostResult {
    /// Build a result from its two components; the total is derived
    pub fn new(input_cost_cents: Decimal, output_cost_cents: Decimal) -> Self {
        Self {
            input_cost_cents: input_cost_cents.normalize(),
            output_cost_cents: output_cost_cents.normalize(),
            total_cost_cents: (input_cost_cents + output_cost_cents).normalize(),
        }
    }

    /// A result with every component exactly zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// Cost of the input tokens in cents
    pub fn input_cost_cents(&self) -> Decimal {
        self.input_cost_cents
    }

    /// Cost of the output tokens in cents
    pub fn output_cost_cents(&self) -> Decimal {
        self.output_cost_cents
    }

    /// Total cost in cents
    pub fn total_cost_cents(&self) -> Decimal {
        self.total_cost_cents
    }

    /// Component-wise sum, or `None` if any component overflows
    pub fn checked_add(self, other: Self) -> Option<Self> {
        let input = self.input_cost_cents.checked_add(other.input_cost_cents)?;
        let output = self.output_cost_cents.checked_add(other.output_cost_cents)?;
        input.checked_add(output)?;
        Some(Self::new(input, output))
    }

    /// Whether every component is zero
    pub fn is_zero(&self) -> bool {
        self.total_cost_cents.is_zero()
            && self.input_cost_cents.is_zero()
            && self.output_cost_cents.is_zero()
    }
}

/// # Panics
///
/// Panics if a component overflows `Decimal`; use
/// [`CostResult::checked_add`] for sums of untrusted size.
impl Add for CostResult {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(
            self.input_cost_cents + other.input_cost_cents,
            self.output_cost_cents + other.output_cost_cents,
        )
    }
}

impl AddAssign for CostResult {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sum for CostResult {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, cost| acc + cost)
    }
}

impl<'a> Sum<&'a CostResult> for CostResult {
    fn sum<I: Iterator<Item = &'a CostResult>>(iter: I) -> Self {
        iter.copied().sum()
    }
}
