//! Common test utilities and helpers for meterbill tests
//!
//! This module provides reusable builders and fixture writers so that
//! integration tests can describe usage data compactly.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use meterbill::types::{ModelName, ModelPricing, UsageEvent};
use meterbill_pricing::{CostCalculator, PricingCatalog};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Common test models used across tests
pub const TEST_MODELS: &[&str] = &["gpt-4o", "flash-lite", "claude-haiku"];

/// Pricing catalog JSON matching [`test_catalog`]
pub const PRICING_JSON: &str = r#"{
    "gpt-4o": { "input_token_price": "0.03", "output_token_price": "0.06" },
    "flash-lite": { "input_token_price": "0.0000001", "output_token_price": "0.0000004" },
    "claude-haiku": { "input_token_price": 0.1, "output_token_price": 0.5 }
}"#;

/// Parse a decimal literal
pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Catalog with pricing for every model in [`TEST_MODELS`]
pub fn test_catalog() -> PricingCatalog {
    PricingCatalog::from_json_str(PRICING_JSON).unwrap()
}

/// Cost calculator over [`test_catalog`]
pub fn test_calculator() -> Arc<CostCalculator> {
    Arc::new(CostCalculator::new(Arc::new(test_catalog())))
}

/// Pricing with both prices given as decimal literals
pub fn pricing(input: &str, output: &str) -> ModelPricing {
    ModelPricing::new(dec(input), dec(output))
}

/// UTC instant helper
pub fn utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap()
}

/// Builder for creating test UsageEvent instances
pub struct UsageEventBuilder {
    id: String,
    model: String,
    timestamp: DateTime<Utc>,
    user_id: Option<String>,
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
}

impl Default for UsageEventBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageEventBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            id: "evt-test".to_string(),
            model: TEST_MODELS[0].to_string(),
            timestamp: utc(2025, 1, 15, 10, 30),
            user_id: None,
            input_tokens: Some(100),
            output_tokens: Some(50),
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn with_timestamp(mut self, ts: DateTime<Utc>) -> Self {
        self.timestamp = ts;
        self
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.user_id = Some(user.to_string());
        self
    }

    pub fn with_tokens(mut self, input: Option<u64>, output: Option<u64>) -> Self {
        self.input_tokens = input;
        self.output_tokens = output;
        self
    }

    pub fn build(self) -> UsageEvent {
        UsageEvent {
            id: self.id,
            model: ModelName::new(self.model),
            timestamp: self.timestamp,
            user_id: self.user_id,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
        }
    }
}

/// Write events as JSONL to `dir/name`, returning the file path
pub fn write_events(dir: &Path, name: &str, events: &[UsageEvent]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }

    let contents: String = events
        .iter()
        .map(|e| serde_json::to_string(e).unwrap() + "\n")
        .collect();
    std::fs::write(&path, contents).unwrap();
    path
}

/// Write [`PRICING_JSON`] to `dir/pricing.json`
pub fn write_pricing(dir: &Path) -> PathBuf {
    let path = dir.join("pricing.json");
    std::fs::write(&path, PRICING_JSON).unwrap();
    path
}
