//! Pricing catalog
//!
//! Holds the price schedule of every known model, keyed by model name. A
//! catalog is usually loaded from a JSON document of the form
//!
//! ```json
//! {
//!   "gpt-4o": { "input_token_price": "0.0000025", "output_token_price": "0.00001" },
//!   "gemini-2.5-flash-lite": { "input_token_price": 0.0000001, "output_token_price": 0.0000004 }
//! }
//! ```
//!
//! Prices may be given as JSON strings or numbers. Strings are preferred
//! since they are read exactly.

use meterbill_core::error::{MeterbillError, Result};
use meterbill_core::types::{ModelName, ModelPricing};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Price schedules keyed by model
#[derive(Debug, Clone, Default)]
pub struct PricingCatalog {
    models: HashMap<ModelName, ModelPricing>,
}

impl PricingCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model, builder style
    pub fn with_model(mut self, model: ModelName, pricing: ModelPricing) -> Self {
        self.insert(model, pricing);
        self
    }

    /// Add or replace a model's pricing, returning the previous value
    pub fn insert(&mut self, model: ModelName, pricing: ModelPricing) -> Option<ModelPricing> {
        self.models.insert(model, pricing)
    }

    /// Pricing for a model, if known
    pub fn get(&self, model: &ModelName) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    /// Number of models in the catalog
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Whether the catalog has no models
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Model names, sorted
    pub fn models(&self) -> Vec<&ModelName> {
        let mut names: Vec<_> = self.models.keys().collect();
        names.sort();
        names
    }

    /// Parse a catalog from a JSON document
    ///
    /// # Errors
    ///
    /// Returns a JSON error for malformed documents and
    /// `MeterbillError::InvalidPricing` for a negative or oversized price.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let models: HashMap<ModelName, ModelPricing> = serde_json::from_str(json)?;
        for (model, pricing) in &models {
            pricing.validate().map_err(|e| match e {
                MeterbillError::InvalidPricing(reason) => {
                    MeterbillError::InvalidPricing(format!("{model}: {reason}"))
                }
                other => other,
            })?;
        }
        Ok(Self { models })
    }

    /// Load a catalog from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file cannot be read, or a parse error
    /// naming the file if its contents are not a valid catalog.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading pricing catalog from {}", path.display());

        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            MeterbillError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;

        let catalog = Self::from_json_str(&contents).map_err(|e| MeterbillError::Parse {
            file: PathBuf::from(path),
            error: e.to_string(),
        })?;

        info!(
            "Loaded pricing for {} models from {}",
            catalog.len(),
            path.display()
        );
        Ok(catalog)
    }
}

impl FromIterator<(ModelName, ModelPricing)> for PricingCatalog {
    fn from_iter<I: IntoIterator<Item = (ModelName, ModelPricing)>>(iter: I) -> Self {
        Self {
            models: iter.into_iter().collect(),
        }
    }
}
