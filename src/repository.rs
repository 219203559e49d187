//! Sources of usage events and sinks for billing records
//!
//! The aggregation pipeline reads events through [`UsageEventSource`] and
//! hands finished records to a [`BillingRecordSink`]. Storage-backed
//! implementations live with whatever owns the storage; this module ships
//! the in-memory ones.

use crate::aggregation::BillingRecord;
use crate::error::Result;
use crate::types::UsageEvent;
use async_trait::async_trait;
use futures::stream::Stream;
use std::collections::BTreeMap;
use std::pin::Pin;
use tokio::sync::RwLock;
use tracing::debug;

/// Boxed stream of usage events
pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<UsageEvent>> + Send + 'a>>;

/// Anything that can stream usage events
pub trait UsageEventSource: Send + Sync {
    /// Stream every event the source holds
    fn load_events(&self) -> EventStream<'_>;
}

/// Anything that accepts aggregated billing records
#[async_trait]
pub trait BillingRecordSink: Send + Sync {
    /// Persist records, replacing earlier records with the same key
    async fn store(&self, records: &[BillingRecord]) -> Result<()>;
}

/// Vec-backed event source
#[derive(Debug, Clone, Default)]
pub struct MemoryUsageStore {
    events: Vec<UsageEvent>,
}

impl MemoryUsageStore {
    /// Create a store holding `events`
    pub fn new(events: Vec<UsageEvent>) -> Self {
        Self { events }
    }

    /// Append an event
    pub fn push(&mut self, event: UsageEvent) {
        self.events.push(event);
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl UsageEventSource for MemoryUsageStore {
    fn load_events(&self) -> EventStream<'_> {
        let events: Vec<Result<UsageEvent>> = self.events.iter().cloned().map(Ok).collect();
        Box::pin(futures::stream::iter(events))
    }
}

/// Billing record store kept in memory, keyed by record key
#[derive(Debug, Default)]
pub struct MemoryBillingStore {
    records: RwLock<BTreeMap<String, BillingRecord>>,
}

impl MemoryBillingStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// All stored records, sorted by key
    pub async fn records(&self) -> Vec<BillingRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Record stored under `key`, if any
    pub async fn get(&self, key: &str) -> Option<BillingRecord> {
        self.records.read().await.get(key).cloned()
    }
}

#[async_trait]
impl BillingRecordSink for MemoryBillingStore {
    async fn store(&self, records: &[BillingRecord]) -> Result<()> {
        let mut stored = self.records.write().await;
        for record in records {
            stored.insert(record.key(), record.clone());
        }
        debug!("Stored {} billing records ({} total)", records.len(), stored.len());
        Ok(())
    }
}
