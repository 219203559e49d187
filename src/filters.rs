//! Filtering module for usage events
//!
//! Restricts which events reach aggregation by UTC date range, model or
//! user. All filters are optional and combine with AND.
//!
//! # Examples
//!
//! ```
//! use meterbill::filters::UsageFilter;
//! use chrono::NaiveDate;
//!
//! // January 2025, alice only
//! let filter = UsageFilter::new()
//!     .with_since(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
//!     .with_until(NaiveDate::from_ymd_opt(2025, 1, 31).unwrap())
//!     .with_user("alice".to_string());
//! ```

use crate::error::Result;
use crate::types::{BillingPeriod, CalendarPeriod, UsageEvent};
use chrono::{DateTime, NaiveDate, Utc};
use futures::{Stream, StreamExt};

/// Filter configuration for usage events
#[derive(Debug, Default, Clone)]
pub struct UsageFilter {
    /// Start date filter (inclusive, UTC)
    pub since_date: Option<NaiveDate>,
    /// End date filter (inclusive, UTC)
    pub until_date: Option<NaiveDate>,
    /// Only events within this instant range (inclusive on both ends)
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Model name filter
    pub model: Option<String>,
    /// User filter
    pub user: Option<String>,
}

impl UsageFilter {
    /// Create a new filter with no restrictions
    pub fn new() -> Self {
        Self::default()
    }

    /// Only events inside `period`
    pub fn for_period(period: &BillingPeriod) -> Self {
        Self {
            time_range: Some(period.time_range()),
            ..Self::default()
        }
    }

    /// Set the start date filter
    pub fn with_since(mut self, date: NaiveDate) -> Self {
        self.since_date = Some(date);
        self
    }

    /// Set the end date filter
    pub fn with_until(mut self, date: NaiveDate) -> Self {
        self.until_date = Some(date);
        self
    }

    /// Set the model filter
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Set the user filter
    pub fn with_user(mut self, user: String) -> Self {
        self.user = Some(user);
        self
    }

    /// Check if an event passes the filter
    pub fn matches(&self, event: &UsageEvent) -> bool {
        let event_date = event.timestamp.date_naive();

        if let Some(since) = &self.since_date {
            if &event_date < since {
                return false;
            }
        }

        if let Some(until) = &self.until_date {
            if &event_date > until {
                return false;
            }
        }

        if let Some((start, end)) = &self.time_range {
            if event.timestamp < *start || event.timestamp > *end {
                return false;
            }
        }

        if let Some(model) = &self.model {
            if event.model.as_str() != model {
                return false;
            }
        }

        // An event without a user never matches a user filter
        if let Some(user) = &self.user {
            if event.user_id.as_deref() != Some(user.as_str()) {
                return false;
            }
        }

        true
    }

    /// Filter a stream of events
    ///
    /// Errors from the underlying stream pass through untouched.
    pub fn filter_stream<S>(self, stream: S) -> impl Stream<Item = Result<UsageEvent>>
    where
        S: Stream<Item = Result<UsageEvent>>,
    {
        stream.filter(move |result| {
            let keep = match result {
                Ok(event) => self.matches(event),
                Err(_) => true,
            };
            futures::future::ready(keep)
        })
    }
}
