//! Query layer over a capture store.
//!
//! # Data Flow
//! ```text
//! count / get / delete
//!     → load every capture (id order)
//!     → apply filters in the order added (all must pass)
//!     → sort, unless sorting is switched off
//!     → apply the first/last slice
//! ```
//!
//! # Design Decisions
//! - A query holds no results; every terminal call re-reads the store, so
//!   captures that arrive between two calls are visible
//! - Slicing happens after filtering: `first(n)` is the first n matches
//! - Sort order is a tagged option, never an overloaded "no comparator"

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::capture::{Capture, CaptureStore, StoreError};
use crate::error::WebhookError;
use crate::resilience::{TimedLoop, TimedLoopError};

type Predicate = Arc<dyn Fn(&Capture) -> bool + Send + Sync>;
type Comparator = Arc<dyn Fn(&Capture, &Capture) -> Ordering + Send + Sync>;

/// How a materialized query orders its captures.
#[derive(Clone, Default)]
pub enum SortOrder {
    /// Keep store order (ascending capture id).
    #[default]
    Unsorted,
    /// Ascending receipt time; ties keep store order.
    Chronological,
    Custom(Comparator),
}

impl fmt::Debug for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Unsorted => f.write_str("Unsorted"),
            SortOrder::Chronological => f.write_str("Chronological"),
            SortOrder::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Which part of the filtered, sorted sequence is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Slice {
    #[default]
    All,
    First(usize),
    Last(usize),
}

impl Slice {
    /// Apply the slice; bounds past the end are clamped.
    pub fn apply<T>(self, mut items: Vec<T>) -> Vec<T> {
        match self {
            Slice::All => items,
            Slice::First(n) => {
                items.truncate(n);
                items
            }
            Slice::Last(n) => {
                let skip = items.len().saturating_sub(n);
                items.split_off(skip)
            }
        }
    }
}

/// Compare two captures by receipt time.
pub fn chronologically(a: &Capture, b: &Capture) -> Ordering {
    a.received_at_seconds().cmp(&b.received_at_seconds())
}

/// A reusable description of which captures to look at.
#[derive(Clone)]
pub struct Query {
    store: CaptureStore,
    filters: Vec<Predicate>,
    sort: SortOrder,
    slice: Slice,
    poll: TimedLoop,
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("dir", &self.store.dir())
            .field("filters", &self.filters.len())
            .field("sort", &self.sort)
            .field("slice", &self.slice)
            .finish()
    }
}

impl Query {
    pub fn new(store: CaptureStore) -> Self {
        Self {
            store,
            filters: Vec::new(),
            sort: SortOrder::Unsorted,
            slice: Slice::All,
            poll: TimedLoop::new(),
        }
    }

    /// Use `poll` for its interval when waiting for requests.
    pub fn with_poll(mut self, poll: TimedLoop) -> Self {
        self.poll = poll;
        self
    }

    /// Keep only captures matching `predicate`, in addition to earlier filters.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Capture) -> bool + Send + Sync + 'static,
    {
        self.filters.push(Arc::new(predicate));
        self
    }

    /// Keep captures with the given HTTP method (case-insensitive).
    pub fn method(self, method: &str) -> Self {
        let method = method.to_string();
        self.filter(move |c| c.method().eq_ignore_ascii_case(&method))
    }

    /// Keep captures whose path equals `path`, with or without a leading slash.
    pub fn path(self, path: &str) -> Self {
        let path = format!("/{}", path.trim_start_matches('/'));
        self.filter(move |c| c.path() == path)
    }

    /// Keep captures carrying header `name` with exactly `value`.
    pub fn header(self, name: &str, value: &str) -> Self {
        let (name, value) = (name.to_string(), value.to_string());
        self.filter(move |c| {
            c.header_entries()
                .iter()
                .any(|h| h.name.eq_ignore_ascii_case(&name) && h.value == value.as_bytes())
        })
    }

    /// Keep captures whose body contains `needle`.
    pub fn body_contains(self, needle: impl Into<Vec<u8>>) -> Self {
        let needle = needle.into();
        self.filter(move |c| {
            needle.is_empty() || c.body().windows(needle.len()).any(|w| w == needle.as_slice())
        })
    }

    /// Sort by receipt time.
    pub fn sort(mut self) -> Self {
        self.sort = SortOrder::Chronological;
        self
    }

    /// Sort with a custom comparator. The sort is stable.
    pub fn sort_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&Capture, &Capture) -> Ordering + Send + Sync + 'static,
    {
        self.sort = SortOrder::Custom(Arc::new(compare));
        self
    }

    /// Switch sorting off again, keeping store order.
    pub fn unsorted(mut self) -> Self {
        self.sort = SortOrder::Unsorted;
        self
    }

    /// Limit the result to the first `n` captures. Replaces any earlier slice.
    pub fn first(mut self, n: usize) -> Self {
        self.slice = Slice::First(n);
        self
    }

    /// Limit the result to the last `n` captures. Replaces any earlier slice.
    pub fn last(mut self, n: usize) -> Self {
        self.slice = Slice::Last(n);
        self
    }

    pub fn first_one(self) -> Self {
        self.first(1)
    }

    pub fn last_one(self) -> Self {
        self.last(1)
    }

    pub fn sort_order(&self) -> &SortOrder {
        &self.sort
    }

    pub fn slice(&self) -> Slice {
        self.slice
    }

    /// Run load → filter → sort → slice against the current store contents.
    async fn materialize(&self) -> Result<Vec<Capture>, StoreError> {
        let mut captures: Vec<Capture> = self.store.list_all().await?.into_values().collect();

        for filter in &self.filters {
            captures.retain(|c| filter(c));
        }

        match &self.sort {
            SortOrder::Unsorted => {}
            SortOrder::Chronological => captures.sort_by(chronologically),
            SortOrder::Custom(compare) => captures.sort_by(|a, b| compare(a, b)),
        }

        Ok(self.slice.apply(captures))
    }

    /// Number of captures currently matching.
    pub async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.materialize().await?.len())
    }

    /// The matching captures, in final order.
    pub async fn get(&self) -> Result<Vec<Capture>, StoreError> {
        self.materialize().await
    }

    /// Delete exactly the captures currently matching. Returns how many were
    /// removed; records already gone are not counted.
    pub async fn delete(&self) -> Result<usize, StoreError> {
        let matching = self.materialize().await?;
        tracing::debug!(
            dir = %self.store.dir().display(),
            matching = matching.len(),
            "Deleting captures matching the current query"
        );

        let mut removed = 0;
        for capture in &matching {
            if self.store.delete(capture.id()).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Block until at least `amount` captures match, or fail with a loop
    /// timeout after `max_seconds`.
    pub async fn wait_for_matching_requests(
        &self,
        amount: usize,
        max_seconds: u64,
    ) -> Result<&Self, WebhookError> {
        tracing::debug!(amount, max_seconds, "Waiting for matching requests");

        let poll = self.poll.for_maximum_seconds(max_seconds);
        poll.try_run(false, move || async move {
            Ok::<_, StoreError>(self.count().await? >= amount)
        })
        .await
        .map_err(|e| match e {
            TimedLoopError::Timeout(timeout) => WebhookError::LoopTimeout(timeout),
            TimedLoopError::Check(store) => WebhookError::Store(store),
        })?;

        Ok(self)
    }
}
