//! Statistics aggregation over stored patterns.
//!
//! [`StatisticsAggregator`] is updated incrementally on every write and
//! rebuilt from the catalog on load. Counts are always derived from what the
//! catalog holds; only embedding timings are carried in the snapshot header,
//! since they cannot be recomputed.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use serde::Serialize;

use crate::catalog::PatternCatalog;
use crate::pattern::ActionPattern;

/// Aggregate statistics for a store.
///
/// `action_types` counts always sum to `total_actions`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Statistics {
    /// Number of stored patterns.
    pub total_actions: u64,

    /// Fraction of patterns with `success == Some(true)`; 0 on an empty store.
    pub success_rate: f64,

    /// Pattern count per action label.
    pub action_types: BTreeMap<String, u64>,

    /// Mean wall-clock cost of the embedding step, in milliseconds.
    pub average_embedding_time_ms: f64,
}

/// A group of patterns sharing the same `(action, selector)` pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TopPattern {
    /// Action label of the group.
    pub action: String,

    /// Selector of the group; `None` groups patterns without a selector.
    pub selector: Option<String>,

    /// Number of patterns in the group.
    pub count: u64,

    /// Number of patterns in the group with a successful outcome.
    pub success_count: u64,
}

impl TopPattern {
    /// Success fraction within the group.
    pub fn success_rate(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.success_count as f64 / self.count as f64
        }
    }
}

/// Running counters behind [`Statistics`] and top-pattern queries.
#[derive(Clone, Debug, Default)]
pub struct StatisticsAggregator {
    total: u64,
    successes: u64,
    action_types: BTreeMap<String, u64>,
    action_successes: HashMap<String, u64>,

    // Groups kept in first-seen order; `group_index` maps a key to its slot.
    groups: Vec<TopPattern>,
    group_index: HashMap<(String, Option<String>), usize>,

    embedding_time_total: Duration,
    embedding_samples: u64,
}

impl StatisticsAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds counters from every entry in `catalog`, in id order.
    pub fn from_catalog(catalog: &PatternCatalog) -> Self {
        let mut stats = Self::new();
        for entry in catalog.all() {
            stats.record(&entry.pattern);
        }
        stats
    }

    /// Restores persisted embedding timings.
    pub fn with_embedding_time(mut self, total: Duration, samples: u64) -> Self {
        self.embedding_time_total = total;
        self.embedding_samples = samples;
        self
    }

    /// Counts a newly stored pattern.
    pub fn record(&mut self, pattern: &ActionPattern) {
        let success = pattern.is_success();

        self.total += 1;
        *self
            .action_types
            .entry(pattern.action.clone())
            .or_insert(0) += 1;

        if success {
            self.successes += 1;
            *self
                .action_successes
                .entry(pattern.action.clone())
                .or_insert(0) += 1;
        }

        let key = (pattern.action.clone(), pattern.selector.clone());
        let slot = match self.group_index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.groups.push(TopPattern {
                    action: key.0.clone(),
                    selector: key.1.clone(),
                    count: 0,
                    success_count: 0,
                });
                let slot = self.groups.len() - 1;
                self.group_index.insert(key, slot);
                slot
            }
        };
        let group = &mut self.groups[slot];
        group.count += 1;
        if success {
            group.success_count += 1;
        }
    }

    /// Adds one embedding-time sample.
    pub fn record_embedding_time(&mut self, elapsed: Duration) {
        self.embedding_time_total += elapsed;
        self.embedding_samples += 1;
    }

    /// Total embedding time across all samples.
    pub fn embedding_time_total(&self) -> Duration {
        self.embedding_time_total
    }

    /// Number of embedding-time samples.
    pub fn embedding_samples(&self) -> u64 {
        self.embedding_samples
    }

    /// Current statistics.
    pub fn statistics(&self) -> Statistics {
        let success_rate = if self.total == 0 {
            0.0
        } else {
            self.successes as f64 / self.total as f64
        };

        let average_embedding_time_ms = if self.embedding_samples == 0 {
            0.0
        } else {
            self.embedding_time_total.as_secs_f64() * 1000.0 / self.embedding_samples as f64
        };

        Statistics {
            total_actions: self.total,
            success_rate,
            action_types: self.action_types.clone(),
            average_embedding_time_ms,
        }
    }

    /// Top `n` `(action, selector)` groups by count, ties in first-seen order.
    pub fn top_patterns(&self, n: usize) -> Vec<TopPattern> {
        let mut groups = self.groups.clone();
        // Stable sort keeps first-seen order among equal counts
        groups.sort_by(|a, b| b.count.cmp(&a.count));
        groups.truncate(n);
        groups
    }

    /// Success rate for one action label, or `None` if it was never stored.
    pub fn success_rate_for(&self, action: &str) -> Option<f64> {
        let count = *self.action_types.get(action)?;
        let successes = self.action_successes.get(action).copied().unwrap_or(0);
        Some(successes as f64 / count as f64)
    }
}
