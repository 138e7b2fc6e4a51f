use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

/// Message rendered by [`MetricsHistory::render`] when nothing was saved.
pub const EMPTY_HISTORY: &str = "No metrics history";

/// Execution counters for a single rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleMetrics {
    pub execution_count: u64,
    pub total_execution_time_ms: f64,
}

impl RuleMetrics {
    pub fn record(&mut self, elapsed: Duration) {
        self.execution_count += 1;
        self.total_execution_time_ms += elapsed.as_secs_f64() * 1_000.0;
    }

    /// Derived as `total / count`; zero before the first execution.
    pub fn average_execution_time_ms(&self) -> f64 {
        if self.execution_count == 0 {
            0.0
        } else {
            self.total_execution_time_ms / self.execution_count as f64
        }
    }
}

/// Per-rule metrics owned by an engine or selector. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    inner: Arc<Mutex<BTreeMap<String, RuleMetrics>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, rule_id: &str, elapsed: Duration) {
        let mut inner = self.inner.lock();
        inner.entry(rule_id.to_string()).or_default().record(elapsed);
    }

    pub fn get(&self, rule_id: &str) -> Option<RuleMetrics> {
        self.inner.lock().get(rule_id).copied()
    }

    /// Copy of every rule's counters, ordered by rule id.
    pub fn snapshot(&self) -> BTreeMap<String, RuleMetrics> {
        self.inner.lock().clone()
    }

    pub fn total_evaluations(&self) -> u64 {
        self.inner
            .lock()
            .values()
            .map(|metrics| metrics.execution_count)
            .sum()
    }

    pub fn reset(&self) {
        self.inner.lock().clear();
    }

    /// Human-readable report, busiest rules first.
    pub fn render_summary(&self) -> String {
        render_metrics(&self.snapshot())
    }
}

fn render_metrics(metrics: &BTreeMap<String, RuleMetrics>) -> String {
    let total: u64 = metrics.values().map(|entry| entry.execution_count).sum();
    let mut rows: Vec<(&String, &RuleMetrics)> = metrics.iter().collect();
    rows.sort_by(|a, b| b.1.execution_count.cmp(&a.1.execution_count));

    let mut output = String::from("=== Agent Rule Performance Metrics ===\n");
    let _ = writeln!(output, "Total rule evaluations: {total}");
    for (rule_id, entry) in rows {
        let _ = writeln!(
            output,
            "  {rule_id}: {} execution(s), total {:.3}ms, avg {:.3}ms",
            entry.execution_count,
            entry.total_execution_time_ms,
            entry.average_execution_time_ms()
        );
    }
    output
}

/// Labelled copy of a metrics registry at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub label: String,
    pub captured_at: DateTime<Utc>,
    pub metrics: BTreeMap<String, RuleMetrics>,
}

impl MetricsSnapshot {
    pub fn total_evaluations(&self) -> u64 {
        self.metrics.values().map(|entry| entry.execution_count).sum()
    }
}

/// Append-only log of metrics snapshots used to compare runs.
///
/// Create one at startup and hand clones to whoever saves or reads snapshots.
#[derive(Debug, Clone, Default)]
pub struct MetricsHistory {
    entries: Arc<RwLock<Vec<MetricsSnapshot>>>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, label: impl Into<String>, registry: &MetricsRegistry) -> MetricsSnapshot {
        let snapshot = MetricsSnapshot {
            label: label.into(),
            captured_at: Utc::now(),
            metrics: registry.snapshot(),
        };
        self.entries.write().push(snapshot.clone());
        snapshot
    }

    pub fn entries(&self) -> Vec<MetricsSnapshot> {
        self.entries.read().clone()
    }

    pub fn latest(&self, label: &str) -> Option<MetricsSnapshot> {
        self.entries
            .read()
            .iter()
            .rev()
            .find(|snapshot| snapshot.label == label)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Renders every snapshot in insertion order.
    pub fn render(&self) -> String {
        let entries = self.entries.read();
        if entries.is_empty() {
            return EMPTY_HISTORY.to_string();
        }

        let mut output = String::from("=== Metrics History ===\n");
        for (index, snapshot) in entries.iter().enumerate() {
            let _ = writeln!(
                output,
                "[{}] {} ({})",
                index + 1,
                snapshot.label,
                snapshot.captured_at.to_rfc3339()
            );
            output.push_str(&render_metrics(&snapshot.metrics));
        }
        output
    }
}
