use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::metrics::MetricsRegistry;
use crate::outcome::ExecutionSummary;
use crate::rule::EvaluableRule;

/// Runtime executor that evaluates a context against every registered rule.
///
/// Rules run in descending priority order; rules sharing a priority keep
/// their registration order. Every matching rule's action runs.
pub struct RuleEngine<C> {
    rules: Vec<Arc<dyn EvaluableRule<C>>>,
    metrics: MetricsRegistry,
}

impl<C> Default for RuleEngine<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for RuleEngine<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.rules.iter().map(|rule| rule.id()).collect();
        f.debug_struct("RuleEngine").field("rules", &ids).finish()
    }
}

impl<C> RuleEngine<C> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            metrics: MetricsRegistry::new(),
        }
    }

    /// Appends a simple or composite rule to the registry.
    pub fn register_rule<R>(&mut self, rule: R)
    where
        R: EvaluableRule<C> + 'static,
    {
        self.rules.push(Arc::new(rule));
    }

    pub fn register_shared(&mut self, rule: Arc<dyn EvaluableRule<C>>) {
        self.rules.push(rule);
    }

    /// Borrow the rules in registration order.
    pub fn rules(&self) -> &[Arc<dyn EvaluableRule<C>>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the engine contains no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Rules sorted by descending priority, ties kept in registration order.
    pub fn ordered_rules(&self) -> Vec<Arc<dyn EvaluableRule<C>>> {
        let mut ordered = self.rules.clone();
        ordered.sort_by_key(|rule| Reverse(rule.priority()));
        ordered
    }

    /// Identifiers of every matching rule, in execution order. Runs no actions.
    pub fn evaluate(&self, context: &C) -> Vec<String> {
        self.ordered_rules()
            .iter()
            .filter(|rule| rule.evaluate(context))
            .map(|rule| rule.id().to_string())
            .collect()
    }

    /// Evaluates every rule and runs the actions of all matches.
    pub fn execute(&self, context: &C) -> ExecutionSummary {
        let mut summary = ExecutionSummary::new();

        for rule in self.ordered_rules() {
            let started = Instant::now();
            let result = rule.execute(context);
            self.metrics.record(rule.id(), started.elapsed());

            if result.matched {
                debug!(rule_id = %rule.id(), priority = rule.priority(), "rule matched context");
            }
            summary.record(result);
        }

        summary
    }

    /// Performance report for this engine's rules.
    pub fn performance_summary(&self) -> String {
        self.metrics.render_summary()
    }
}
