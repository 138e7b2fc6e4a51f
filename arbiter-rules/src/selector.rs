use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Instant;

use arbiter_core::EngineSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::definition::AgentRuleDefinition;
use crate::metrics::{MetricsHistory, MetricsRegistry, MetricsSnapshot};
use crate::property::PropertySource;
use crate::rule::EvaluableRule;

/// Metrics key charged when no rule matches and the fallback action is returned.
pub const DEFAULT_RULE_KEY: &str = "<default>";

/// Rule registered with an [`ActionSelector`] together with the action it recommends.
pub struct SelectorEntry<C> {
    rule: Arc<dyn EvaluableRule<C>>,
    action: String,
    definition: Option<AgentRuleDefinition>,
}

impl<C> SelectorEntry<C> {
    pub fn id(&self) -> &str {
        self.rule.id()
    }

    pub fn name(&self) -> &str {
        self.rule.name()
    }

    pub fn priority(&self) -> i32 {
        self.rule.priority()
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn rule(&self) -> &Arc<dyn EvaluableRule<C>> {
        &self.rule
    }

    /// Source definition when the entry was compiled from one.
    pub fn definition(&self) -> Option<&AgentRuleDefinition> {
        self.definition.as_ref()
    }

    pub fn matches(&self, context: &C) -> bool {
        self.rule.evaluate(context)
    }
}

/// Result of a first-match selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub action: String,
    pub rule_id: Option<String>,
    pub rule_name: Option<String>,
    pub priority: Option<i32>,
}

impl Selection {
    fn from_entry<C>(entry: &SelectorEntry<C>) -> Self {
        Self {
            action: entry.action.clone(),
            rule_id: Some(entry.id().to_string()),
            rule_name: Some(entry.name().to_string()),
            priority: Some(entry.priority()),
        }
    }

    fn fallback(action: &str) -> Self {
        Self {
            action: action.to_string(),
            rule_id: None,
            rule_name: None,
            priority: None,
        }
    }

    /// Whether no rule matched and the default action was returned.
    pub fn is_default(&self) -> bool {
        self.rule_id.is_none()
    }
}

/// Stop-on-first-match action selection over prioritized rules.
///
/// Entries are kept sorted by descending priority; entries sharing a priority
/// keep their insertion order. The first entry whose rule matches wins.
pub struct ActionSelector<C> {
    entries: Vec<SelectorEntry<C>>,
    default_action: String,
    metrics: MetricsRegistry,
}

impl<C> fmt::Debug for ActionSelector<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.entries.iter().map(SelectorEntry::id).collect();
        f.debug_struct("ActionSelector")
            .field("entries", &ids)
            .field("default_action", &self.default_action)
            .finish()
    }
}

impl<C> ActionSelector<C> {
    pub fn new(default_action: impl Into<String>) -> Self {
        Self {
            entries: Vec::new(),
            default_action: default_action.into(),
            metrics: MetricsRegistry::new(),
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.default_action.clone())
    }

    /// Merges any rule (e.g. a composite) in with the action it recommends.
    pub fn add_rule<R>(&mut self, rule: R, action: impl Into<String>)
    where
        R: EvaluableRule<C> + 'static,
    {
        self.add_shared(Arc::new(rule), action);
    }

    pub fn add_shared(&mut self, rule: Arc<dyn EvaluableRule<C>>, action: impl Into<String>) {
        self.insert(SelectorEntry {
            rule,
            action: action.into(),
            definition: None,
        });
    }

    fn insert(&mut self, entry: SelectorEntry<C>) {
        let priority = entry.priority();
        let position = self
            .entries
            .partition_point(|existing| existing.priority() >= priority);
        self.entries.insert(position, entry);
    }

    pub fn default_action(&self) -> &str {
        &self.default_action
    }

    /// Entries in evaluation order.
    pub fn entries(&self) -> &[SelectorEntry<C>] {
        &self.entries
    }

    /// Definitions the selector was built from, in evaluation order.
    pub fn definitions(&self) -> impl Iterator<Item = &AgentRuleDefinition> {
        self.entries.iter().filter_map(SelectorEntry::definition)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Visits entries in evaluation order with their match result until the
    /// visitor breaks. Both [`ActionSelector::select`] and the tracer use it.
    pub fn walk<'a, F>(&'a self, context: &C, mut visit: F)
    where
        F: FnMut(&'a SelectorEntry<C>, bool) -> ControlFlow<()>,
    {
        for entry in &self.entries {
            let matched = entry.matches(context);
            if visit(entry, matched).is_break() {
                return;
            }
        }
    }

    /// Returns the action of the highest-priority matching rule, or the default.
    pub fn select(&self, context: &C) -> Selection {
        let started = Instant::now();

        let mut winner = None;
        self.walk(context, |entry, matched| {
            if matched {
                winner = Some(entry);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        let selection = match winner {
            Some(entry) => Selection::from_entry(entry),
            None => Selection::fallback(&self.default_action),
        };

        let key = selection.rule_id.as_deref().unwrap_or(DEFAULT_RULE_KEY);
        self.metrics.record(key, started.elapsed());
        debug!(rule_id = key, action = %selection.action, "selected action");
        selection
    }

    /// Convenience wrapper returning only the action token.
    pub fn recommend(&self, context: &C) -> String {
        self.select(context).action
    }

    pub fn performance_summary(&self) -> String {
        self.metrics.render_summary()
    }

    pub fn save_metrics_snapshot(
        &self,
        history: &MetricsHistory,
        label: impl Into<String>,
    ) -> MetricsSnapshot {
        history.save(label, &self.metrics)
    }
}

impl<C> ActionSelector<C>
where
    C: PropertySource + 'static,
{
    /// Compiles a dynamic definition and adds it.
    pub fn add_definition(&mut self, definition: AgentRuleDefinition) {
        let rule = Arc::new(definition.compile::<C>());
        self.insert(SelectorEntry {
            rule,
            action: definition.recommended_action.clone(),
            definition: Some(definition),
        });
    }

    pub fn add_definitions<I>(&mut self, definitions: I)
    where
        I: IntoIterator<Item = AgentRuleDefinition>,
    {
        for definition in definitions {
            self.add_definition(definition);
        }
    }

    pub fn with_definitions<I>(mut self, definitions: I) -> Self
    where
        I: IntoIterator<Item = AgentRuleDefinition>,
    {
        self.add_definitions(definitions);
        self
    }
}
