use std::fmt;
use std::ops::ControlFlow;

use arbiter_core::EngineSettings;
use arbiter_core::config::DEFAULT_TRACE_KEYS;
use serde::Serialize;

use crate::property::PropertySource;
use crate::selector::ActionSelector;

const UNSET: &str = "<unset>";

/// Step-by-step account of one selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionTrace {
    pub lines: Vec<String>,
    pub selected_action: String,
    /// `None` when the default action was used.
    pub selected_rule: Option<String>,
}

impl fmt::Display for DecisionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

/// Renders how an [`ActionSelector`] reaches its decision for a context.
#[derive(Debug, Clone)]
pub struct DebugTracer {
    summary_keys: Vec<String>,
}

impl Default for DebugTracer {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugTracer {
    pub fn new() -> Self {
        Self {
            summary_keys: DEFAULT_TRACE_KEYS.iter().map(|key| key.to_string()).collect(),
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new().with_summary_keys(settings.trace_keys.iter().cloned())
    }

    /// Context properties printed in the trace header.
    pub fn with_summary_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.summary_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn summary_keys(&self) -> &[String] {
        &self.summary_keys
    }

    /// Evaluates every rule in order and marks the one selection would pick.
    ///
    /// Does not record selection metrics.
    pub fn trace<C>(&self, selector: &ActionSelector<C>, context: &C) -> DecisionTrace
    where
        C: PropertySource,
    {
        let mut lines = vec!["=== Rule Decision Trace ===".to_string()];
        for key in &self.summary_keys {
            let value = context
                .property(key)
                .map(|value| value.to_string())
                .unwrap_or_else(|| UNSET.to_string());
            lines.push(format!("Context: {key}={value}"));
        }

        let mut selected: Option<(String, String)> = None;
        selector.walk(context, |entry, matched| {
            let marker = if matched { "[MATCH]" } else { "[ -- ]" };
            let mut line = format!(
                "{marker} {:>4} {} -> {}",
                entry.priority(),
                entry.id(),
                entry.action()
            );
            if matched && selected.is_none() {
                selected = Some((entry.id().to_string(), entry.action().to_string()));
                line.push_str(" <= first match");
            }
            lines.push(line);
            ControlFlow::Continue(())
        });

        let (selected_rule, selected_action) = match selected {
            Some((rule_id, action)) => (Some(rule_id), action),
            None => (None, selector.default_action().to_string()),
        };
        lines.push(format!(
            "=> SELECTED: {selected_action} ({})",
            selected_rule.as_deref().unwrap_or("default")
        ));

        DecisionTrace {
            lines,
            selected_action,
            selected_rule,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{AgentRuleDefinition, ConditionDefinition};
    use crate::property::{ComparisonOperator, PropertyBag};

    fn selector() -> ActionSelector<PropertyBag> {
        ActionSelector::new("wait").with_definitions([
            AgentRuleDefinition::new("expand", 40, "build").with_condition(
                ConditionDefinition::new("wealth", ComparisonOperator::Gt, 500.0),
            ),
            AgentRuleDefinition::new("late_push", 80, "attack")
                .with_condition(ConditionDefinition::equals("phase", "late")),
            AgentRuleDefinition::new("hoard", 10, "save"),
        ])
    }

    #[test]
    fn trace_agrees_with_selection() {
        let selector = selector();
        let tracer = DebugTracer::new();
        for context in [
            PropertyBag::new().with("phase", "late").with("wealth", 900.0),
            PropertyBag::new().with("phase", "early").with("wealth", 900.0),
            PropertyBag::new().with("phase", "early").with("wealth", 10.0),
        ] {
            let trace = tracer.trace(&selector, &context);
            let selection = selector.select(&context);
            assert_eq!(trace.selected_action, selection.action);
            assert_eq!(trace.selected_rule, selection.rule_id);
        }
    }

    #[test]
    fn lists_every_rule_in_evaluation_order() {
        let selector = selector();
        let trace = DebugTracer::new().trace(
            &selector,
            &PropertyBag::new().with("phase", "late").with("wealth", 900.0),
        );

        assert_eq!(trace.lines[0], "=== Rule Decision Trace ===");
        assert_eq!(trace.lines[1], "Context: phase=late");
        assert_eq!(trace.lines[2], "Context: wealth=900");

        let late = trace.lines.iter().position(|l| l.contains("late_push")).expect("late_push");
        let expand = trace.lines.iter().position(|l| l.contains("expand")).expect("expand");
        let hoard = trace.lines.iter().position(|l| l.contains("hoard")).expect("hoard");
        assert!(late < expand && expand < hoard);
        assert!(trace.lines[late].starts_with("[MATCH]"));
        assert!(trace.lines[late].ends_with("<= first match"));
        assert!(trace.lines[expand].starts_with("[MATCH]"));
        assert!(!trace.lines[expand].ends_with("<= first match"));
        assert_eq!(trace.lines.last().map(String::as_str), Some("=> SELECTED: attack (late_push)"));
    }

    #[test]
    fn default_action_and_unset_keys() {
        let selector = ActionSelector::<PropertyBag>::new("wait").with_definitions([
            AgentRuleDefinition::new("never", 1, "noop")
                .with_condition(ConditionDefinition::equals("phase", "endgame")),
        ]);
        let trace = DebugTracer::new()
            .with_summary_keys(["heat"])
            .trace(&selector, &PropertyBag::new().with("phase", "early"));

        assert_eq!(trace.selected_rule, None);
        assert_eq!(trace.selected_action, "wait");
        assert!(trace.lines.contains(&"Context: heat=<unset>".to_string()));
        assert!(trace.to_string().ends_with("=> SELECTED: wait (default)\n"));
    }

    #[test]
    fn tracing_leaves_metrics_untouched() {
        let selector = selector();
        DebugTracer::new().trace(&selector, &PropertyBag::new());
        assert_eq!(selector.metrics().total_evaluations(), 0);
    }

    #[test]
    fn settings_supply_summary_keys() {
        let settings = EngineSettings {
            trace_keys: vec!["heat".into()],
            ..EngineSettings::default()
        };
        assert_eq!(DebugTracer::from_settings(&settings).summary_keys(), ["heat".to_string()]);
    }
}
