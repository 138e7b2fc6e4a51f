//! Rule evaluation engine for the Arbiter workspace.
//!
//! Consumers describe behaviour as prioritized rules over a context type of
//! their choosing. Rules can be written in code, combined with AND/OR/NOT
//! composites, or declared as property conditions in a small text format and
//! loaded at runtime. A [`RuleEngine`] runs every matching rule; an
//! [`ActionSelector`] picks the action of the first match. Metrics, scenario
//! analysis and decision traces are layered on top of the same rule set, and
//! [`AsyncRuleRegistry`] dispatches delayed, cancellable event handlers.

mod analyzer;
mod async_rules;
mod composite;
mod definition;
mod engine;
mod error;
mod loader;
mod metrics;
mod outcome;
mod property;
mod rule;
mod selector;
mod tracer;

pub use analyzer::{
    AnalysisCase, AnalysisReport, RuleAnalysis, RuleAnalyzer, ScenarioGenerator, ScenarioSpace,
    ScenarioVariant,
};
pub use async_rules::{AsyncEffect, AsyncRule, AsyncRuleRegistry, NO_MATCHING_HANDLER};
pub use composite::{CompositeOperator, CompositeRule, CompositeRuleBuilder, UNNAMED_COMPOSITE};
pub use definition::{AgentRuleDefinition, ConditionDefinition};
pub use engine::RuleEngine;
pub use error::RuleError;
pub use loader::RuleConfigLoader;
pub use metrics::{MetricsHistory, MetricsRegistry, MetricsSnapshot, RuleMetrics, EMPTY_HISTORY};
pub use outcome::{ExecutionSummary, RuleOutput, RuleResult, CHILD_RESULTS_KEY};
pub use property::{
    ComparisonOperator, PropertyBag, PropertySource, PropertyTable, PropertyValue,
};
pub use rule::{Action, Condition, EvaluableRule, Rule};
pub use selector::{ActionSelector, Selection, SelectorEntry, DEFAULT_RULE_KEY};
pub use tracer::{DebugTracer, DecisionTrace};
