//! Arbiter: declarative, composable rule evaluation.
//!
//! This facade re-exports the workspace crates so applications can depend on
//! a single package:
//!
//! * [`arbiter_core`]: settings, the canonical error type and logging setup
//! * [`arbiter_rules`]: rules, composites, dynamic definitions, selection and the
//!   analysis, tracing and async tooling built on top of them

pub use arbiter_core;
pub use arbiter_rules;

pub use arbiter_core::{ArbiterError, EngineSettings, Environment};
pub use arbiter_rules::{
    ActionSelector, AgentRuleDefinition, AsyncRule, AsyncRuleRegistry, CompositeOperator,
    CompositeRule, CompositeRuleBuilder, ConditionDefinition, DebugTracer, EvaluableRule,
    MetricsHistory, PropertyBag, PropertySource, PropertyTable, Rule, RuleAnalyzer,
    RuleConfigLoader, RuleEngine, RuleError, ScenarioSpace,
};

use tracing::info;

/// Loads settings from the environment and installs the tracing subscriber.
pub fn bootstrap() -> anyhow::Result<EngineSettings> {
    let settings = arbiter_core::config::load_settings()?;
    arbiter_core::logging::init_from_settings(&settings)?;
    info!(
        environment = ?settings.environment,
        default_action = %settings.default_action,
        "arbiter initialised"
    );
    Ok(settings)
}

/// Common imports for rule authors.
pub mod prelude {
    pub use arbiter_rules::{
        ActionSelector, AgentRuleDefinition, ComparisonOperator, CompositeOperator,
        CompositeRuleBuilder, ConditionDefinition, EvaluableRule, PropertyBag, PropertySource,
        PropertyTable, PropertyValue, Rule, RuleEngine,
    };
}
