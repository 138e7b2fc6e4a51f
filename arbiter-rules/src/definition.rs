use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::property::{ComparisonOperator, PropertySource, PropertyValue};
use crate::rule::Rule;

/// Single `property operator value` triple of a dynamic rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionDefinition {
    pub property_name: String,
    #[serde(default = "ConditionDefinition::default_operator")]
    pub operator: ComparisonOperator,
    pub value: PropertyValue,
}

impl ConditionDefinition {
    pub fn new(
        property_name: impl Into<String>,
        operator: ComparisonOperator,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Self {
            property_name: property_name.into(),
            operator,
            value: value.into(),
        }
    }

    /// Shorthand for the common equality condition.
    pub fn equals(property_name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self::new(property_name, ComparisonOperator::Eq, value)
    }

    pub fn default_operator() -> ComparisonOperator {
        ComparisonOperator::Eq
    }

    /// Evaluates against the context. Unknown properties never match.
    pub fn evaluate<C>(&self, context: &C) -> bool
    where
        C: PropertySource + ?Sized,
    {
        match context.property(&self.property_name) {
            Some(actual) => self.operator.compare(&actual, &self.value),
            None => {
                warn!(property = %self.property_name, "unknown property in rule condition");
                false
            }
        }
    }
}

impl fmt::Display for ConditionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.property_name, self.operator, self.value)
    }
}

/// Data-only rule description compiled into an executable rule at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRuleDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub description: String,
    /// Implicitly AND-ed together.
    #[serde(default)]
    pub conditions: Vec<ConditionDefinition>,
    pub recommended_action: String,
}

impl AgentRuleDefinition {
    pub fn new(
        id: impl Into<String>,
        priority: i32,
        recommended_action: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            priority,
            description: String::new(),
            conditions: Vec::new(),
            recommended_action: recommended_action.into(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_condition(mut self, condition: ConditionDefinition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Whether every condition holds. A definition without conditions always matches.
    pub fn matches<C>(&self, context: &C) -> bool
    where
        C: PropertySource + ?Sized,
    {
        self.conditions
            .iter()
            .all(|condition| condition.evaluate(context))
    }

    /// Property names referenced by the conditions, in order of first use.
    pub fn referenced_properties(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for condition in &self.conditions {
            if !names.contains(&condition.property_name.as_str()) {
                names.push(&condition.property_name);
            }
        }
        names
    }

    /// Compiles the definition into an executable rule for context type `C`.
    pub fn compile<C>(&self) -> Rule<C>
    where
        C: PropertySource + 'static,
    {
        let conditions = self.conditions.clone();
        Rule::new(self.id.clone(), self.display_name(), move |context: &C| {
            conditions
                .iter()
                .all(|condition| condition.evaluate(context))
        })
        .with_description(self.description.clone())
        .with_priority(self.priority)
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{PropertyBag, PropertyTable};
    use crate::rule::EvaluableRule;
    use mockall::mock;
    use std::sync::LazyLock;

    mock! {
        pub Source {}

        impl PropertySource for Source {
            fn property(&self, name: &str) -> Option<PropertyValue>;
        }
    }

    struct Treasury {
        amount: f64,
        sealed: bool,
    }

    static TREASURY_PROPERTIES: LazyLock<PropertyTable<Treasury>> = LazyLock::new(|| {
        PropertyTable::new()
            .register_number("amount", |t: &Treasury| t.amount)
            .register_bool("sealed", |t: &Treasury| t.sealed)
    });

    impl PropertySource for Treasury {
        fn property(&self, name: &str) -> Option<PropertyValue> {
            TREASURY_PROPERTIES.resolve(self, name)
        }
    }

    #[test]
    fn conditions_are_and_ed() {
        let definition = AgentRuleDefinition::new("spend", 10, "spend")
            .with_condition(ConditionDefinition::new(
                "amount",
                ComparisonOperator::Gt,
                100.0,
            ))
            .with_condition(ConditionDefinition::equals("sealed", false));

        assert!(definition.matches(&Treasury {
            amount: 150.0,
            sealed: false
        }));
        assert!(!definition.matches(&Treasury {
            amount: 150.0,
            sealed: true
        }));
        assert!(!definition.matches(&Treasury {
            amount: 80.0,
            sealed: false
        }));
    }

    #[test]
    fn unknown_property_fails_closed() {
        let mut source = MockSource::new();
        source
            .expect_property()
            .times(1)
            .returning(|name| {
                assert_eq!(name, "loyalty");
                None
            });

        let condition = ConditionDefinition::equals("loyalty", true);
        assert!(!condition.evaluate(&source));
    }

    #[test]
    fn compiled_rule_keeps_identity() {
        let definition = AgentRuleDefinition::new("hoard", 42, "save")
            .with_name("Hoard cash")
            .with_description("keep reserves")
            .with_condition(ConditionDefinition::new(
                "amount",
                ComparisonOperator::Lt,
                10.0,
            ));
        let rule = definition.compile::<Treasury>();

        assert_eq!(rule.id(), "hoard");
        assert_eq!(rule.name(), "Hoard cash");
        assert_eq!(rule.description(), "keep reserves");
        assert_eq!(rule.priority(), 42);
        assert!(rule.evaluate(&Treasury {
            amount: 1.0,
            sealed: true
        }));
    }

    #[test]
    fn empty_condition_list_always_matches() {
        let definition = AgentRuleDefinition::new("fallback", 0, "wait");
        assert!(definition.matches(&PropertyBag::new()));
    }

    #[test]
    fn displays_in_config_form() {
        let condition = ConditionDefinition::new("heat", ComparisonOperator::Ge, 75.0);
        assert_eq!(condition.to_string(), "heat>=75");
    }

    #[test]
    fn deserializes_with_defaults() {
        let definition: AgentRuleDefinition = serde_json::from_str(
            r#"{
                "id": "expand",
                "conditions": [
                    {"property_name": "phase", "value": "early"},
                    {"property_name": "wealth", "operator": ">=", "value": 500}
                ],
                "recommended_action": "expand"
            }"#,
        )
        .expect("definition");

        assert_eq!(definition.priority, 0);
        assert_eq!(definition.display_name(), "expand");
        assert_eq!(definition.conditions[0].operator, ComparisonOperator::Eq);
        assert_eq!(definition.conditions[1].operator, ComparisonOperator::Ge);
        assert_eq!(definition.referenced_properties(), vec!["phase", "wealth"]);
    }
}
