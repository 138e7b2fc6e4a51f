use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::RuleError;
use crate::outcome::RuleResult;
use crate::rule::EvaluableRule;

/// Name given to composites built without an explicit name.
pub const UNNAMED_COMPOSITE: &str = "Unnamed Composite Rule";

/// Propositional operator combining the children of a [`CompositeRule`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompositeOperator {
    And,
    Or,
    /// Negates the first child only.
    Not,
    /// Unrecognised operator token. Composites using it never match.
    Unknown(String),
}

impl CompositeOperator {
    /// Parses an operator token case-insensitively.
    pub fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "and" | "all" => CompositeOperator::And,
            "or" | "any" => CompositeOperator::Or,
            "not" => CompositeOperator::Not,
            _ => CompositeOperator::Unknown(token.trim().to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, CompositeOperator::Unknown(_))
    }
}

impl Default for CompositeOperator {
    fn default() -> Self {
        CompositeOperator::And
    }
}

impl fmt::Display for CompositeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeOperator::And => f.write_str("AND"),
            CompositeOperator::Or => f.write_str("OR"),
            CompositeOperator::Not => f.write_str("NOT"),
            CompositeOperator::Unknown(token) => write!(f, "UNKNOWN({token})"),
        }
    }
}

impl From<String> for CompositeOperator {
    fn from(value: String) -> Self {
        CompositeOperator::parse(&value)
    }
}

impl From<CompositeOperator> for String {
    fn from(value: CompositeOperator) -> Self {
        match value {
            CompositeOperator::Unknown(token) => token,
            known => known.to_string(),
        }
    }
}

/// Rule combining child rules with AND / OR / NOT semantics.
///
/// Children may themselves be composites, so rules nest arbitrarily.
pub struct CompositeRule<C> {
    id: String,
    name: String,
    description: String,
    priority: i32,
    operator: CompositeOperator,
    children: Vec<Arc<dyn EvaluableRule<C>>>,
}

impl<C> CompositeRule<C> {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        operator: CompositeOperator,
        children: Vec<Arc<dyn EvaluableRule<C>>>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            priority: 0,
            operator,
            children,
        }
    }

    pub fn builder() -> CompositeRuleBuilder<C> {
        CompositeRuleBuilder::new()
    }

    pub fn operator(&self) -> &CompositeOperator {
        &self.operator
    }

    /// Read-only view of the children, in insertion order.
    pub fn children(&self) -> &[Arc<dyn EvaluableRule<C>>] {
        &self.children
    }
}

impl<C> fmt::Debug for CompositeRule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let child_ids: Vec<&str> = self.children.iter().map(|child| child.id()).collect();
        f.debug_struct("CompositeRule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("operator", &self.operator)
            .field("children", &child_ids)
            .finish()
    }
}

impl<C> EvaluableRule<C> for CompositeRule<C> {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn evaluate(&self, context: &C) -> bool {
        if self.children.is_empty() {
            return false;
        }

        match &self.operator {
            CompositeOperator::And => self.children.iter().all(|child| child.evaluate(context)),
            CompositeOperator::Or => self.children.iter().any(|child| child.evaluate(context)),
            CompositeOperator::Not => !self.children[0].evaluate(context),
            CompositeOperator::Unknown(token) => {
                debug!(rule_id = %self.id, operator = %token, "unknown composite operator");
                false
            }
        }
    }

    fn execute(&self, context: &C) -> RuleResult {
        let mut result = RuleResult::new(&self.id, &self.name);
        result.matched = self.evaluate(context);

        let mut child_results = Vec::new();
        if result.matched {
            match &self.operator {
                CompositeOperator::And => {
                    child_results.extend(self.children.iter().map(|child| child.execute(context)));
                }
                CompositeOperator::Or => {
                    child_results.extend(
                        self.children
                            .iter()
                            .filter(|child| child.evaluate(context))
                            .map(|child| child.execute(context)),
                    );
                }
                CompositeOperator::Not => {
                    child_results.push(self.children[0].execute(context));
                }
                CompositeOperator::Unknown(_) => {}
            }
            debug!(rule_id = %self.id, operator = %self.operator, "composite rule matched");
        }

        result.action_executed = child_results.iter().any(|child| child.action_executed);
        result.set_child_results(child_results);
        result
    }
}

/// Fluent, single-use constructor for [`CompositeRule`].
pub struct CompositeRuleBuilder<C> {
    id: Option<String>,
    name: Option<String>,
    description: String,
    priority: i32,
    operator: CompositeOperator,
    children: Vec<Arc<dyn EvaluableRule<C>>>,
}

impl<C> Default for CompositeRuleBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> CompositeRuleBuilder<C> {
    pub fn new() -> Self {
        Self {
            id: None,
            name: None,
            description: String::new(),
            priority: 0,
            operator: CompositeOperator::And,
            children: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_operator(mut self, operator: CompositeOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn add_rule<R>(mut self, rule: R) -> Self
    where
        R: EvaluableRule<C> + 'static,
    {
        self.children.push(Arc::new(rule));
        self
    }

    /// Appends an already shared rule, e.g. one also registered with an engine.
    pub fn add_shared(mut self, rule: Arc<dyn EvaluableRule<C>>) -> Self {
        self.children.push(rule);
        self
    }

    pub fn add_rules<I, R>(mut self, rules: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: EvaluableRule<C> + 'static,
    {
        self.children.extend(
            rules
                .into_iter()
                .map(|rule| Arc::new(rule) as Arc<dyn EvaluableRule<C>>),
        );
        self
    }

    /// Freezes the accumulated state. Fails when no child rule was added.
    pub fn build(self) -> Result<CompositeRule<C>, RuleError> {
        if self.children.is_empty() {
            return Err(RuleError::EmptyComposite);
        }

        Ok(CompositeRule {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: self.name.unwrap_or_else(|| UNNAMED_COMPOSITE.to_string()),
            description: self.description,
            priority: self.priority,
            operator: self.operator,
            children: self.children,
        })
    }
}
