use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::outcome::RuleResult;

/// Predicate evaluated against a context.
pub type Condition<C> = Arc<dyn Fn(&C) -> bool + Send + Sync>;

/// Side effect executed when a rule matches.
pub type Action<C> = Arc<dyn Fn(&C) -> anyhow::Result<()> + Send + Sync>;

/// Contract shared by simple and composite rules.
pub trait EvaluableRule<C>: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Ordering priority. Higher numbers are evaluated first.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether the rule matches the context. Never runs actions.
    fn evaluate(&self, context: &C) -> bool;

    /// Evaluates the rule and runs its action(s) when it matches.
    fn execute(&self, context: &C) -> RuleResult;
}

impl<C, R> EvaluableRule<C> for Arc<R>
where
    R: EvaluableRule<C> + ?Sized,
{
    fn id(&self) -> &str {
        (**self).id()
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn description(&self) -> &str {
        (**self).description()
    }

    fn priority(&self) -> i32 {
        (**self).priority()
    }

    fn evaluate(&self, context: &C) -> bool {
        (**self).evaluate(context)
    }

    fn execute(&self, context: &C) -> RuleResult {
        (**self).execute(context)
    }
}

/// A named, prioritized condition with an optional action.
pub struct Rule<C> {
    id: String,
    name: String,
    description: String,
    priority: i32,
    condition: Condition<C>,
    action: Option<Action<C>>,
}

impl<C> Rule<C> {
    pub fn new<F>(id: impl Into<String>, name: impl Into<String>, condition: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            priority: 0,
            condition: Arc::new(condition),
            action: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_action<F>(mut self, action: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn has_action(&self) -> bool {
        self.action.is_some()
    }
}

impl<C> Clone for Rule<C> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            priority: self.priority,
            condition: Arc::clone(&self.condition),
            action: self.action.clone(),
        }
    }
}

impl<C> fmt::Debug for Rule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

impl<C> EvaluableRule<C> for Rule<C> {
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
        (self.condition)(context)
    }

    fn execute(&self, context: &C) -> RuleResult {
        let mut result = RuleResult::new(&self.id, &self.name);
        result.matched = self.evaluate(context);
        if !result.matched {
            return result;
        }

        debug!(rule_id = %self.id, "rule matched");
        let Some(action) = &self.action else {
            return result;
        };

        result.action_executed = true;
        match panic::catch_unwind(AssertUnwindSafe(|| action(context))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(rule_id = %self.id, error = %err, "rule action failed");
                result.error_message = Some(format!("{err:#}"));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(rule_id = %self.id, error = %message, "rule action panicked");
                result.error_message = Some(message);
            }
        }

        result
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "rule action panicked".to_string()
    }
}
