use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arbiter_core::EngineSettings;
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::RuleError;
use crate::rule::Condition;

/// Returned when no registered rule handles an event. Callers may match on it.
pub const NO_MATCHING_HANDLER: &str = "No matching async event handler";

/// Effect applied once an async rule's delay has elapsed.
#[async_trait]
pub trait AsyncEffect<C>: Send + Sync {
    async fn apply(&self, context: &C);
}

struct FnEffect<F>(F);

#[async_trait]
impl<C, F> AsyncEffect<C> for FnEffect<F>
where
    C: Sync,
    F: Fn(&C) + Send + Sync,
{
    async fn apply(&self, context: &C) {
        (self.0)(context)
    }
}

/// Event handler gated by a guard and resolved after a delay.
pub struct AsyncRule<C> {
    id: String,
    event_name: String,
    message: String,
    delay: Option<Duration>,
    guard: Option<Condition<C>>,
    effect: Option<Arc<dyn AsyncEffect<C>>>,
}

impl<C> fmt::Debug for AsyncRule<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRule")
            .field("id", &self.id)
            .field("event_name", &self.event_name)
            .field("message", &self.message)
            .field("delay", &self.delay)
            .field("guarded", &self.guard.is_some())
            .field("has_effect", &self.effect.is_some())
            .finish()
    }
}

impl<C> AsyncRule<C> {
    pub fn new(
        id: impl Into<String>,
        event_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            event_name: event_name.into(),
            message: message.into(),
            delay: None,
            guard: None,
            effect: None,
        }
    }

    pub fn with_guard<F>(mut self, guard: F) -> Self
    where
        F: Fn(&C) -> bool + Send + Sync + 'static,
    {
        self.guard = Some(Arc::new(guard));
        self
    }

    /// Delay used by [`AsyncRuleRegistry::dispatch`].
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_effect<F>(self, effect: F) -> Self
    where
        C: Sync + 'static,
        F: Fn(&C) + Send + Sync + 'static,
    {
        self.with_async_effect(FnEffect(effect))
    }

    pub fn with_async_effect<E>(mut self, effect: E) -> Self
    where
        E: AsyncEffect<C> + 'static,
    {
        self.effect = Some(Arc::new(effect));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    fn handles(&self, event_name: &str, context: &C) -> bool {
        self.event_name == event_name && self.guard.as_ref().map_or(true, |guard| guard(context))
    }
}

/// Event-keyed table of async rules, independent of the synchronous engine.
///
/// Registration takes `&self`, so a registry can be shared behind an `Arc`
/// while events are being processed.
pub struct AsyncRuleRegistry<C> {
    rules: RwLock<Vec<Arc<AsyncRule<C>>>>,
    default_delay: Duration,
}

impl<C> Default for AsyncRuleRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for AsyncRuleRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncRuleRegistry")
            .field("rules", &self.async_rule_ids())
            .field("default_delay", &self.default_delay)
            .finish()
    }
}

impl<C> AsyncRuleRegistry<C> {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(Vec::new()),
            default_delay: Duration::ZERO,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new().with_default_delay(settings.async_delay)
    }

    /// Delay for rules registered without their own.
    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn register(&self, rule: AsyncRule<C>) {
        debug!(rule_id = %rule.id, event = %rule.event_name, "registered async rule");
        self.rules.write().push(Arc::new(rule));
    }

    /// Every registered id in registration order, whatever the guards say.
    pub fn async_rule_ids(&self) -> Vec<String> {
        self.rules.read().iter().map(|rule| rule.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    /// Guards run on a snapshot, never under the lock, so they may touch the registry.
    fn find_handler(&self, event_name: &str, context: &C) -> Option<Arc<AsyncRule<C>>> {
        let rules = self.rules.read().clone();
        rules.into_iter().find(|rule| rule.handles(event_name, context))
    }
}

impl<C> AsyncRuleRegistry<C>
where
    C: Sync,
{
    /// Waits `delay` and resolves the first rule whose event and guard match.
    ///
    /// The handler is chosen before suspending; context changes during the wait
    /// do not affect it. Without a handler the fallback message is returned
    /// immediately. Cancelling `token` during the wait yields
    /// [`RuleError::Cancelled`] and the effect never runs.
    pub async fn process_event(
        &self,
        event_name: &str,
        context: &C,
        delay: Duration,
        token: &CancellationToken,
    ) -> Result<String, RuleError> {
        let Some(rule) = self.find_handler(event_name, context) else {
            debug!(event = event_name, "no async handler matched");
            return Ok(NO_MATCHING_HANDLER.to_string());
        };

        self.resolve(rule, context, delay, token).await
    }

    /// Like [`AsyncRuleRegistry::process_event`] with the handler's own delay.
    pub async fn dispatch(
        &self,
        event_name: &str,
        context: &C,
        token: &CancellationToken,
    ) -> Result<String, RuleError> {
        let Some(rule) = self.find_handler(event_name, context) else {
            debug!(event = event_name, "no async handler matched");
            return Ok(NO_MATCHING_HANDLER.to_string());
        };

        let delay = rule.delay.unwrap_or(self.default_delay);
        self.resolve(rule, context, delay, token).await
    }

    async fn resolve(
        &self,
        rule: Arc<AsyncRule<C>>,
        context: &C,
        delay: Duration,
        token: &CancellationToken,
    ) -> Result<String, RuleError> {
        debug!(rule_id = %rule.id, delay_ms = delay.as_millis() as u64, "async rule waiting");

        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!(rule_id = %rule.id, "async rule cancelled");
                return Err(RuleError::Cancelled { rule_id: rule.id.clone() });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        if let Some(effect) = &rule.effect {
            effect.apply(context).await;
        }
        debug!(rule_id = %rule.id, "async rule resolved");
        Ok(rule.message.clone())
    }
}
