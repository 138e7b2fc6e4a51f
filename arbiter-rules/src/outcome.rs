use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output key under which composite rules store their children's results.
pub const CHILD_RESULTS_KEY: &str = "ChildResults";

/// Entry stored in a [`RuleResult`] output map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutput {
    Children(Vec<RuleResult>),
    Value(Value),
}

/// Outcome of one evaluation attempt of a rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleResult {
    pub rule_id: String,
    pub rule_name: String,
    pub matched: bool,
    pub action_executed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output: BTreeMap<String, RuleOutput>,
}

impl RuleResult {
    pub fn new(rule_id: impl Into<String>, rule_name: impl Into<String>) -> Self {
        Self {
            rule_id: rule_id.into(),
            rule_name: rule_name.into(),
            matched: false,
            action_executed: false,
            error_message: None,
            output: BTreeMap::new(),
        }
    }

    pub fn insert_output(&mut self, key: impl Into<String>, value: Value) {
        self.output.insert(key.into(), RuleOutput::Value(value));
    }

    pub fn set_child_results(&mut self, children: Vec<RuleResult>) {
        self.output
            .insert(CHILD_RESULTS_KEY.to_string(), RuleOutput::Children(children));
    }

    /// Results of child rules recorded by a composite, in child order.
    pub fn child_results(&self) -> &[RuleResult] {
        match self.output.get(CHILD_RESULTS_KEY) {
            Some(RuleOutput::Children(children)) => children,
            _ => &[],
        }
    }

    /// Whether this result or any nested child result captured an action failure.
    pub fn has_errors(&self) -> bool {
        self.error_message.is_some() || self.child_results().iter().any(RuleResult::has_errors)
    }
}

/// Aggregated view of one [`crate::RuleEngine::execute`] call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub matched_rules: usize,
    pub results: Vec<RuleResult>,
}

impl ExecutionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: RuleResult) {
        if result.matched {
            self.matched_rules += 1;
        }
        self.results.push(result);
    }

    /// Identifiers of the rules that matched, in execution order.
    pub fn matched_ids(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|result| result.matched)
            .map(|result| result.rule_id.as_str())
            .collect()
    }

    pub fn result_for(&self, rule_id: &str) -> Option<&RuleResult> {
        self.results.iter().find(|result| result.rule_id == rule_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn child_results_default_to_empty() {
        let result = RuleResult::new("r1", "Rule one");
        assert!(result.child_results().is_empty());
        assert!(!result.has_errors());
    }

    #[test]
    fn nested_errors_are_detected() {
        let mut child = RuleResult::new("child", "Child");
        child.error_message = Some("boom".into());
        let mut parent = RuleResult::new("parent", "Parent");
        parent.insert_output("note", json!("kept"));
        parent.set_child_results(vec![child]);

        assert_eq!(parent.child_results().len(), 1);
        assert!(parent.has_errors());
        assert_eq!(
            parent.output.get("note"),
            Some(&RuleOutput::Value(json!("kept")))
        );
    }

    #[test]
    fn array_outputs_survive_serialization() {
        let mut result = RuleResult::new("tagger", "Tagger");
        result.insert_output("tags", json!([]));
        result.set_child_results(Vec::new());

        let encoded = serde_json::to_string(&result).expect("encode");
        let decoded: RuleResult = serde_json::from_str(&encoded).expect("decode");

        assert_eq!(decoded.output.get("tags"), Some(&RuleOutput::Value(json!([]))));
        assert_eq!(
            decoded.output.get(CHILD_RESULTS_KEY),
            Some(&RuleOutput::Children(Vec::new()))
        );
        assert_eq!(decoded, result);
    }

    #[test]
    fn summary_counts_matches_only() {
        let mut summary = ExecutionSummary::new();
        let mut hit = RuleResult::new("hit", "Hit");
        hit.matched = true;
        summary.record(hit);
        summary.record(RuleResult::new("miss", "Miss"));

        assert_eq!(summary.matched_rules, 1);
        assert_eq!(summary.matched_ids(), vec!["hit"]);
        assert!(summary.result_for("miss").is_some());
    }
}
