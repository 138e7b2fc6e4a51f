// Tests covering metrics history, scenario analysis and decision traces over one rule set.
use arbiter::prelude::*;
use arbiter::{DebugTracer, MetricsHistory, RuleAnalyzer, ScenarioSpace};
use arbiter_rules::{ScenarioVariant, EMPTY_HISTORY};

fn crew_selector() -> ActionSelector<PropertyBag> {
    ActionSelector::new("wait").with_definitions([
        AgentRuleDefinition::new("lay_low", 90, "hide")
            .with_condition(ConditionDefinition::new("heat", ComparisonOperator::Ge, 80.0)),
        AgentRuleDefinition::new("recruit", 50, "recruit")
            .with_condition(ConditionDefinition::new("wealth", ComparisonOperator::Gt, 5_000.0)),
        AgentRuleDefinition::new("endgame", 20, "retire")
            .with_condition(ConditionDefinition::equals("phase", "endgame")),
    ])
}

#[test]
fn metrics_history_compares_runs() {
    let selector = crew_selector();
    let history = MetricsHistory::new();
    assert_eq!(history.render(), EMPTY_HISTORY);

    selector.select(&PropertyBag::new().with("heat", 95.0));
    selector.save_metrics_snapshot(&history, "first");
    selector.select(&PropertyBag::new().with("heat", 5.0).with("wealth", 9_000.0));
    selector.save_metrics_snapshot(&history, "second");

    let entries = history.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].total_evaluations(), 1);
    assert_eq!(entries[1].total_evaluations(), 2);

    let rendered = history.render();
    assert!(rendered.find("first").expect("first") < rendered.find("second").expect("second"));
    assert!(selector
        .performance_summary()
        .contains("Total rule evaluations: 2"));
}

#[test]
fn analysis_flags_dead_rules_and_matches_selection() {
    let selector = crew_selector();
    let space = ScenarioSpace::new();
    let cases = space.generate_extended_test_cases();
    let report = RuleAnalyzer::new(&selector).analyze(&cases);

    assert_eq!(report.total_cases, cases.len());
    let dead: Vec<&str> = report
        .dead_rules()
        .iter()
        .map(|rule| rule.rule_id.as_str())
        .collect();
    assert_eq!(dead, vec!["endgame"]);

    for case in &cases {
        let selection = selector.select(&case.context);
        let trace = DebugTracer::new().trace(&selector, &case.context);
        assert_eq!(trace.selected_action, selection.action, "case {}", case.label);
        assert_eq!(trace.selected_rule, selection.rule_id, "case {}", case.label);
    }
}

#[test]
fn analyzer_leaves_metrics_untouched() {
    let selector = crew_selector();
    RuleAnalyzer::new(&selector).analyze_generated(&ScenarioSpace::new(), ScenarioVariant::Base);
    assert_eq!(selector.metrics().total_evaluations(), 0);
}

#[test]
fn trace_shows_context_and_decision() {
    let selector = crew_selector();
    let trace = DebugTracer::new().trace(
        &selector,
        &PropertyBag::new().with("phase", "mid").with("wealth", 7_000.0).with("heat", 10.0),
    );

    let rendered = trace.to_string();
    assert!(rendered.contains("Context: phase=mid"));
    assert!(rendered.contains("Context: wealth=7000"));
    assert!(rendered.contains("[ -- ]"));
    assert!(rendered.contains("[MATCH]"));
    assert!(rendered.trim_end().ends_with("=> SELECTED: recruit (recruit)"));
}
