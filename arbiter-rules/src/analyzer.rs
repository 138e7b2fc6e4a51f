use std::fmt::Write as _;
use std::ops::ControlFlow;

use serde::{Deserialize, Serialize};

use crate::property::PropertyBag;
use crate::selector::ActionSelector;

/// Size of a generated scenario battery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScenarioVariant {
    #[default]
    Base,
    /// Base cases plus a resource/pressure sweep for every phase.
    Extended,
}

/// Labelled context used to exercise a rule set.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisCase<C> {
    pub label: String,
    pub context: C,
}

impl<C> AnalysisCase<C> {
    pub fn new(label: impl Into<String>, context: C) -> Self {
        Self {
            label: label.into(),
            context,
        }
    }
}

/// Produces representative contexts for rule analysis.
pub trait ScenarioGenerator<C> {
    fn generate(&self, variant: ScenarioVariant) -> Vec<AnalysisCase<C>>;
}

/// Scenario generator spanning a resource axis, a pressure axis and phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpace {
    pub resource_key: String,
    pub pressure_key: String,
    pub phase_key: String,
    pub phases: Vec<String>,
    pub max_resources: f64,
    pub max_pressure: f64,
}

impl Default for ScenarioSpace {
    fn default() -> Self {
        Self {
            resource_key: "wealth".into(),
            pressure_key: "heat".into(),
            phase_key: "phase".into(),
            phases: vec!["early".into(), "mid".into(), "late".into()],
            max_resources: 10_000.0,
            max_pressure: 100.0,
        }
    }
}

const SWEEP_RESOURCE_LEVELS: [f64; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];
const SWEEP_PRESSURE_LEVELS: [f64; 3] = [0.0, 0.5, 1.0];

impl ScenarioSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(
        mut self,
        resource_key: impl Into<String>,
        pressure_key: impl Into<String>,
        phase_key: impl Into<String>,
    ) -> Self {
        self.resource_key = resource_key.into();
        self.pressure_key = pressure_key.into();
        self.phase_key = phase_key.into();
        self
    }

    pub fn with_phases<I, S>(mut self, phases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.phases = phases.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_maxima(mut self, max_resources: f64, max_pressure: f64) -> Self {
        self.max_resources = max_resources;
        self.max_pressure = max_pressure;
        self
    }

    /// Representative cases: one per phase plus the extreme scenarios.
    pub fn generate_analysis_test_cases(&self) -> Vec<AnalysisCase<PropertyBag>> {
        self.generate(ScenarioVariant::Base)
    }

    pub fn generate_extended_test_cases(&self) -> Vec<AnalysisCase<PropertyBag>> {
        self.generate(ScenarioVariant::Extended)
    }

    fn phases(&self) -> Vec<&str> {
        if self.phases.is_empty() {
            vec!["default"]
        } else {
            self.phases.iter().map(String::as_str).collect()
        }
    }

    fn context(&self, phase: &str, resource_level: f64, pressure_level: f64) -> PropertyBag {
        PropertyBag::new()
            .with(self.phase_key.as_str(), phase)
            .with(
                self.resource_key.as_str(),
                (self.max_resources * resource_level).round(),
            )
            .with(
                self.pressure_key.as_str(),
                (self.max_pressure * pressure_level).round(),
            )
    }
}

impl ScenarioGenerator<PropertyBag> for ScenarioSpace {
    fn generate(&self, variant: ScenarioVariant) -> Vec<AnalysisCase<PropertyBag>> {
        let phases = self.phases();
        let first = phases[0];
        let middle = phases[phases.len() / 2];
        let last = phases[phases.len() - 1];
        let steps = (phases.len() + 1) as f64;

        let mut cases: Vec<AnalysisCase<PropertyBag>> = phases
            .iter()
            .enumerate()
            .map(|(index, phase)| {
                let level = (index + 1) as f64 / steps;
                AnalysisCase::new(format!("{phase}-balanced"), self.context(phase, level, level))
            })
            .collect();

        cases.push(AnalysisCase::new("zero-resources", self.context(first, 0.0, 0.5)));
        cases.push(AnalysisCase::new("max-pressure", self.context(last, 0.5, 1.0)));
        cases.push(AnalysisCase::new("resource-rich", self.context(middle, 1.0, 0.0)));
        cases.push(AnalysisCase::new("crisis", self.context(last, 0.0, 1.0)));

        if variant == ScenarioVariant::Extended {
            for phase in &phases {
                for resources in SWEEP_RESOURCE_LEVELS {
                    for pressure in SWEEP_PRESSURE_LEVELS {
                        cases.push(AnalysisCase::new(
                            format!(
                                "{phase}-r{:.0}-p{:.0}",
                                resources * 100.0,
                                pressure * 100.0
                            ),
                            self.context(phase, resources, pressure),
                        ));
                    }
                }
            }
        }

        cases
    }
}

/// Match statistics for one rule across a scenario battery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleAnalysis {
    pub rule_id: String,
    pub rule_name: String,
    pub priority: i32,
    pub action: String,
    /// Cases where the rule's conditions held, regardless of other rules.
    pub matched_count: usize,
    /// Cases where the rule won first-match selection.
    pub selected_count: usize,
    pub matched_cases: Vec<String>,
}

impl RuleAnalysis {
    /// Never matched any generated case.
    pub fn is_dead(&self) -> bool {
        self.matched_count == 0
    }

    pub fn is_always_matching(&self, total_cases: usize) -> bool {
        total_cases > 0 && self.matched_count == total_cases
    }

    /// Matched at least once but a higher-priority rule always won.
    pub fn is_shadowed(&self) -> bool {
        self.matched_count > 0 && self.selected_count == 0
    }
}

/// Output of [`RuleAnalyzer::analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub total_cases: usize,
    pub rules: Vec<RuleAnalysis>,
    /// Cases where no rule matched and the default action applied.
    pub default_cases: Vec<String>,
}

impl AnalysisReport {
    pub fn rule(&self, rule_id: &str) -> Option<&RuleAnalysis> {
        self.rules.iter().find(|rule| rule.rule_id == rule_id)
    }

    pub fn dead_rules(&self) -> Vec<&RuleAnalysis> {
        self.rules.iter().filter(|rule| rule.is_dead()).collect()
    }

    pub fn shadowed_rules(&self) -> Vec<&RuleAnalysis> {
        self.rules.iter().filter(|rule| rule.is_shadowed()).collect()
    }

    pub fn always_matching_rules(&self) -> Vec<&RuleAnalysis> {
        self.rules
            .iter()
            .filter(|rule| rule.is_always_matching(self.total_cases))
            .collect()
    }

    pub fn render(&self) -> String {
        let mut output = String::from("=== Rule Analysis Report ===\n");
        let _ = writeln!(output, "Test cases: {}", self.total_cases);
        for rule in &self.rules {
            let mut flags = Vec::new();
            if rule.is_dead() {
                flags.push("DEAD");
            }
            if rule.is_always_matching(self.total_cases) {
                flags.push("ALWAYS");
            }
            if rule.is_shadowed() {
                flags.push("SHADOWED");
            }
            let flags = if flags.is_empty() {
                String::new()
            } else {
                format!(" [{}]", flags.join(", "))
            };
            let _ = writeln!(
                output,
                "  {} (priority {}, action {}): matched {}/{}, selected {}{}",
                rule.rule_id,
                rule.priority,
                rule.action,
                rule.matched_count,
                self.total_cases,
                rule.selected_count,
                flags
            );
        }
        let _ = writeln!(output, "Default action used: {}", self.default_cases.len());
        output
    }
}

/// Runs a selector's rules against scenario batteries.
pub struct RuleAnalyzer<'a, C> {
    selector: &'a ActionSelector<C>,
}

impl<'a, C> RuleAnalyzer<'a, C> {
    pub fn new(selector: &'a ActionSelector<C>) -> Self {
        Self { selector }
    }

    /// Evaluates every rule against every case without touching selection metrics.
    pub fn analyze(&self, cases: &[AnalysisCase<C>]) -> AnalysisReport {
        let mut rules: Vec<RuleAnalysis> = self
            .selector
            .entries()
            .iter()
            .map(|entry| RuleAnalysis {
                rule_id: entry.id().to_string(),
                rule_name: entry.name().to_string(),
                priority: entry.priority(),
                action: entry.action().to_string(),
                matched_count: 0,
                selected_count: 0,
                matched_cases: Vec::new(),
            })
            .collect();
        let mut default_cases = Vec::new();

        for case in cases {
            let mut index = 0;
            let mut selected = false;
            self.selector.walk(&case.context, |_, matched| {
                if matched {
                    let analysis = &mut rules[index];
                    analysis.matched_count += 1;
                    analysis.matched_cases.push(case.label.clone());
                    if !selected {
                        analysis.selected_count += 1;
                        selected = true;
                    }
                }
                index += 1;
                ControlFlow::Continue(())
            });

            if !selected {
                default_cases.push(case.label.clone());
            }
        }

        AnalysisReport {
            total_cases: cases.len(),
            rules,
            default_cases,
        }
    }

    pub fn analyze_generated<G>(&self, generator: &G, variant: ScenarioVariant) -> AnalysisReport
    where
        G: ScenarioGenerator<C>,
    {
        self.analyze(&generator.generate(variant))
    }
}
