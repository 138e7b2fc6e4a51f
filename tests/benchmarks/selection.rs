// Benchmark comparing first-match selection, full engine execution and config parsing.
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use arbiter::prelude::*;
use arbiter::RuleConfigLoader;

fn definitions(count: usize) -> Vec<AgentRuleDefinition> {
    (0..count)
        .map(|index| {
            AgentRuleDefinition::new(format!("rule_{index}"), index as i32, format!("action_{index}"))
                .with_condition(ConditionDefinition::new(
                    "wealth",
                    ComparisonOperator::Gt,
                    (index * 100) as f64,
                ))
                .with_condition(ConditionDefinition::equals("phase", "mid"))
        })
        .collect()
}

fn config_text(count: usize) -> String {
    (0..count)
        .map(|index| {
            format!(
                "[RULE]\nId=rule_{index}\nPriority={index}\nCondition=wealth>{}\nCondition=phase=mid\nAction=action_{index}\n",
                index * 100
            )
        })
        .collect()
}

fn selection_benchmarks(c: &mut Criterion) {
    let selector = ActionSelector::<PropertyBag>::new("wait").with_definitions(definitions(64));
    let early_hit = PropertyBag::new().with("wealth", 1_000_000.0).with("phase", "mid");
    let miss = PropertyBag::new().with("wealth", 0.0).with("phase", "late");

    c.bench_function("select_first_rule_matches", |b| {
        b.iter(|| black_box(selector.select(black_box(&early_hit))));
    });

    c.bench_function("select_falls_back_to_default", |b| {
        b.iter(|| black_box(selector.select(black_box(&miss))));
    });

    let mut engine = RuleEngine::new();
    for definition in definitions(64) {
        engine.register_rule(definition.compile::<PropertyBag>());
    }
    c.bench_function("engine_execute_all_rules", |b| {
        b.iter(|| black_box(engine.execute(black_box(&early_hit))));
    });

    let text = config_text(64);
    c.bench_function("parse_rule_config", |b| {
        b.iter(|| RuleConfigLoader::parse(black_box(&text)).expect("valid config"));
    });
}

criterion_group!(benches, selection_benchmarks);
criterion_main!(benches);
