use std::path::Path;

use colored::*;

use arbiter_rules::{AgentRuleDefinition, AnalysisReport, DecisionTrace, Selection};

pub fn print_definitions(path: &Path, definitions: &[AgentRuleDefinition]) {
    println!(
        "{} {} ({} rule(s))",
        "✔ Rules loaded:".green().bold(),
        path.display().to_string().bold(),
        definitions.len()
    );
    for definition in definitions {
        println!(
            "  [{:>4}] {} -> {}",
            definition.priority,
            definition.id.bold(),
            definition.recommended_action.cyan()
        );
        if definition.name != definition.id {
            println!("         name: {}", definition.name);
        }
        if definition.conditions.is_empty() {
            println!("         always matches");
        }
        for condition in &definition.conditions {
            println!("         when {condition}");
        }
    }
}

pub fn print_selection(selection: &Selection) {
    match (&selection.rule_id, selection.priority) {
        (Some(rule_id), Some(priority)) => println!(
            "{} {} (rule {}, priority {})",
            "Selected:".green().bold(),
            selection.action.bold(),
            rule_id,
            priority
        ),
        _ => println!(
            "{} {} (no rule matched)",
            "Default:".yellow().bold(),
            selection.action.bold()
        ),
    }
}

pub fn print_trace(trace: &DecisionTrace) {
    for line in &trace.lines {
        if line.starts_with("[MATCH]") {
            println!("{}", line.green());
        } else if line.starts_with("=>") {
            println!("{}", line.bold());
        } else {
            println!("{line}");
        }
    }
}

pub fn print_analysis(report: &AnalysisReport) {
    for line in report.render().lines() {
        if line.contains("[DEAD") {
            println!("{}", line.red());
        } else if line.contains("SHADOWED") {
            println!("{}", line.yellow());
        } else {
            println!("{line}");
        }
    }
}
