use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::debug;

use arbiter_core::config::load_settings;
use arbiter_core::logging::{init_from_settings, init_tracing};
use arbiter_core::EngineSettings;
use arbiter_rules::{
    ActionSelector, AgentRuleDefinition, DebugTracer, PropertyBag, RuleAnalyzer,
    RuleConfigLoader, ScenarioGenerator, ScenarioSpace, ScenarioVariant,
};

mod output;

use output::{print_analysis, print_definitions, print_selection, print_trace};

#[derive(Parser)]
#[command(name = "arbiter")]
#[command(about = "Arbiter - prioritized rule evaluation toolkit", long_about = None)]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a rule file or directory and list its rules
    Validate {
        /// Rule file or directory
        path: PathBuf,
    },
    /// Print the action selected for a context
    Select(SelectArgs),
    /// Print the step-by-step decision for a context
    Trace(SelectArgs),
    /// Run the scenario battery and report rule coverage
    Analyze(AnalyzeArgs),
    /// Show version information
    Version,
}

#[derive(Args)]
struct RuleSource {
    /// Rule file or directory (defaults to ARBITER_RULES_PATH)
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Action returned when no rule matches (defaults to ARBITER_DEFAULT_ACTION)
    #[arg(long)]
    default_action: Option<String>,
}

#[derive(Args)]
struct SelectArgs {
    #[command(flatten)]
    source: RuleSource,
    /// Context as a JSON object, or @path to a JSON file
    #[arg(long)]
    context: String,
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(flatten)]
    source: RuleSource,
    /// Add a resource/pressure sweep for every phase
    #[arg(long, default_value_t = false)]
    extended: bool,
    /// Fail when a rule never matches
    #[arg(long, default_value_t = false)]
    deny_dead: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings()?;
    match cli.log_level.as_deref() {
        Some(level) => init_tracing(Some(level))?,
        None => init_from_settings(&settings)?,
    }

    match cli.command {
        Commands::Validate { path } => {
            let definitions = load_definitions(&path)?;
            print_definitions(&path, &definitions);
        }
        Commands::Select(args) => {
            let selector = build_selector(&args.source, &settings)?;
            let context = parse_context(&args.context)?;
            print_selection(&selector.select(&context));
        }
        Commands::Trace(args) => {
            let selector = build_selector(&args.source, &settings)?;
            let context = parse_context(&args.context)?;
            let trace = DebugTracer::from_settings(&settings).trace(&selector, &context);
            print_trace(&trace);
        }
        Commands::Analyze(args) => {
            let selector = build_selector(&args.source, &settings)?;
            let variant = if args.extended {
                ScenarioVariant::Extended
            } else {
                ScenarioVariant::Base
            };
            let cases = ScenarioSpace::default().generate(variant);
            let report = RuleAnalyzer::new(&selector).analyze(&cases);
            print_analysis(&report);

            let dead = report.dead_rules();
            if args.deny_dead && !dead.is_empty() {
                let ids: Vec<&str> = dead.iter().map(|rule| rule.rule_id.as_str()).collect();
                bail!("rules never matched: {}", ids.join(", "));
            }
        }
        Commands::Version => {
            println!("Arbiter v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn resolve_rules_path(source: &RuleSource, settings: &EngineSettings) -> Result<PathBuf> {
    match &source.rules {
        Some(path) => Ok(path.clone()),
        None => Ok(settings.require_rules_path()?.clone()),
    }
}

fn load_definitions(path: &Path) -> Result<Vec<AgentRuleDefinition>> {
    let definitions = RuleConfigLoader::load_path(path)
        .with_context(|| format!("failed to load rules from {}", path.display()))?;
    debug!(path = %path.display(), count = definitions.len(), "loaded rule definitions");
    Ok(definitions)
}

fn build_selector(
    source: &RuleSource,
    settings: &EngineSettings,
) -> Result<ActionSelector<PropertyBag>> {
    let path = resolve_rules_path(source, settings)?;
    let default_action = source
        .default_action
        .clone()
        .unwrap_or_else(|| settings.default_action.clone());
    Ok(ActionSelector::new(default_action).with_definitions(load_definitions(&path)?))
}

/// Parses `--context`: inline JSON, or `@path` naming a JSON file.
fn parse_context(raw: &str) -> Result<PropertyBag> {
    let text = match raw.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read context file {path}"))?,
        None => raw.to_string(),
    };
    let value: serde_json::Value =
        serde_json::from_str(&text).context("context is not valid JSON")?;
    PropertyBag::from_json(&value).ok_or_else(|| anyhow!("context must be a JSON object"))
}
