//! Loader for rule definitions.
//!
//! The native format is line oriented:
//!
//! ```text
//! # comment
//! [RULE]
//! Id=raise_funds
//! Name=Raise funds
//! Priority=80
//! Condition=wealth<100
//! Condition=phase==early
//! Action=collect
//! ```
//!
//! Files ending in `.yaml`, `.yml` or `.json` hold serialized
//! [`AgentRuleDefinition`] documents instead.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::definition::{AgentRuleDefinition, ConditionDefinition};
use crate::error::RuleError;
use crate::property::{ComparisonOperator, PropertyValue};

const BLOCK_HEADER: &str = "[RULE]";
const INLINE_SOURCE: &str = "<inline>";
const TEXT_EXTENSIONS: [&str; 3] = ["rules", "cfg", "txt"];
const DOCUMENT_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Parses rule config text and rule files into [`AgentRuleDefinition`]s.
pub struct RuleConfigLoader;

impl RuleConfigLoader {
    /// Parses config text. Blank or comment-only input yields no rules.
    pub fn parse(text: &str) -> Result<Vec<AgentRuleDefinition>, RuleError> {
        Self::parse_named(text, INLINE_SOURCE)
    }

    /// Parses config text, naming `source_name` in any error.
    pub fn parse_named(
        text: &str,
        source_name: &str,
    ) -> Result<Vec<AgentRuleDefinition>, RuleError> {
        let mut rules = Vec::new();
        let mut pending: Option<PendingBlock> = None;

        for (index, raw_line) in text.lines().enumerate() {
            let line_number = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.eq_ignore_ascii_case(BLOCK_HEADER) {
                if let Some(block) = pending.take() {
                    rules.push(block.finish()?);
                }
                pending = Some(PendingBlock::new(line_number));
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(RuleError::parse_error(
                    source_name,
                    line_number,
                    format!("expected `Key=Value`, found `{line}`"),
                ));
            };

            let Some(block) = pending.as_mut() else {
                return Err(RuleError::parse_error(
                    source_name,
                    line_number,
                    format!("`{}` appears outside of a {BLOCK_HEADER} block", key.trim()),
                ));
            };

            block.apply(key.trim(), value.trim(), source_name, line_number)?;
        }

        if let Some(block) = pending.take() {
            rules.push(block.finish()?);
        }

        deduplicate(&rules)?;
        Ok(rules)
    }

    /// Loads rules from a file or from every supported file in a directory.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Vec<AgentRuleDefinition>, RuleError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RuleError::MissingPath(path.display().to_string()));
        }

        let rules = if path.is_dir() {
            load_from_directory(path)?
        } else {
            load_from_file(path)?
        };

        deduplicate(&rules)?;
        info!(path = %path.display(), rules = rules.len(), "loaded rule definitions");
        Ok(rules)
    }
}

struct PendingBlock {
    header_line: usize,
    id: Option<String>,
    name: Option<String>,
    priority: i32,
    description: String,
    conditions: Vec<ConditionDefinition>,
    action: Option<String>,
}

impl PendingBlock {
    fn new(header_line: usize) -> Self {
        Self {
            header_line,
            id: None,
            name: None,
            priority: 0,
            description: String::new(),
            conditions: Vec::new(),
            action: None,
        }
    }

    fn apply(
        &mut self,
        key: &str,
        value: &str,
        source_name: &str,
        line: usize,
    ) -> Result<(), RuleError> {
        match key.to_ascii_lowercase().as_str() {
            "id" => self.id = Some(value.to_string()).filter(|id| !id.is_empty()),
            "name" => self.name = Some(value.to_string()),
            "description" => self.description = value.to_string(),
            "priority" => {
                self.priority = value.parse().map_err(|_| {
                    RuleError::parse_error(
                        source_name,
                        line,
                        format!("priority `{value}` is not an integer"),
                    )
                })?;
            }
            "condition" => {
                let condition = parse_condition(value).ok_or_else(|| {
                    RuleError::parse_error(
                        source_name,
                        line,
                        format!("condition `{value}` is not `<property><operator><value>`"),
                    )
                })?;
                self.conditions.push(condition);
            }
            "action" => self.action = Some(value.to_string()).filter(|action| !action.is_empty()),
            _ => warn!(source = source_name, line, key, "ignoring unknown rule key"),
        }
        Ok(())
    }

    fn finish(self) -> Result<AgentRuleDefinition, RuleError> {
        let id = self.id.ok_or(RuleError::MissingField {
            line: self.header_line,
            field: "Id",
        })?;
        let recommended_action = self.action.ok_or(RuleError::MissingField {
            line: self.header_line,
            field: "Action",
        })?;

        Ok(AgentRuleDefinition {
            name: self.name.unwrap_or_else(|| id.clone()),
            id,
            priority: self.priority,
            description: self.description,
            conditions: self.conditions,
            recommended_action,
        })
    }
}

/// Splits `wealth>=100` into property, operator and literal.
///
/// A lone `=` is accepted as equality, but not when it is followed by another
/// operator character such as `=>` or `=<`.
fn parse_condition(raw: &str) -> Option<ConditionDefinition> {
    let split_at = raw.find(|ch: char| matches!(ch, '=' | '!' | '<' | '>'))?;
    let property_name = raw[..split_at].trim();
    if property_name.is_empty() {
        return None;
    }

    let rest = &raw[split_at..];
    let (operator, token_len) = ComparisonOperator::TOKENS
        .iter()
        .find(|(token, _)| rest.starts_with(token))
        .map(|(token, operator)| (*operator, token.len()))
        .or_else(|| rest.starts_with('=').then_some((ComparisonOperator::Eq, 1)))?;

    let literal = rest[token_len..].trim();
    if literal.is_empty() || literal.starts_with(['=', '<', '>', '!']) {
        return None;
    }

    Some(ConditionDefinition::new(
        property_name,
        operator,
        PropertyValue::parse_literal(literal),
    ))
}

fn load_from_directory(path: &Path) -> Result<Vec<AgentRuleDefinition>, RuleError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(|err| RuleError::from_io(path, err))? {
        let entry = entry.map_err(|err| RuleError::from_io(path, err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| RuleError::from_io(entry.path(), err))?;
        if file_type.is_dir() {
            continue;
        }
        if extension(&entry.path()).is_some_and(|ext| is_supported(&ext)) {
            files.push(entry.path());
        }
    }

    files.sort();
    let mut rules = Vec::new();
    for file in files {
        rules.append(&mut load_from_file(&file)?);
    }
    Ok(rules)
}

fn load_from_file(path: &Path) -> Result<Vec<AgentRuleDefinition>, RuleError> {
    let raw = fs::read_to_string(path).map_err(|err| RuleError::from_io(path, err))?;
    let source_name = path.display().to_string();

    match extension(path) {
        Some(ext) if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) => {
            parse_document(&raw, &source_name)
        }
        _ => RuleConfigLoader::parse_named(&raw, &source_name),
    }
}

fn parse_document(raw: &str, source_name: &str) -> Result<Vec<AgentRuleDefinition>, RuleError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    let rules = deserialize_document(raw, source_name)?;
    for (index, rule) in rules.iter().enumerate() {
        let field = if rule.id.trim().is_empty() {
            "id"
        } else if rule.recommended_action.trim().is_empty() {
            "recommended_action"
        } else {
            continue;
        };
        return Err(RuleError::parse_error(
            source_name,
            0,
            format!("rule #{} has an empty `{field}`", index + 1),
        ));
    }
    Ok(rules)
}

fn deserialize_document(
    raw: &str,
    source_name: &str,
) -> Result<Vec<AgentRuleDefinition>, RuleError> {
    let mut attempts = Vec::new();

    if let Ok(doc) = serde_yaml::from_str::<RuleDocument>(raw) {
        return Ok(doc.rules);
    }

    attempts.push("rules document");

    if let Ok(list) = serde_yaml::from_str::<Vec<AgentRuleDefinition>>(raw) {
        return Ok(list);
    }

    attempts.push("list");

    if let Ok(rule) = serde_yaml::from_str::<AgentRuleDefinition>(raw) {
        return Ok(vec![rule]);
    }

    attempts.push("single");

    let message = format!("unable to parse rules file using {:?} formats", attempts);
    Err(RuleError::parse_error(source_name, 0, message))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|value| value.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_supported(ext: &str) -> bool {
    TEXT_EXTENSIONS.contains(&ext) || DOCUMENT_EXTENSIONS.contains(&ext)
}

fn deduplicate(rules: &[AgentRuleDefinition]) -> Result<(), RuleError> {
    let mut seen = HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(RuleError::DuplicateRule {
                id: rule.id.clone(),
            });
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RuleDocument {
    rules: Vec<AgentRuleDefinition>,
}
