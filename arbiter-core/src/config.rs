use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{ArbiterError, ConfigError};

/// Fallback action returned when no rule matches.
pub const DEFAULT_ACTION: &str = "wait";

/// Context properties summarised at the top of a decision trace.
pub const DEFAULT_TRACE_KEYS: [&str; 2] = ["phase", "wealth"];

/// Runtime environment used by the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// Settings shared by the engine components and the command-line tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub environment: Environment,
    pub default_action: String,
    pub rules_path: Option<PathBuf>,
    pub trace_keys: Vec<String>,
    pub log_level: Option<String>,
    pub async_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            default_action: DEFAULT_ACTION.to_string(),
            rules_path: None,
            trace_keys: DEFAULT_TRACE_KEYS.iter().map(|key| key.to_string()).collect(),
            log_level: None,
            async_delay: Duration::ZERO,
        }
    }
}

impl EngineSettings {
    /// Loads settings from the process environment using the `ARBITER_` prefix.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with_prefix("ARBITER_")
    }

    /// Loads settings from env vars prefixed with the provided value (e.g. `GAME_`).
    pub fn from_env_with_prefix(prefix: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let key = |suffix: &str| format!("{}{}", prefix, suffix);
        let defaults = Self::default();

        let environment = env::var(key("ENV"))
            .map(|raw| Environment::from_str(&raw))
            .unwrap_or_default();

        let default_action = env::var(key("DEFAULT_ACTION"))
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .unwrap_or(defaults.default_action);

        let rules_path = env::var(key("RULES_PATH")).ok().map(PathBuf::from);

        let trace_keys = env::var(key("TRACE_KEYS"))
            .map(|raw| parse_list(&raw))
            .unwrap_or(defaults.trace_keys);

        let log_level = env::var(key("LOG")).ok();

        let delay_key = key("ASYNC_DELAY_MS");
        let async_delay = match env::var(&delay_key) {
            Ok(raw) => {
                let millis = raw
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidEnvVar {
                        key: delay_key.clone(),
                        value: raw.clone(),
                    })?;
                Duration::from_millis(millis)
            }
            Err(_) => defaults.async_delay,
        };

        Ok(Self {
            environment,
            default_action,
            rules_path,
            trace_keys,
            log_level,
            async_delay,
        })
    }

    /// Returns the configured rules path or reports the missing variable.
    pub fn require_rules_path(&self) -> Result<&PathBuf, ConfigError> {
        self.rules_path
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("ARBITER_RULES_PATH".into()))
    }

    /// Whether the process is running in production.
    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Helper that loads settings and converts to the canonical Arbiter error type.
pub fn load_settings() -> Result<EngineSettings, ArbiterError> {
    Ok(EngineSettings::from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_defaults_for_unset_prefix() {
        let cfg = EngineSettings::from_env_with_prefix("ARBITER_TEST_UNSET_").expect("settings");
        assert_eq!(cfg.environment, Environment::Development);
        assert_eq!(cfg.default_action, "wait");
        assert_eq!(cfg.trace_keys, vec!["phase", "wealth"]);
        assert_eq!(cfg.async_delay, Duration::ZERO);
        assert!(cfg.require_rules_path().is_err());
    }

    #[test]
    fn reads_prefixed_variables() {
        std::env::set_var("ARBITER_TEST_A_ENV", "prod");
        std::env::set_var("ARBITER_TEST_A_DEFAULT_ACTION", " hold ");
        std::env::set_var("ARBITER_TEST_A_TRACE_KEYS", "phase, heat,,");
        std::env::set_var("ARBITER_TEST_A_ASYNC_DELAY_MS", "250");
        std::env::set_var("ARBITER_TEST_A_RULES_PATH", "rules/agents.rules");

        let cfg = EngineSettings::from_env_with_prefix("ARBITER_TEST_A_").expect("settings");
        assert!(cfg.is_production());
        assert_eq!(cfg.default_action, "hold");
        assert_eq!(cfg.trace_keys, vec!["phase", "heat"]);
        assert_eq!(cfg.async_delay, Duration::from_millis(250));
        assert_eq!(
            cfg.require_rules_path().expect("path"),
            &PathBuf::from("rules/agents.rules")
        );
    }

    #[test]
    fn rejects_non_numeric_delay() {
        std::env::set_var("ARBITER_TEST_B_ASYNC_DELAY_MS", "soon");
        let err = EngineSettings::from_env_with_prefix("ARBITER_TEST_B_").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar { .. }));
    }
}
