use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::SubscriberBuilder;

use crate::config::EngineSettings;
use crate::errors::{ArbiterError, Result};

const FALLBACK_LEVEL: &str = "info";

/// Installs the global subscriber for the engine and its tools.
///
/// `RUST_LOG` wins over `level`; without either, `info` is used. Colours are
/// only emitted when stdout is a terminal.
pub fn init_tracing(level: Option<&str>) -> Result<()> {
    install(level, atty::is(atty::Stream::Stdout), true)
}

/// Same as [`init_tracing`] but driven by [`EngineSettings`]. Production
/// output drops colours and module targets.
pub fn init_from_settings(settings: &EngineSettings) -> Result<()> {
    let production = settings.is_production();
    let ansi = !production && atty::is(atty::Stream::Stdout);
    install(settings.log_level.as_deref(), ansi, !production)
}

fn install(level: Option<&str>, ansi: bool, with_target: bool) -> Result<()> {
    SubscriberBuilder::default()
        .with_env_filter(filter_for(level))
        .with_target(with_target)
        .with_ansi(ansi)
        .try_init()
        .map_err(|err| ArbiterError::General(format!("tracing already initialised: {err}")))
}

fn filter_for(level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.map(str::trim).filter(|level| !level.is_empty());
        EnvFilter::try_new(level.unwrap_or(FALLBACK_LEVEL))
            .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LEVEL))
    })
}
