//! Process-wide tracing setup.
//!
//! The subscriber starts at the default level so that configuration loading
//! is already logged; `logging.level` replaces it once the file is read. A
//! non-blank `RUST_LOG` always wins over the file.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();
static ENV_DIRECTIVE: OnceLock<Option<String>> = OnceLock::new();

/// Where the active log filter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelSource {
    Environment,
    Config,
}

fn select_directive<'a>(env: Option<&'a str>, configured: &'a str) -> (&'a str, LevelSource) {
    match env.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directive) => (directive, LevelSource::Environment),
        None => (configured, LevelSource::Config),
    }
}

pub fn init_tracing() {
    let env = std::env::var("RUST_LOG").ok();
    let default_level = LoggingConfig::default().level;
    let (directive, _) = select_directive(env.as_deref(), &default_level);
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("Warning: ignoring invalid RUST_LOG '{directive}': {e}");
        EnvFilter::new(&default_level)
    });
    let _ = ENV_DIRECTIVE.set(env);

    let (reload_layer, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(false))
        .try_init();
}

/// Switches to the configured level unless `RUST_LOG` was given.
pub fn apply_logging(config: &LoggingConfig) -> LevelSource {
    let env = ENV_DIRECTIVE.get().and_then(|d| d.as_deref());
    let (directive, source) = select_directive(env, &config.level);
    if source == LevelSource::Config {
        if let Some(handle) = FILTER_HANDLE.get() {
            let level = directive.to_ascii_lowercase();
            let _ = handle.modify(|f| *f = EnvFilter::new(&level));
        }
    }
    tracing::debug!(filter = directive, source = ?source, "Log filter applied");
    source
}
