use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::{Directive, ParseError};
use tracing_subscriber::EnvFilter;

/// Directives appended below the configured level so HTTP plumbing does not
/// drown out the case-workflow events the operators actually watch.
const QUIET_DEPENDENCIES: &[&str] = &["hyper=warn", "tower=warn", "mio=warn"];

#[derive(Debug)]
pub enum TelemetryError {
    Filter { directive: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::Filter { directive, .. } => {
                write!(f, "invalid tracing directive '{directive}'")
            }
            TelemetryError::Subscriber(err) => {
                write!(f, "failed to install tracing subscriber: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::Filter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

/// Build the service filter. An explicit `RUST_LOG` wins outright; otherwise
/// the configured level applies crate-wide with noisy transport dependencies
/// capped at `warn`.
pub fn triage_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter =
        EnvFilter::try_new(&config.log_level).map_err(|source| TelemetryError::Filter {
            directive: config.log_level.clone(),
            source,
        })?;
    for directive in QUIET_DEPENDENCIES {
        let parsed = directive
            .parse::<Directive>()
            .map_err(|source| TelemetryError::Filter {
                directive: (*directive).to_string(),
                source,
            })?;
        filter = filter.add_directive(parsed);
    }
    Ok(filter)
}

pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    tracing_subscriber::fmt()
        .with_env_filter(triage_filter(config)?)
        .with_target(true)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn filter_carries_the_configured_level_and_quiets_transport_crates() {
        env::remove_var("RUST_LOG");
        let config = TelemetryConfig {
            log_level: "debug".to_string(),
        };
        let rendered = triage_filter(&config)
            .expect("filter builds from a valid level")
            .to_string();
        assert!(rendered.contains("debug"));
        assert!(rendered.contains("hyper=warn"));
        assert!(rendered.contains("tower=warn"));
    }

    #[test]
    fn rejects_a_malformed_level() {
        env::remove_var("RUST_LOG");
        let config = TelemetryConfig {
            log_level: "definitely not a level".to_string(),
        };
        let error = triage_filter(&config).expect_err("malformed level rejected");
        assert!(matches!(error, TelemetryError::Filter { .. }));
    }
}
