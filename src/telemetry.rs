//! Tracing initialisation.
//!
//! - `LOG_LEVEL` sets the filter, e.g. `"info"` or
//!   `"info,generator=debug,session=debug"`. An unset or unparsable value
//!   falls back to [`DEFAULT_FILTER`].
//! - `LOG_FORMAT=json` switches to JSON lines; anything else is the default
//!   human-readable format.

use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Round and progress events at info; per-batch generator chatter and
/// store write noise only when something goes wrong.
pub const DEFAULT_FILTER: &str =
    "warn,arith_drill_gen=info,curriculum=info,session=info,ledger=info,generator=warn,persistence=warn";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// `LOG_LEVEL` directives if they parse, [`DEFAULT_FILTER`] otherwise.
pub fn filter_from(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. A second call leaves the first one in place.
pub fn init_tracing() {
    let level = std::env::var("LOG_LEVEL").ok();
    let format = LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter_from(level.as_deref()))
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    if installed.is_err() {
        debug!(target: "arith_drill_gen", "Tracing subscriber already installed.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn default_filter_parses_and_covers_engine_targets() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        for target in ["curriculum", "session", "ledger", "generator", "persistence"] {
            assert!(DEFAULT_FILTER.contains(&format!("{target}=")), "{target} missing");
        }
    }

    #[test]
    fn bad_directives_fall_back_to_default() {
        assert_eq!(filter_from(None).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(filter_from(Some("generator=loud")).max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(filter_from(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn only_json_selects_json() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Pretty);
        assert_eq!(LogFormat::parse(None), LogFormat::Pretty);
    }
}
