use std::env;
use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Reads `.env`, then installs the stderr subscriber.
///
/// `.env` goes first so `RUST_LOG` and `ERRAND_LOG_LEVEL` set there take effect.
pub fn init(log_level: Option<&str>, verbose: bool) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let dotenv = dotenvy::dotenv();

        let env_level = env::var("ERRAND_LOG_LEVEL").ok();
        let level = resolve_level(log_level, verbose, env_level.as_deref());
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(directives(level)));

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();

        if let Err(e) = dotenv {
            if !e.not_found() {
                tracing::warn!("Could not read .env: {}", e);
            }
        }
    });
}

/// `--log-level` wins over `--verbose`, which wins over `ERRAND_LOG_LEVEL`.
pub fn resolve_level(log_level: Option<&str>, verbose: bool, env_level: Option<&str>) -> Level {
    match (log_level, verbose) {
        (Some(level), _) => parse_level(level),
        (None, true) => Level::DEBUG,
        (None, false) => parse_level(env_level.unwrap_or("info")),
    }
}

pub fn directives(level: Level) -> String {
    format!(
        "errand={level},errand_engine={level},errand_shared={level},h2=warn,hyper=warn,reqwest=warn",
        level = level
    )
}

pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_take_precedence_over_the_environment() {
        assert_eq!(resolve_level(Some("error"), true, Some("trace")), Level::ERROR);
        assert_eq!(resolve_level(None, true, Some("warn")), Level::DEBUG);
        assert_eq!(resolve_level(None, false, Some("warn")), Level::WARN);
        assert_eq!(resolve_level(None, false, None), Level::INFO);
        assert_eq!(resolve_level(Some("loud"), false, None), Level::INFO);
    }

    #[test]
    fn level_from_a_dotenv_file_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "ERRAND_LOG_LEVEL_FROM_FILE=warn\n").unwrap();

        dotenvy::from_path(&path).unwrap();

        let from_file = env::var("ERRAND_LOG_LEVEL_FROM_FILE").ok();
        assert_eq!(resolve_level(None, false, from_file.as_deref()), Level::WARN);
    }

    #[test]
    fn directives_cover_every_crate() {
        let filter = directives(Level::DEBUG);
        assert!(filter.starts_with("errand=DEBUG,errand_engine=DEBUG,errand_shared=DEBUG"));
        assert!(filter.contains("reqwest=warn"));
    }
}
