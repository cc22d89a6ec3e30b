use std::path::{Path, PathBuf};
use std::time::Duration;

use errand_shared::toolbelts::github::GITHUB_API_BASE;
use errand_shared::toolbelts::weather::WTTR_BASE;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_DATABASE: &str = "db_agents.db";
pub const DEFAULT_MAX_STEPS: usize = 8;

const GROQ_MODELS: &[&str] = &[
    "llama-3.1-8b-instant",
    "llama-3.3-70b-versatile",
    "gemma2-9b-it",
];
const OLLAMA_MODELS: &[&str] = &["qwen3:8b"];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Any OpenAI-compatible `/chat/completions` endpoint (Groq by default).
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Candidate models, tried in order until one answers.
    pub models: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub database: PathBuf,
    pub output_dir: PathBuf,
    pub github_token: Option<String>,
    pub github_api_base: String,
    pub weather_base_url: String,
    pub max_steps: usize,
}

impl Config {
    /// Reads `.env` (if present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Could not read .env: {}", e);
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let provider = match var("LLM_PROVIDER").as_deref().map(str::to_lowercase).as_deref() {
            None | Some("groq") | Some("openai") => Provider::OpenAi,
            Some("ollama") => Provider::Ollama,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LLM_PROVIDER",
                    reason: format!("unknown provider '{}' (expected groq, openai or ollama)", other),
                });
            }
        };

        let (default_base, default_models) = match provider {
            Provider::OpenAi => (GROQ_BASE_URL, GROQ_MODELS),
            Provider::Ollama => (OLLAMA_BASE_URL, OLLAMA_MODELS),
        };

        let models = match var("LLM_MODELS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(String::from)
                .collect(),
            None => default_models.iter().map(|m| m.to_string()).collect(),
        };

        let timeout_secs = parse_number(&var, "LLM_TIMEOUT_SECS", 60)?;
        let max_steps = parse_number(&var, "AGENT_MAX_STEPS", DEFAULT_MAX_STEPS)?;
        if max_steps == 0 {
            return Err(ConfigError::Invalid {
                name: "AGENT_MAX_STEPS",
                reason: "must be at least 1".to_string(),
            });
        }

        let database = match var("DATABASE_URL").or_else(|| var("DATABASE")) {
            Some(raw) => database_path(&raw)?,
            None => PathBuf::from(DEFAULT_DATABASE),
        };
        let output_dir = match var("OUTPUT_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => default_output_dir(&database),
        };

        Ok(Self {
            llm: LlmConfig {
                provider,
                base_url: var("LLM_BASE_URL").unwrap_or_else(|| default_base.to_string()),
                api_key: var("GROQ_API_KEY").or_else(|| var("LLM_API_KEY")),
                models,
                timeout: Duration::from_secs(timeout_secs),
            },
            database,
            output_dir,
            github_token: var("GITHUB_TOKEN"),
            github_api_base: var("GITHUB_API_BASE").unwrap_or_else(|| GITHUB_API_BASE.to_string()),
            weather_base_url: var("WEATHER_BASE_URL").unwrap_or_else(|| WTTR_BASE.to_string()),
            max_steps,
        })
    }

    pub fn github_token(&self) -> Result<&str, ConfigError> {
        self.github_token
            .as_deref()
            .ok_or(ConfigError::Missing("GITHUB_TOKEN"))
    }
}

fn parse_number<F, T>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match var(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("'{}' is not a number", raw),
        }),
        None => Ok(default),
    }
}

/// Accepts a plain path or an SQLAlchemy-style `sqlite:///path` URL.
///
/// Three slashes give a relative path, four an absolute one.
pub fn database_path(raw: &str) -> Result<PathBuf, ConfigError> {
    let path = match raw.split_once("://") {
        None => raw,
        Some(("sqlite", rest)) => rest.strip_prefix('/').unwrap_or(rest),
        Some((scheme, _)) => {
            return Err(ConfigError::Invalid {
                name: "DATABASE_URL",
                reason: format!("unsupported scheme '{}', only sqlite databases are supported", scheme),
            });
        }
    };

    if path.is_empty() {
        return Err(ConfigError::Invalid {
            name: "DATABASE_URL",
            reason: "no database file given".to_string(),
        });
    }

    Ok(PathBuf::from(path))
}

/// Results are written next to the database file.
fn default_output_dir(database: &Path) -> PathBuf {
    match database.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_target_groq() {
        let config = config(&[]).unwrap();

        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.llm.base_url, GROQ_BASE_URL);
        assert_eq!(config.llm.models[0], "llama-3.1-8b-instant");
        assert_eq!(config.llm.timeout, Duration::from_secs(60));
        assert_eq!(config.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.max_steps, DEFAULT_MAX_STEPS);
        assert_eq!(config.github_token(), Err(ConfigError::Missing("GITHUB_TOKEN")));
    }

    #[test]
    fn ollama_switches_defaults() {
        let config = config(&[("LLM_PROVIDER", "Ollama")]).unwrap();

        assert_eq!(config.llm.provider, Provider::Ollama);
        assert_eq!(config.llm.base_url, OLLAMA_BASE_URL);
        assert_eq!(config.llm.models, vec!["qwen3:8b".to_string()]);
    }

    #[test]
    fn explicit_values_win() {
        let config = config(&[
            ("GROQ_API_KEY", "gsk_abc"),
            ("LLM_MODELS", "a, b,,c"),
            ("DATABASE", "data/users.db"),
            ("GITHUB_TOKEN", "ghp_x"),
            ("AGENT_MAX_STEPS", "3"),
        ])
        .unwrap();

        assert_eq!(config.llm.api_key.as_deref(), Some("gsk_abc"));
        assert_eq!(config.llm.models, vec!["a", "b", "c"]);
        assert_eq!(config.output_dir, PathBuf::from("data"));
        assert_eq!(config.github_token(), Ok("ghp_x"));
        assert_eq!(config.max_steps, 3);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            config(&[("LLM_PROVIDER", "bard")]),
            Err(ConfigError::Invalid { name: "LLM_PROVIDER", .. })
        ));
        assert!(matches!(
            config(&[("LLM_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::Invalid { name: "LLM_TIMEOUT_SECS", .. })
        ));
        assert!(matches!(
            config(&[("AGENT_MAX_STEPS", "0")]),
            Err(ConfigError::Invalid { name: "AGENT_MAX_STEPS", .. })
        ));
    }

    #[test]
    fn parses_sqlite_urls() {
        assert_eq!(database_path("agents.db").unwrap(), PathBuf::from("agents.db"));
        assert_eq!(database_path("sqlite:///agents.db").unwrap(), PathBuf::from("agents.db"));
        assert_eq!(
            database_path("sqlite:////var/lib/agents.db").unwrap(),
            PathBuf::from("/var/lib/agents.db")
        );
        assert!(database_path("postgresql://localhost/agents").is_err());
        assert!(database_path("sqlite:///").is_err());
    }
}
