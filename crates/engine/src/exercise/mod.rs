pub mod fallback;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use errand_shared::db::Db;
use errand_shared::toolbelts::{Archivist, Calculator, GitHub, Weather};
use errand_shared::{ToolBelt, ToolRegistry};
use tracing::{info, warn};

use crate::agent::{AgentExecutor, AgentOutcome};
use crate::config::Config;
use crate::llm::ChatBackend;

const TOOL_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// MACRO DEFINITION
// ============================================================================

macro_rules! define_exercises {
    (
        $(
            $variant:ident {
                title: $title:literal,
                description: $desc:literal,
                instructions: $instructions:literal,
                queries: [$($query:literal),* $(,)?],
            }
        ),* $(,)?
    ) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum Exercise {
            $($variant),*
        }

        impl Exercise {
            pub fn title(&self) -> &'static str {
                match self {
                    $(Exercise::$variant => $title),*
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $(Exercise::$variant => $desc),*
                }
            }

            /// System prompt handed to the agent
            pub fn instructions(&self) -> &'static str {
                match self {
                    $(Exercise::$variant => $instructions),*
                }
            }

            /// Queries run when none is given on the command line
            pub fn default_queries(&self) -> &'static [&'static str] {
                match self {
                    $(Exercise::$variant => &[$($query),*]),*
                }
            }
        }
    };
}

// ============================================================================
// EXERCISE DEFINITIONS
// ============================================================================

define_exercises! {
    Weather {
        title: "weather",
        description: "Weather lookup and arithmetic",
        instructions: "You are a helpful assistant. Use the available tools to answer questions. \
                       Use get_weather for weather questions and calculate for arithmetic.",
        queries: [
            "Calculate 15 * 7 + 23",
            "What's the weather in Lagos?",
        ],
    },
    Sql {
        title: "sql",
        description: "SQL queries plus reading and writing result files",
        instructions: "You are a helpful assistant. Use the available tools to answer questions. \
                       If you are asked to write a query result to a file, use the write_query_result tool \
                       and make its input 'SQL: <your_sql_query>'. If you are asked to read a file, use read_file.",
        queries: [
            "Find out how many users are in the database and write the result to a file. \
             The SQL query to count users is 'SELECT COUNT(*) FROM users;'. \
             Use the write_query_result tool with the format 'SQL: <your_sql_query>'.",
            "Read the file 'db_result.txt'",
        ],
    },
    Github {
        title: "github",
        description: "GitHub repository search and issue management",
        instructions: "You are a helpful assistant. Use the available tools to answer questions. \
                       Always use the exact 'owner/repo_name' format when a tool asks for a repository.",
        queries: [
            "First, search for GitHub repositories related to 'microsoft/vscode'. \
             From the search results, identify the main 'microsoft/vscode' repository. \
             Then, get detailed information about that specific 'microsoft/vscode' repository. \
             Finally, list the open issues for the 'microsoft/vscode' repository.",
        ],
    },
}

// ============================================================================
// EXERCISE IMPLEMENTATION
// ============================================================================

impl Exercise {
    /// Toolbelts this exercise hands to the agent, built from configuration.
    pub fn toolbelts(&self, config: &Config) -> Result<Vec<Box<dyn ToolBelt>>> {
        Ok(match self {
            Exercise::Weather => vec![
                Box::new(Calculator),
                Box::new(Weather::new(&config.weather_base_url, TOOL_TIMEOUT)?),
            ],
            Exercise::Sql => {
                let db = Db::open(&config.database)?;
                vec![Box::new(Archivist::new(db, &config.output_dir))]
            }
            Exercise::Github => {
                let token = config.github_token()?;
                vec![Box::new(GitHub::new(&config.github_api_base, token, TOOL_TIMEOUT)?)]
            }
        })
    }

    pub fn registry(&self, config: &Config) -> Result<ToolRegistry> {
        let registry = ToolRegistry::new(self.toolbelts(config)?)?;
        info!(exercise = self.title(), tools = ?registry.names(), "tool registry ready");
        Ok(registry)
    }

    pub fn executor(
        &self,
        config: &Config,
        backend: Arc<dyn ChatBackend>,
        verbose: bool,
    ) -> Result<AgentExecutor> {
        Ok(AgentExecutor::new(backend, self.registry(config)?)
            .with_system_prompt(self.instructions())
            .with_max_steps(config.max_steps)
            .verbose(verbose))
    }

    /// Runs `queries` (or the defaults) in order and prints each answer.
    ///
    /// The first agent failure stops the sequence and switches to calling the
    /// tools directly, where the exercise has such a fallback.
    pub async fn run(
        &self,
        config: &Config,
        backend: Arc<dyn ChatBackend>,
        queries: &[String],
        verbose: bool,
    ) -> Result<Vec<AgentOutcome>> {
        let queries: Vec<&str> = if queries.is_empty() {
            self.default_queries().to_vec()
        } else {
            queries.iter().map(String::as_str).collect()
        };

        let executor = self.executor(config, backend, verbose)?;
        info!(
            "Starting {} agent ({}) with model {}",
            self.title(),
            self.description(),
            executor.backend().model()
        );

        let mut outcomes = Vec::new();
        for query in queries {
            match executor.invoke(query).await {
                Ok(outcome) => {
                    println!("\n{}", outcome.output);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    warn!("Error running agent: {}", e);
                    return fallback::run(self, executor.registry(), config)
                        .await
                        .with_context(|| format!("{} agent failed: {}", self.title(), e))
                        .map(|()| outcomes);
                }
            }
        }

        Ok(outcomes)
    }
}
