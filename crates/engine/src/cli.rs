use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Tool-using LLM agent exercises: weather, SQL and GitHub
#[derive(Parser, Debug)]
#[command(name = "errand", version, about)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        help = "Log every agent step (tool calls and observations)"
    )]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(about = "Ask for the weather or do some arithmetic")]
    Weather(QueryArgs),

    #[command(about = "Query the users database and read or write result files")]
    Sql(QueryArgs),

    #[command(about = "Search repositories and work with issues on GitHub")]
    Github(QueryArgs),

    #[command(about = "Connect to the LLM and ask it a test question")]
    Probe,

    #[command(about = "Run a SQL script against the database")]
    SeedDb(SeedArgs),

    #[command(about = "Print the first rows of a table")]
    CheckDb(CheckArgs),
}

#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    #[arg(
        value_name = "QUERY",
        help = "Question for the agent (runs the built-in sequence when omitted)"
    )]
    pub query: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SeedArgs {
    #[arg(long, default_value = "db_content.txt", help = "SQL script to execute")]
    pub file: PathBuf,

    #[arg(long, help = "Use the built-in users table when the script file is missing")]
    pub builtin: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(long, default_value = "users")]
    pub table: String,

    #[arg(long, default_value_t = 4)]
    pub limit: usize,
}

impl QueryArgs {
    /// The query as a one-element list, or empty to run the built-in sequence.
    pub fn queries(&self) -> Vec<String> {
        self.query.iter().cloned().collect()
    }
}
