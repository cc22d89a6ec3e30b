use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use errand_engine::cli::{CheckArgs, CliArgs, Commands, QueryArgs, SeedArgs};
use errand_engine::config::Config;
use errand_engine::exercise::Exercise;
use errand_engine::llm::{self, ChatBackend, ChatMessage, ChatRequest};
use errand_engine::{NAME, VERSION, logging};
use errand_shared::db::{BUILTIN_SEED, Db};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    logging::init(args.log_level.as_deref(), args.verbose);

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &CliArgs) -> Result<()> {
    let config = Config::load()?;
    let verbose = args.verbose;

    match &args.command {
        Commands::Weather(query) => run_exercise(&config, Exercise::Weather, query, verbose).await,
        Commands::Sql(query) => run_exercise(&config, Exercise::Sql, query, verbose).await,
        Commands::Github(query) => run_exercise(&config, Exercise::Github, query, verbose).await,
        Commands::Probe => probe(&config).await,
        Commands::SeedDb(seed) => seed_db(&config, seed),
        Commands::CheckDb(check) => check_db(&config, check),
    }
}

async fn run_exercise(
    config: &Config,
    exercise: Exercise,
    args: &QueryArgs,
    verbose: bool,
) -> Result<()> {
    let backend = llm::connect(&config.llm).await?;
    exercise
        .run(config, backend, &args.queries(), verbose)
        .await?;
    Ok(())
}

async fn probe(config: &Config) -> Result<()> {
    let backend = llm::connect(&config.llm).await?;
    let reply = backend
        .chat(&ChatRequest::new(vec![ChatMessage::user("What is 2+2?")]))
        .await?;

    println!("Test response: {}", reply.content.unwrap_or_default());
    Ok(())
}

fn seed_db(config: &Config, args: &SeedArgs) -> Result<()> {
    let script = if args.file.exists() {
        std::fs::read_to_string(&args.file)
            .with_context(|| format!("Could not read {}", args.file.display()))?
    } else if args.builtin {
        info!("{} not found, using the built-in users table", args.file.display());
        BUILTIN_SEED.to_string()
    } else {
        anyhow::bail!(
            "{} not found (pass --builtin to seed the built-in users table)",
            args.file.display()
        );
    };

    let db = Db::open(&config.database)?;
    let executed = db.execute_script(&script)?;
    println!(
        "Database populated successfully: {} statement(s) executed in {}",
        executed,
        db.path().display()
    );
    Ok(())
}

fn check_db(config: &Config, args: &CheckArgs) -> Result<()> {
    let db = Db::open(&config.database)?;
    let rows = db.preview(&args.table, args.limit)?;

    if rows.is_empty() {
        println!("No data found in the table.");
    } else {
        println!("{}", rows.to_markdown());
    }
    Ok(())
}
