use anyhow::Result;
use errand_shared::ToolRegistry;
use errand_shared::toolbelts::archivist::write_result;
use serde_json::json;
use tracing::info;

use super::Exercise;
use crate::config::Config;

pub const FALLBACK_EXPRESSION: &str = "15 * 7 + 23";
pub const FALLBACK_CITY: &str = "London";
pub const FALLBACK_QUERY: &str = "SELECT COUNT(*) FROM users;";

/// Calls the exercise's tools directly with fixed arguments, skipping the model.
pub async fn run(exercise: &Exercise, registry: &ToolRegistry, config: &Config) -> Result<()> {
    info!("Trying direct tool calls for {}", exercise.title());

    match exercise {
        Exercise::Weather => {
            let calculation = registry
                .use_tool("calculate", &json!({ "expression": FALLBACK_EXPRESSION }))
                .await?;
            println!("Direct Calculation: {}", calculation);

            let weather = registry
                .use_tool("get_weather", &json!({ "city": FALLBACK_CITY }))
                .await?;
            println!("Direct Weather: {}", weather);
        }
        Exercise::Sql => {
            let result = registry
                .use_tool("run_sql", &json!({ "query": FALLBACK_QUERY }))
                .await?;
            println!("Direct SQL result: {}", result);

            let path = write_result(
                &config.output_dir,
                &format!("This is the direct fallback result: {}", result),
            )?;
            println!("Direct file write to {} completed.", path.display());
        }
        Exercise::Github => anyhow::bail!("the github exercise has no direct fallback"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use errand_shared::db::Db;
    use errand_shared::toolbelts::archivist::RESULT_FILE;
    use errand_shared::toolbelts::{Archivist, Calculator};

    fn config_for(dir: &std::path::Path) -> Config {
        let db = dir.join("agents.db").display().to_string();
        Config::from_lookup(|key| match key {
            "DATABASE" => Some(db.clone()),
            "LLM_PROVIDER" => Some("ollama".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn sql_fallback_writes_the_count() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let db = Db::open(&config.database).unwrap();
        db.execute_script(errand_shared::db::BUILTIN_SEED).unwrap();
        let registry =
            ToolRegistry::new(vec![Box::new(Archivist::new(db, &config.output_dir))]).unwrap();

        run(&Exercise::Sql, &registry, &config).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join(RESULT_FILE)).unwrap();
        assert_eq!(written, "This is the direct fallback result: 5");
    }

    #[tokio::test]
    async fn github_has_no_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());
        let registry = ToolRegistry::new(vec![Box::new(Calculator)]).unwrap();

        let err = run(&Exercise::Github, &registry, &config).await.unwrap_err();
        assert!(err.to_string().contains("no direct fallback"));
    }
}
