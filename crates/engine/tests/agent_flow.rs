use std::path::Path;
use std::sync::Arc;

use errand_engine::config::Config;
use errand_engine::exercise::Exercise;
use errand_engine::llm::{MockBackend, MockReply};
use errand_shared::db::{BUILTIN_SEED, Db};
use serde_json::json;

fn config_for(dir: &Path, extra: &[(&str, &str)]) -> Config {
    let db = dir.join("db_agents.db").display().to_string();
    let extra: Vec<(String, String)> = extra
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    Config::from_lookup(|key| {
        if key == "DATABASE" {
            return Some(db.clone());
        }
        extra.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    })
    .unwrap()
}

fn seed(config: &Config) {
    Db::open(&config.database)
        .unwrap()
        .execute_script(BUILTIN_SEED)
        .unwrap();
}

#[tokio::test]
async fn sql_exercise_writes_then_reads_the_result_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), &[]);
    seed(&config);

    let backend = Arc::new(MockBackend::with_replies([
        MockReply::tool_call(
            "write_query_result",
            json!({ "input": "SQL: SELECT COUNT(*) FROM users;" }),
        ),
        MockReply::text("There are 5 users; the count is in db_result.txt."),
        MockReply::tool_call("read_file", json!({ "file_name": "db_result.txt" })),
        MockReply::text("The file says the result of the query is 5."),
    ]));

    let outcomes = Exercise::Sql
        .run(&config, backend.clone(), &[], false)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].steps[0]
        .observation
        .starts_with("Query result successfully written to"));
    assert_eq!(
        outcomes[1].steps[0].observation,
        "The result of the query is: 5"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("db_result.txt")).unwrap(),
        "The result of the query is: 5"
    );

    let first = &backend.requests()[0];
    assert!(first.messages[0]
        .content
        .as_deref()
        .unwrap()
        .contains("write_query_result"));
    let tools: Vec<_> = first.tools.iter().map(|t| t.function.name.as_str()).collect();
    assert_eq!(tools, ["run_sql", "write_query_result", "read_file"]);
    assert_eq!(backend.remaining(), 0);
}

#[tokio::test]
async fn custom_query_replaces_the_default_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), &[]);
    seed(&config);

    let backend = Arc::new(MockBackend::with_replies([
        MockReply::tool_call(
            "run_sql",
            json!({ "query": "```sql\nSELECT name FROM users WHERE age > 80 ORDER BY id;\n```" }),
        ),
        MockReply::text("Grace Hopper and Margaret Hamilton."),
    ]));

    let outcomes = Exercise::Sql
        .run(&config, backend, &["Who is older than 80?".to_string()], true)
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 1);
    assert_eq!(
        outcomes[0].steps[0].observation,
        "('Grace Hopper'), ('Margaret Hamilton')"
    );
}

#[tokio::test]
async fn failed_agent_falls_back_to_direct_sql() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), &[("AGENT_MAX_STEPS", "1")]);
    seed(&config);

    let backend = Arc::new(MockBackend::with_replies([MockReply::error(
        "429 Too Many Requests",
    )]));

    let outcomes = Exercise::Sql.run(&config, backend, &[], false).await.unwrap();

    assert!(outcomes.is_empty());
    assert_eq!(
        std::fs::read_to_string(dir.path().join("db_result.txt")).unwrap(),
        "This is the direct fallback result: 5"
    );
}

#[tokio::test]
async fn github_without_a_token_fails_before_the_agent_runs() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(dir.path(), &[]);
    let backend = Arc::new(MockBackend::new());

    let err = Exercise::Github
        .run(&config, backend.clone(), &[], false)
        .await
        .unwrap_err();

    assert!(format!("{:#}", err).contains("GITHUB_TOKEN"));
    assert!(backend.requests().is_empty());
}
