//! Full pipeline runs over real capabilities and a SQLite file.
//!
//! The language model is a prompt-routing fake; everything else (the
//! capability registry, the executor, the stdio protocol) is the real thing.

#![cfg(feature = "sqlite")]
#![allow(clippy::unwrap_used)]

use async_trait::async_trait;
use parking_lot::Mutex;
use queryflow::capabilities::{build_registry, GenerationSettings, LanguageModel, SqliteStore};
use queryflow::core::PipelineState;
use queryflow::errors::LlmError;
use queryflow::events::{CollectingEventSink, QUERY_REPAIRED};
use queryflow::pipeline::{PipelineConfig, PipelineOrchestrator};
use queryflow::session::{serve, with_session, LocalSession, RpcSession, ServerInfo, Session};
use queryflow::testing::{assert_answer_contains, assert_run_failed, assert_run_succeeded};
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;

const QUESTION: &str = "How many vehicles are there in King county?";

/// Replies by recognising which stage prompt it was given.
struct RoutedModel {
    query: &'static str,
    repaired: &'static str,
    prompts: Mutex<Vec<String>>,
}

impl RoutedModel {
    fn new(query: &'static str, repaired: &'static str) -> Self {
        Self {
            query,
            repaired,
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn prompt_starting_with(&self, prefix: &str) -> Option<String> {
        self.prompts
            .lock()
            .iter()
            .find(|p| p.starts_with(prefix))
            .cloned()
    }
}

#[async_trait]
impl LanguageModel for RoutedModel {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        self.prompts.lock().push(prompt.to_string());

        let reply = if prompt.starts_with("You are a data analyst") {
            r#"Sure. {"table": "King", "columns_to_select": [], "filters": {}}"#.to_string()
        } else if prompt.starts_with("You are an expert SQLite developer") {
            format!("```sql\n{}\n```", self.query)
        } else if prompt.starts_with("You are a SQL validator") {
            serde_json::json!({ "sql_query": self.query }).to_string()
        } else if prompt.starts_with("You are a highly skilled SQLite expert") {
            format!("```json\n{}\n```", serde_json::json!({ "sql_query": self.repaired }))
        } else {
            "There are 2 vehicles registered in King county.".to_string()
        };
        Ok(reply)
    }
}

fn seed_database(path: &Path) {
    let conn = rusqlite::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE King (Make TEXT, Model TEXT, \"Electric Range\" INTEGER);
         INSERT INTO King VALUES ('TESLA', 'MODEL 3', 220);
         INSERT INTO King VALUES ('NISSAN', 'LEAF', 84);",
    )
    .unwrap();
}

fn session_for(model: Arc<RoutedModel>, db: &Path) -> Arc<LocalSession> {
    let registry = build_registry(
        model,
        Arc::new(SqliteStore::new(db)),
        "This is the data dictionary.",
        GenerationSettings::default(),
    );
    Arc::new(LocalSession::new(Arc::new(registry)))
}

#[tokio::test]
async fn test_repairs_bad_table_and_answers() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("ev.db");
    seed_database(&db);

    let model = Arc::new(RoutedModel::new(
        "SELECT COUNT(*) FROM Kingg",
        "SELECT COUNT(*) FROM King",
    ));
    let sink = Arc::new(CollectingEventSink::new());
    let session = session_for(Arc::clone(&model), &db);

    let run = PipelineOrchestrator::new(session)
        .with_event_sink(sink.clone())
        .run(QUESTION)
        .await;

    assert_run_succeeded(&run);
    assert_answer_contains(&run, "2 vehicles");
    assert_eq!(run.execute_attempts, 2);
    assert_eq!(run.repair_attempts, 1);
    assert!(run.states.contains(&PipelineState::Executing { attempt: 2 }));
    assert_eq!(sink.count_of(QUERY_REPAIRED), 1);

    let validator = model.prompt_starting_with("You are a SQL validator").unwrap();
    assert!(validator.contains("Table: King"));

    let repair = model
        .prompt_starting_with("You are a highly skilled SQLite expert")
        .unwrap();
    assert!(repair.contains("no such table: Kingg"));

    let answer = model.prompt_starting_with("You are a helpful assistant").unwrap();
    assert!(answer.contains("\"COUNT(*)\": 2"));
}

#[tokio::test]
async fn test_unrepairable_query_exhausts_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("ev.db");
    seed_database(&db);

    let model = Arc::new(RoutedModel::new(
        "SELECT COUNT(*) FROM Kingg",
        "SELECT COUNT(*) FROM Kinggg",
    ));
    let session = session_for(Arc::clone(&model), &db);

    let run = PipelineOrchestrator::new(session)
        .with_config(PipelineConfig::new().with_max_attempts(2))
        .run(QUESTION)
        .await;

    assert_run_failed(&run);
    assert_eq!(run.execute_attempts, 2);
    let text = run.into_text();
    assert!(text.starts_with("Failed to execute the query after 2 attempts. Last error: "));
    assert!(text.contains("no such table: Kinggg"));
    assert!(model.prompt_starting_with("You are a helpful assistant").is_none());
}

#[tokio::test]
async fn test_pipeline_over_stdio_protocol() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("ev.db");
    seed_database(&db);

    let model = Arc::new(RoutedModel::new(
        "SELECT COUNT(*) FROM King",
        "SELECT COUNT(*) FROM King",
    ));
    let registry = build_registry(
        model,
        Arc::new(SqliteStore::new(&db)),
        "",
        GenerationSettings::default(),
    );

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let (client_read, client_write) = tokio::io::split(client_io);
    let server = tokio::spawn(serve(
        Arc::new(registry),
        ServerInfo::default(),
        BufReader::new(server_read),
        server_write,
    ));

    let session: Arc<dyn Session> = Arc::new(
        RpcSession::connect("duplex", BufReader::new(client_read), client_write)
            .await
            .unwrap(),
    );

    let answer = with_session(Arc::clone(&session), |session| async move {
        let orchestrator = PipelineOrchestrator::new(session);
        orchestrator.verify_capabilities().await.unwrap();
        orchestrator.ask(QUESTION).await
    })
    .await;

    assert_eq!(answer, "There are 2 vehicles registered in King county.");
    assert!(session.invoke_capability("execute_query", serde_json::json!({})).await.is_err());
    server.await.unwrap().unwrap();
}
