//! Integration tests: run the full pipeline against a real SQLite database
//! with a scripted generator standing in for the LLM.

use async_trait::async_trait;
use sql_of_thought::clauses::ClauseTag;
use sql_of_thought::dataset::Sample;
use sql_of_thought::error::{EvalError, Result as EvalResult};
use sql_of_thought::execution::SqliteExecutor;
use sql_of_thought::execution_loop::CorrectionLoop;
use sql_of_thought::llm::TextGenerator;
use sql_of_thought::pipeline::Pipeline;
use sql_of_thought::report::output_path;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const GOLD_COUNT: &str = "SELECT count(*) FROM singer";

/// Scripted response that makes the generator panic.
const PANIC: &str = "<panic>";

/// Replays canned responses in order. `None` entries, and running out of
/// responses, are reported as generator errors; `PANIC` panics.
struct ScriptedGenerator {
    responses: Mutex<VecDeque<Option<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    fn new(responses: Vec<Option<&str>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(|r| r.map(String::from)).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> EvalResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Some(text)) if text == PANIC => panic!("generator crashed"),
            Some(Some(text)) => Ok(text),
            Some(None) => Err(EvalError::Llm("scripted failure".to_string())),
            None => Err(EvalError::Llm("script exhausted".to_string())),
        }
    }
}

fn create_test_database(database_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db_dir = database_dir.join("concert_singer");
    std::fs::create_dir_all(&db_dir)?;
    let conn = rusqlite::Connection::open(db_dir.join("concert_singer.sqlite"))?;
    conn.execute_batch(
        "CREATE TABLE singer (
            singer_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            country TEXT,
            age INTEGER
        );
        INSERT INTO singer VALUES (1, 'Joe Sharp', 'Netherlands', 52);
        INSERT INTO singer VALUES (2, 'Timbaland', 'United States', 32);
        INSERT INTO singer VALUES (3, 'Justin Brown', 'France', 29);",
    )?;
    Ok(())
}

/// Grow `singer` to 1024 rows so a four-way self join runs for a long time.
fn grow_singers(database_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let conn = rusqlite::Connection::open(
        database_dir.join("concert_singer").join("concert_singer.sqlite"),
    )?;
    conn.execute_batch(
        "WITH RECURSIVE n(i) AS (SELECT 4 UNION ALL SELECT i + 1 FROM n WHERE i < 1024)
         INSERT INTO singer SELECT i, 'singer ' || i, 'Nowhere', 20 + i % 40 FROM n;",
    )?;
    Ok(())
}

fn setup() -> Result<(TempDir, Arc<SqliteExecutor>), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    create_test_database(temp_dir.path())?;
    let executor = Arc::new(SqliteExecutor::new(temp_dir.path()));
    Ok((temp_dir, executor))
}

fn count_sample() -> Sample {
    Sample::new("How many singers do we have?", GOLD_COUNT, "concert_singer")
}

/// Responses for the four forward stages of one sample.
fn forward_stages(sql: &str) -> Vec<Option<&str>> {
    vec![
        Some("singer: singer_id, name, country, age"),
        Some(r#"{"clauses": ["SELECT", "FROM"]}"#),
        Some("Count every row of singer"),
        Some(sql),
    ]
}

#[tokio::test]
async fn test_end_to_end_exact_and_execution_match() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let generator = ScriptedGenerator::new(vec![
        Some("singer: singer_id, name, country, age"),
        Some("Here is the breakdown:\n```json\n{\"clauses\": [\"FROM\", \"SELECT\"]}\n```"),
        Some("Count every row of singer"),
        Some("```sql\nSELECT count(*) FROM singer;\n```"),
    ]);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let result = pipeline.run_sample(1, &count_sample()).await;

    assert_eq!(result.gen_sql, "select count(*) from singer");
    assert!(result.exact_match);
    assert!(result.valid_sql);
    assert!(result.exec_match);
    assert_eq!(result.correction_attempts, 0);
    assert_eq!(result.clauses, vec![ClauseTag::Select, ClauseTag::From]);
    assert!(result.error.is_none());

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[0].contains("Columns: singer_id, name, country, age"));
    Ok(())
}

#[tokio::test]
async fn test_stage_fallbacks_keep_sample_alive() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let generator = ScriptedGenerator::new(vec![
        None,
        None,
        None,
        Some("SELECT count(*) FROM singer"),
    ]);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let result = pipeline.run_sample(1, &count_sample()).await;
    assert!(result.exec_match);
    assert!(result.clauses.is_empty());

    let prompts = generator.prompts();
    // Raw schema is used when linking fails; the generic plan when planning fails.
    assert!(prompts[1].contains("Columns: singer_id, name, country, age"));
    assert!(prompts[3].contains("Generate SQL based on the question"));
    Ok(())
}

#[tokio::test]
async fn test_generation_failure_records_error() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let mut responses = forward_stages("unused");
    responses[3] = None;
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let result = pipeline.run_sample(1, &count_sample()).await;

    assert_eq!(result.gen_sql, "");
    assert!(!result.exact_match);
    assert!(!result.valid_sql);
    assert!(!result.exec_match);
    assert!(result.error.is_some());
    assert_eq!(generator.prompts().len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_correction_fixes_invalid_column() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let mut responses = forward_stages("SELECT count(nme) FROM singer");
    responses.push(Some("Use the name column"));
    responses.push(Some("SELECT count(*) FROM singer"));
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let result = pipeline.run_sample(1, &count_sample()).await;

    assert!(result.exec_match);
    assert!(result.exact_match);
    assert_eq!(result.correction_attempts, 1);

    let prompts = generator.prompts();
    assert_eq!(prompts.len(), 6);
    assert!(prompts[4].contains("no such column: nme"));
    assert!(prompts[4].contains("Error category: ColumnNotFound"));
    assert!(prompts[5].contains("Use the name column"));
    Ok(())
}

#[tokio::test]
async fn test_repeated_candidate_aborts_loop() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let mut responses = forward_stages("SELECT name FROM singer");
    responses.push(Some("Count instead"));
    responses.push(Some("SELECT name FROM singer;"));
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let result = pipeline.run_sample(1, &count_sample()).await;

    assert_eq!(result.gen_sql, "select name from singer");
    assert!(result.valid_sql);
    assert!(!result.exec_match);
    assert_eq!(result.correction_attempts, 1);
    assert_eq!(generator.prompts().len(), 6);
    Ok(())
}

#[tokio::test]
async fn test_correction_budget_is_bounded() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let mut responses = forward_stages("SELECT name FROM singer");
    for _ in 0..5 {
        responses.push(Some("Count instead"));
        responses.push(Some("SELECT name FROM singer"));
    }
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, false));

    let result = pipeline.run_sample(1, &count_sample()).await;

    assert!(!result.exec_match);
    assert_eq!(result.correction_attempts, 3);
    // Four forward stages plus two calls per attempt.
    assert_eq!(generator.prompts().len(), 4 + 3 * 2);
    Ok(())
}

#[tokio::test]
async fn test_adapter_failure_keeps_last_candidate() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let mut responses = forward_stages("SELECT name FROM singer");
    responses.push(Some("Try age"));
    responses.push(Some("SELECT age FROM singer"));
    responses.push(None);
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let result = pipeline.run_sample(1, &count_sample()).await;

    assert_eq!(result.gen_sql, "select age from singer");
    assert!(result.valid_sql);
    assert!(!result.exec_match);
    assert_eq!(result.correction_attempts, 1);
    assert!(result.error.is_none());
    Ok(())
}

#[tokio::test]
async fn test_missing_database_is_recorded() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let generator = ScriptedGenerator::new(vec![]);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let sample = Sample::new("How many pets?", "SELECT count(*) FROM pets", "pets_1");
    let report = pipeline.run(&[sample], std::future::pending::<()>()).await;

    assert_eq!(report.results.len(), 1);
    let result = &report.results[0];
    assert!(!result.valid_sql);
    assert!(result.error.as_deref().unwrap_or_default().contains("pets_1"));
    assert!(generator.prompts().is_empty());
    assert_eq!(report.summary.total_samples, 1);
    Ok(())
}

#[tokio::test]
async fn test_run_summary_over_ten_samples() -> Result<(), Box<dyn std::error::Error>> {
    let (temp_dir, executor) = setup()?;
    let mut responses = Vec::new();
    for i in 0..10 {
        let sql = if i < 6 { GOLD_COUNT } else { "SELECT name FROM singer" };
        responses.extend(forward_stages(sql));
    }
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(0, true));

    let samples: Vec<Sample> = (0..10).map(|_| count_sample()).collect();
    let report = pipeline.run(&samples, std::future::pending::<()>()).await;

    let summary = &report.summary;
    assert_eq!(summary.model, "scripted");
    assert_eq!(summary.total_samples, 10);
    assert_eq!(summary.execution_accuracy, 6);
    assert_eq!(summary.execution_accuracy_rate, 0.6);
    assert_eq!(summary.valid_sql, 10);
    assert!(!summary.interrupted);
    assert_eq!(summary.clause_breakdown[&ClauseTag::Select].samples, 10);

    let ids: Vec<usize> = report.results.iter().map(|r| r.sample_id).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<_>>());

    let path = output_path(&temp_dir.path().join("results"), samples.len(), None);
    report.write_to(&path)?;
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    assert_eq!(json["summary"]["execution_accuracy_rate"], 0.6);
    assert_eq!(json["results"].as_array().map(Vec::len), Some(10));
    Ok(())
}

#[tokio::test]
async fn test_interrupt_writes_partial_summary() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let generator = ScriptedGenerator::new(forward_stages(GOLD_COUNT));
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let samples = vec![count_sample(), count_sample()];
    let report = pipeline.run(&samples, std::future::ready(())).await;

    assert!(report.summary.interrupted);
    assert!(report.results.is_empty());
    assert_eq!(report.summary.total_samples, 0);
    assert_eq!(report.summary.execution_accuracy_rate, 0.0);
    Ok(())
}

#[tokio::test]
async fn test_interrupt_cancels_running_query() -> Result<(), Box<dyn std::error::Error>> {
    let (temp_dir, executor) = setup()?;
    grow_singers(temp_dir.path())?;
    let generator = ScriptedGenerator::new(forward_stages(
        "SELECT count(*) FROM singer a, singer b, singer c, singer d",
    ));
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let samples = vec![count_sample(), count_sample()];
    let shutdown = tokio::time::sleep(Duration::from_millis(100));
    let report = tokio::time::timeout(Duration::from_secs(5), pipeline.run(&samples, shutdown))
        .await?;

    assert!(report.summary.interrupted);
    assert!(report.results.is_empty());
    assert_eq!(generator.prompts().len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_panicking_sample_does_not_stop_run() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;
    let mut responses = forward_stages(GOLD_COUNT);
    responses.push(Some(PANIC));
    responses.extend(forward_stages(GOLD_COUNT));
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let samples = vec![count_sample(), count_sample(), count_sample()];
    let report = pipeline.run(&samples, std::future::pending::<()>()).await;

    assert_eq!(report.results.len(), 3);
    assert!(report.results[0].exec_match);
    assert!(report.results[2].exec_match);

    let crashed = &report.results[1];
    assert_eq!(crashed.sample_id, 2);
    assert!(!crashed.exec_match);
    assert!(crashed.error.as_deref().unwrap_or_default().contains("generator crashed"));

    assert_eq!(report.summary.execution_accuracy, 2);
    assert!(!report.summary.interrupted);
    Ok(())
}

#[tokio::test]
async fn test_empty_correction_responses_end_loop() -> Result<(), Box<dyn std::error::Error>> {
    let (_temp_dir, executor) = setup()?;

    // Empty correction plan
    let mut responses = forward_stages("SELECT name FROM singer");
    responses.push(Some("   "));
    responses.push(Some("SELECT count(*) FROM singer"));
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor.clone(), CorrectionLoop::new(3, true));

    let result = pipeline.run_sample(1, &count_sample()).await;
    assert_eq!(result.gen_sql, "select name from singer");
    assert!(!result.exec_match);
    assert_eq!(result.correction_attempts, 0);
    assert_eq!(generator.prompts().len(), 5);

    // Corrected SQL that normalizes to nothing
    let mut responses = forward_stages("SELECT name FROM singer");
    responses.push(Some("Count instead"));
    responses.push(Some("```sql\n```"));
    responses.push(Some("Count instead"));
    responses.push(Some("SELECT count(*) FROM singer"));
    let generator = ScriptedGenerator::new(responses);
    let pipeline = Pipeline::new(generator.clone(), executor, CorrectionLoop::new(3, true));

    let result = pipeline.run_sample(1, &count_sample()).await;
    assert_eq!(result.gen_sql, "select name from singer");
    assert!(result.valid_sql);
    assert!(!result.exec_match);
    assert_eq!(result.correction_attempts, 0);
    assert_eq!(generator.prompts().len(), 6);
    Ok(())
}
