//! Pipeline Orchestrator
//!
//! Drives each sample through
//! `SchemaLinking → Decomposition → Planning → Generation → [Correction]* → Scoring`
//! and collects the results into a run report. Samples are processed one at
//! a time, each in its own task; a failing or panicking sample is recorded
//! and the run moves on.

use crate::agent_prompts::{self, EMPTY_DECOMPOSITION, GENERIC_PLAN};
use crate::clauses::{detect, extract_json_object, policy_for};
use crate::comparator::compare;
use crate::config::EvalConfig;
use crate::dataset::Sample;
use crate::error::{EvalError, Result};
use crate::execution::{BlockingExecutor, SqlExecutor};
use crate::execution_loop::{CorrectionContext, CorrectionLoop};
use crate::llm::TextGenerator;
use crate::report::{RunReport, RunSummary, SampleResult};
use crate::sql_normalizer::normalize;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    SchemaLinking,
    Decomposition,
    Planning,
    Generation,
    Correction,
    Scoring,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::SchemaLinking => "Schema Linking",
            PipelineStage::Decomposition => "Subproblem",
            PipelineStage::Planning => "Query Plan",
            PipelineStage::Generation => "SQL Generation",
            PipelineStage::Correction => "Correction",
            PipelineStage::Scoring => "Scoring",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct Pipeline {
    generator: Arc<dyn TextGenerator>,
    executor: BlockingExecutor,
    correction: CorrectionLoop,
}

impl Pipeline {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        executor: Arc<dyn SqlExecutor>,
        correction: CorrectionLoop,
    ) -> Self {
        Self {
            generator,
            executor: BlockingExecutor::new(executor),
            correction,
        }
    }

    pub fn from_config(
        generator: Arc<dyn TextGenerator>,
        executor: Arc<dyn SqlExecutor>,
        config: &EvalConfig,
    ) -> Self {
        Self::new(
            generator,
            executor,
            CorrectionLoop::new(config.max_correction_attempts, config.abort_on_repeat),
        )
    }

    /// Evaluate `samples` in order. When `shutdown` resolves, the sample in
    /// flight is aborted, the executor is cancelled for good, and the report
    /// covers what finished before it.
    pub async fn run<F>(&self, samples: &[Sample], shutdown: F) -> RunReport
    where
        F: Future,
    {
        let start = Instant::now();
        let total = samples.len();
        let mut results: Vec<SampleResult> = Vec::with_capacity(total);
        let mut interrupted = false;

        tokio::pin!(shutdown);

        for (idx, sample) in samples.iter().enumerate() {
            let sample_id = idx + 1;
            info!("Sample {}/{} [{}]: {}", sample_id, total, sample.db_id, sample.question);

            let pipeline = self.clone();
            let owned = sample.clone();
            let mut task =
                tokio::spawn(async move { pipeline.run_sample(sample_id, &owned).await });

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Evaluation interrupted; keeping {} completed samples", results.len());
                    task.abort();
                    self.executor.cancel();
                    interrupted = true;
                    break;
                }
                joined = &mut task => {
                    let result = joined.unwrap_or_else(|e| {
                        let reason = if e.is_panic() {
                            format!("panicked: {}", panic_message(e.into_panic()))
                        } else {
                            e.to_string()
                        };
                        error!("Sample {} aborted: {}", sample_id, reason);
                        SampleResult::failed(sample_id, sample, reason)
                    });
                    results.push(result);
                    log_progress(&results, total);
                }
            }
        }

        let summary = RunSummary::from_results(
            self.generator.model(),
            &results,
            start.elapsed(),
            self.correction.max_attempts(),
            interrupted,
        );
        RunReport { summary, results }
    }

    /// Process one sample. Never fails: errors become a negative result with
    /// the error attached.
    pub async fn run_sample(&self, sample_id: usize, sample: &Sample) -> SampleResult {
        match self.process(sample_id, sample).await {
            Ok(result) => result,
            Err(e) => {
                error!("Sample {} aborted: {}", sample_id, e);
                SampleResult::failed(sample_id, sample, e.to_string())
            }
        }
    }

    async fn process(&self, sample_id: usize, sample: &Sample) -> Result<SampleResult> {
        let generator = self.generator.as_ref();

        // Schema linking
        let schema = self.executor.describe_schema(&sample.db_id).await?;
        if schema.trim().is_empty() {
            return Err(EvalError::Schema(format!("{} has no tables", sample.db_id)));
        }
        info!("[1/5] {} Agent...", PipelineStage::SchemaLinking);
        let corrected_schema = self
            .call_stage(
                PipelineStage::SchemaLinking,
                &agent_prompts::schema_linking_prompt(&sample.question, &schema),
            )
            .await
            .unwrap_or_else(|| schema.clone());

        // Decomposition
        info!("[2/5] {} Agent...", PipelineStage::Decomposition);
        let raw_decomposition = self
            .call_stage(
                PipelineStage::Decomposition,
                &agent_prompts::decomposition_prompt(&sample.question, &corrected_schema),
            )
            .await
            .unwrap_or_else(|| EMPTY_DECOMPOSITION.to_string());
        let decomposition = extract_json_object(&raw_decomposition)
            .unwrap_or(&raw_decomposition)
            .to_string();

        let detected = detect(&decomposition);
        let guidance = policy_for(&detected);
        let mut clauses: Vec<_> = detected.into_iter().collect();
        clauses.sort();
        info!(
            "Identified SQL clauses: [{}]",
            clauses.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
        );

        // Planning
        info!("[3/5] {} Agent...", PipelineStage::Planning);
        let plan = self
            .call_stage(
                PipelineStage::Planning,
                &agent_prompts::query_plan_prompt(
                    &sample.question,
                    &corrected_schema,
                    &decomposition,
                    &guidance.planning,
                ),
            )
            .await
            .unwrap_or_else(|| GENERIC_PLAN.to_string());

        // Generation
        info!("[4/5] {} Agent...", PipelineStage::Generation);
        let Some(raw_sql) = self
            .call_stage(
                PipelineStage::Generation,
                &agent_prompts::sql_generation_prompt(
                    &sample.question,
                    &plan,
                    &corrected_schema,
                    &guidance.generation,
                ),
            )
            .await
        else {
            let mut result = SampleResult::failed(sample_id, sample, "SQL generation agent failed");
            result.clauses = clauses;
            return Ok(result);
        };
        let sql = normalize(&raw_sql);
        info!("Generated SQL: {}", sql);

        let first = compare(&self.executor, &sample.db_id, &sample.gold_sql, &sql).await;
        if let Some(reference_error) = &first.reference_error {
            warn!("Reference SQL failed on {}: {}", sample.db_id, reference_error);
        }

        // Correction
        if !first.equivalent {
            info!("[5/5] {} loop...", PipelineStage::Correction);
        }
        let ctx = CorrectionContext {
            question: &sample.question,
            schema: &corrected_schema,
            db_id: &sample.db_id,
            gold_sql: &sample.gold_sql,
            generation_guidance: &guidance.generation,
        };
        let outcome = self
            .correction
            .run(&ctx, generator, &self.executor, sql, first)
            .await;

        // Scoring
        let exact_match = outcome.sql == normalize(&sample.gold_sql);
        let valid_sql = self.executor.is_valid(&sample.db_id, &outcome.sql).await;
        let exec_match = outcome.comparison.equivalent;
        info!(
            "{}: exact_match={} valid_sql={} exec_match={} (attempts: {}, exit: {:?})",
            PipelineStage::Scoring,
            exact_match,
            valid_sql,
            exec_match,
            outcome.attempts,
            outcome.exit
        );

        Ok(SampleResult {
            sample_id,
            question: sample.question.clone(),
            db_id: sample.db_id.clone(),
            gold_sql: sample.gold_sql.clone(),
            gen_sql: outcome.sql,
            exact_match,
            valid_sql,
            exec_match,
            clauses,
            correction_attempts: outcome.attempts,
            error: None,
        })
    }

    /// Call the generator for one stage. `None` means the stage failed and
    /// the caller applies its fallback.
    async fn call_stage(&self, stage: PipelineStage, prompt: &str) -> Option<String> {
        match self.generator.generate(prompt).await {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                warn!("{} agent returned an empty response", stage);
                None
            }
            Err(e) => {
                warn!("{} agent failed: {}", stage, e);
                None
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_progress(results: &[SampleResult], total: usize) {
    let done = results.len();
    let count = |f: fn(&SampleResult) -> bool| results.iter().filter(|r| f(r)).count();
    let pct = |n: usize| n as f64 / done as f64 * 100.0;

    let exact = count(|r| r.exact_match);
    let valid = count(|r| r.valid_sql);
    let exec = count(|r| r.exec_match);
    info!(
        "Progress {}/{}: exact {}/{} ({:.1}%), valid {}/{} ({:.1}%), exec {}/{} ({:.1}%)",
        done,
        total,
        exact,
        done,
        pct(exact),
        valid,
        done,
        pct(valid),
        exec,
        done,
        pct(exec)
    );
}
