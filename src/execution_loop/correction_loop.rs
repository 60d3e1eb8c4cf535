//! Correction Loop
//!
//! Bounded repair cycle: feed the execution error (or result mismatch) back
//! to the generator, get a new candidate, re-run it. Each iteration depends on
//! the previous iteration's error, so the loop is strictly sequential.

use crate::agent_prompts;
use crate::comparator::{compare, ExecutionComparison};
use crate::execution::BlockingExecutor;
use crate::execution_loop::error_classifier::ErrorClassifier;
use crate::llm::TextGenerator;
use crate::sql_normalizer::normalize;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

/// Feedback used when the candidate runs but its rows differ from the reference.
pub const RESULT_MISMATCH_FEEDBACK: &str =
    "The query executed successfully, but its result rows do not match the expected result.";

/// Everything about the sample the correction prompts need.
pub struct CorrectionContext<'a> {
    pub question: &'a str,
    pub schema: &'a str,
    pub db_id: &'a str,
    pub gold_sql: &'a str,
    pub generation_guidance: &'a str,
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopExit {
    /// The candidate already matched, so the loop never ran.
    NotNeeded,
    Matched,
    BudgetExhausted,
    AdapterFailure,
    RepeatedCandidate,
}

/// Final candidate after the loop, with its last comparison.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub sql: String,
    pub comparison: ExecutionComparison,
    pub attempts: u8,
    pub exit: LoopExit,
}

/// Correction loop with a fixed attempt budget
#[derive(Clone)]
pub struct CorrectionLoop {
    max_attempts: u8,
    abort_on_repeat: bool,
    error_classifier: ErrorClassifier,
}

impl CorrectionLoop {
    pub fn new(max_attempts: u8, abort_on_repeat: bool) -> Self {
        Self {
            max_attempts,
            abort_on_repeat,
            error_classifier: ErrorClassifier::new(),
        }
    }

    pub fn max_attempts(&self) -> u8 {
        self.max_attempts
    }

    /// Repair `sql` until it execution-matches, the budget runs out, or the
    /// generator fails (an empty response counts as failing). The last
    /// successfully produced candidate is kept.
    pub async fn run(
        &self,
        ctx: &CorrectionContext<'_>,
        generator: &dyn TextGenerator,
        executor: &BlockingExecutor,
        sql: String,
        comparison: ExecutionComparison,
    ) -> CorrectionOutcome {
        if comparison.equivalent {
            return CorrectionOutcome {
                sql,
                comparison,
                attempts: 0,
                exit: LoopExit::NotNeeded,
            };
        }

        let mut sql = sql;
        let mut comparison = comparison;
        let mut tried: HashSet<String> = HashSet::from([sql.clone()]);
        let mut attempts: u8 = 0;
        let mut exit = LoopExit::BudgetExhausted;

        info!(
            "Entering correction loop (error: {})",
            comparison.error.as_deref().unwrap_or("result mismatch")
        );

        while attempts < self.max_attempts {
            info!("Correction attempt {}/{}", attempts + 1, self.max_attempts);

            let feedback = comparison.error.as_deref().unwrap_or(RESULT_MISMATCH_FEEDBACK);
            let error_class = self.error_classifier.classify(comparison.error.as_deref());

            let plan_prompt = agent_prompts::correction_plan_prompt(
                ctx.question,
                &sql,
                ctx.schema,
                feedback,
                &error_class,
            );
            let correction_plan = match generator.generate(&plan_prompt).await {
                Ok(plan) if !plan.trim().is_empty() => plan,
                Ok(_) => {
                    warn!("Correction plan agent returned an empty response");
                    exit = LoopExit::AdapterFailure;
                    break;
                }
                Err(e) => {
                    warn!("Correction plan agent failed: {}", e);
                    exit = LoopExit::AdapterFailure;
                    break;
                }
            };

            let sql_prompt = agent_prompts::correction_sql_prompt(
                ctx.question,
                ctx.schema,
                &correction_plan,
                &sql,
                ctx.generation_guidance,
            );
            let corrected = match generator.generate(&sql_prompt).await {
                Ok(corrected) => normalize(&corrected),
                Err(e) => {
                    warn!("Correction SQL agent failed: {}", e);
                    exit = LoopExit::AdapterFailure;
                    break;
                }
            };
            if corrected.is_empty() {
                warn!("Correction SQL agent returned no SQL");
                exit = LoopExit::AdapterFailure;
                break;
            }
            attempts += 1;

            // A candidate that was already tried is never executed again.
            if !tried.insert(corrected.clone()) {
                warn!("Correction produced an already-tried candidate: {}", corrected);
                if self.abort_on_repeat {
                    exit = LoopExit::RepeatedCandidate;
                    break;
                }
                continue;
            }

            info!("Corrected SQL: {}", corrected);
            sql = corrected;
            comparison = compare(executor, ctx.db_id, ctx.gold_sql, &sql).await;

            if comparison.equivalent {
                info!("✅ Correction succeeded on attempt {}", attempts);
                exit = LoopExit::Matched;
                break;
            }
        }

        if exit == LoopExit::BudgetExhausted {
            warn!("Maximum correction attempts ({}) reached", self.max_attempts);
        }

        CorrectionOutcome {
            sql,
            comparison,
            attempts,
            exit,
        }
    }
}
