//! Run Report
//!
//! Per-sample results and the run summary, persisted as one JSON document
//! `{"summary": {...}, "results": [...]}` for downstream comparison tooling.

use crate::clauses::ClauseTag;
use crate::dataset::Sample;
use crate::error::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleResult {
    pub sample_id: usize,
    pub question: String,
    pub db_id: String,
    pub gold_sql: String,
    pub gen_sql: String,
    pub exact_match: bool,
    pub valid_sql: bool,
    pub exec_match: bool,
    #[serde(default)]
    pub clauses: Vec<ClauseTag>,
    #[serde(default)]
    pub correction_attempts: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SampleResult {
    /// Result for a sample that never produced a usable candidate.
    pub fn failed(sample_id: usize, sample: &Sample, error: impl Into<String>) -> Self {
        Self {
            sample_id,
            question: sample.question.clone(),
            db_id: sample.db_id.clone(),
            gold_sql: sample.gold_sql.clone(),
            gen_sql: String::new(),
            exact_match: false,
            valid_sql: false,
            exec_match: false,
            clauses: Vec::new(),
            correction_attempts: 0,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseStats {
    pub samples: usize,
    pub execution_accuracy: usize,
    pub execution_accuracy_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub model: String,
    pub total_samples: usize,
    pub exact_match: usize,
    pub valid_sql: usize,
    pub execution_accuracy: usize,
    pub exact_match_rate: f64,
    pub valid_sql_rate: f64,
    pub execution_accuracy_rate: f64,
    pub duration_seconds: f64,
    pub avg_time_per_sample: f64,
    pub max_correction_attempts: u8,
    pub interrupted: bool,
    pub clause_breakdown: BTreeMap<ClauseTag, ClauseStats>,
    pub timestamp: DateTime<Local>,
}

impl RunSummary {
    pub fn from_results(
        model: &str,
        results: &[SampleResult],
        duration: Duration,
        max_correction_attempts: u8,
        interrupted: bool,
    ) -> Self {
        let total = results.len();
        let exact_match = results.iter().filter(|r| r.exact_match).count();
        let valid_sql = results.iter().filter(|r| r.valid_sql).count();
        let execution_accuracy = results.iter().filter(|r| r.exec_match).count();
        let duration_seconds = duration.as_secs_f64();

        let mut clause_breakdown: BTreeMap<ClauseTag, ClauseStats> = BTreeMap::new();
        for result in results {
            for tag in &result.clauses {
                let stats = clause_breakdown.entry(*tag).or_insert(ClauseStats {
                    samples: 0,
                    execution_accuracy: 0,
                    execution_accuracy_rate: 0.0,
                });
                stats.samples += 1;
                if result.exec_match {
                    stats.execution_accuracy += 1;
                }
            }
        }
        for stats in clause_breakdown.values_mut() {
            stats.execution_accuracy_rate = rate(stats.execution_accuracy, stats.samples);
        }

        Self {
            run_id: Uuid::new_v4(),
            model: model.to_string(),
            total_samples: total,
            exact_match,
            valid_sql,
            execution_accuracy,
            exact_match_rate: rate(exact_match, total),
            valid_sql_rate: rate(valid_sql, total),
            execution_accuracy_rate: rate(execution_accuracy, total),
            duration_seconds,
            avg_time_per_sample: if total > 0 {
                round_to(duration_seconds / total as f64, 2)
            } else {
                0.0
            },
            max_correction_attempts,
            interrupted,
            clause_breakdown,
            timestamp: Local::now(),
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |n: usize| {
            if self.total_samples > 0 {
                n as f64 / self.total_samples as f64 * 100.0
            } else {
                0.0
            }
        };

        writeln!(f, "Model: {}", self.model)?;
        if self.interrupted {
            writeln!(f, "Run was interrupted; partial results below")?;
        }
        writeln!(
            f,
            "Total time: {:.1} seconds ({:.1} minutes)",
            self.duration_seconds,
            self.duration_seconds / 60.0
        )?;
        writeln!(f, "Average time per sample: {:.1} seconds", self.avg_time_per_sample)?;
        writeln!(
            f,
            "  Exact Match:        {}/{} = {:.2}%",
            self.exact_match,
            self.total_samples,
            pct(self.exact_match)
        )?;
        writeln!(
            f,
            "  Valid SQL:          {}/{} = {:.2}%",
            self.valid_sql,
            self.total_samples,
            pct(self.valid_sql)
        )?;
        write!(
            f,
            "  Execution Accuracy: {}/{} = {:.2}%",
            self.execution_accuracy,
            self.total_samples,
            pct(self.execution_accuracy)
        )?;
        for (tag, stats) in &self.clause_breakdown {
            write!(
                f,
                "\n    {:<10} {}/{} = {:.2}%",
                tag.as_str(),
                stats.execution_accuracy,
                stats.samples,
                stats.execution_accuracy_rate * 100.0
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub results: Vec<SampleResult>,
}

impl RunReport {
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// `results/<name>` when a name is given, else `results/eval_<N>samples_<timestamp>.json`.
pub fn output_path(results_dir: &Path, num_samples: usize, name: Option<&str>) -> PathBuf {
    match name {
        Some(name) => results_dir.join(name),
        None => results_dir.join(format!(
            "eval_{}samples_{}.json",
            num_samples,
            Local::now().format("%Y%m%d_%H%M%S")
        )),
    }
}

fn rate(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round_to(count as f64 / total as f64, 4)
    }
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}
