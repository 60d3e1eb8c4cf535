//! Evaluation Configuration
//!
//! Explicit configuration value handed to the adapters at startup. Values come
//! from the environment (optionally a `.env` file) and are overridden by CLI
//! flags in `main.rs`.

use crate::error::{EvalError, Result};
use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_MAX_CORRECTION_ATTEMPTS: u8 = 3;

#[derive(Debug, Clone)]
pub struct EvalConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Pinned to 0.0 for reproducible evaluation.
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_correction_attempts: u8,
    /// Stop the correction loop when the generator hands back a candidate
    /// that was already tried.
    pub abort_on_repeat: bool,
    pub dataset_path: PathBuf,
    pub database_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_tokens: 2048,
            request_timeout_secs: 120,
            max_correction_attempts: DEFAULT_MAX_CORRECTION_ATTEMPTS,
            abort_on_repeat: true,
            dataset_path: PathBuf::from("../spider/dev.json"),
            database_dir: PathBuf::from("../spider/database"),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl EvalConfig {
    /// Build a configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        let request_timeout_secs = std::env::var("LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.request_timeout_secs);

        Self {
            api_key,
            base_url: std::env::var("OPENAI_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            request_timeout_secs,
            dataset_path: std::env::var("SPIDER_DATASET")
                .map(PathBuf::from)
                .unwrap_or(defaults.dataset_path),
            database_dir: std::env::var("SPIDER_DATABASE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_dir),
            ..defaults
        }
    }

    /// API key, or a configuration error when none was provided.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            EvalError::Config(
                "no API key configured (set OPENAI_API_KEY or DEEPSEEK_API_KEY, or pass --api-key)"
                    .to_string(),
            )
        })
    }

    /// Problems that would prevent a run from starting. Empty means ready.
    pub fn prerequisite_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.api_key.is_none() {
            issues.push("API key is not set (OPENAI_API_KEY or DEEPSEEK_API_KEY)".to_string());
        }
        if !self.dataset_path.is_file() {
            issues.push(format!("Dataset file not found: {}", self.dataset_path.display()));
        }
        if !self.database_dir.is_dir() {
            issues.push(format!("Database directory not found: {}", self.database_dir.display()));
        }
        if self.max_correction_attempts == 0 {
            issues.push("max correction attempts must be at least 1".to_string());
        }
        issues
    }
}
