use sql_of_thought::config::EvalConfig;
use sql_of_thought::dataset::load_samples;
use sql_of_thought::execution::SqliteExecutor;
use sql_of_thought::llm::LlmClient;
use sql_of_thought::pipeline::Pipeline;
use sql_of_thought::report::output_path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sql-of-thought")]
#[command(about = "Multi-agent NL2SQL evaluation on Spider-format datasets")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the pipeline on the first N samples of the dataset
    Run {
        /// Number of samples to evaluate
        #[arg(short = 'n', long, default_value_t = 100)]
        samples: usize,

        /// Output file name under the results directory
        #[arg(short, long)]
        output: Option<String>,

        /// Path to the Spider dev/train JSON file (or set SPIDER_DATASET)
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// Directory holding <db_id>/<db_id>.sqlite (or set SPIDER_DATABASE_DIR)
        #[arg(long)]
        database_dir: Option<PathBuf>,

        /// Model name (or set OPENAI_MODEL)
        #[arg(long)]
        model: Option<String>,

        /// Correction loop budget per sample
        #[arg(long)]
        max_attempts: Option<u8>,

        /// API key (or set OPENAI_API_KEY / DEEPSEEK_API_KEY)
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Check that the API key, dataset and databases are in place
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut config = EvalConfig::from_env();

    match args.command {
        Commands::Check => {
            let issues = config.prerequisite_issues();
            if issues.is_empty() {
                println!("✅ All prerequisites satisfied");
                println!("   Model:     {}", config.model);
                println!("   Dataset:   {}", config.dataset_path.display());
                println!("   Databases: {}", config.database_dir.display());
                return Ok(());
            }
            for issue in &issues {
                println!("❌ {}", issue);
            }
            anyhow::bail!("{} prerequisite(s) missing", issues.len());
        }
        Commands::Run {
            samples,
            output,
            dataset,
            database_dir,
            model,
            max_attempts,
            api_key,
        } => {
            if let Some(dataset) = dataset {
                config.dataset_path = dataset;
            }
            if let Some(database_dir) = database_dir {
                config.database_dir = database_dir;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(max_attempts) = max_attempts {
                config.max_correction_attempts = max_attempts;
            }
            if api_key.is_some() {
                config.api_key = api_key;
            }

            let issues = config.prerequisite_issues();
            if !issues.is_empty() {
                for issue in &issues {
                    error!("{}", issue);
                }
                anyhow::bail!("cannot start evaluation: {} prerequisite(s) missing", issues.len());
            }

            run(config, samples, output).await
        }
    }
}

async fn run(config: EvalConfig, num_samples: usize, output: Option<String>) -> Result<()> {
    info!("SQL-of-Thought evaluation starting...");
    info!("Model: {} ({})", config.model, config.base_url);

    let samples = load_samples(&config.dataset_path, Some(num_samples))?;
    info!("Evaluating {} samples", samples.len());

    let llm = Arc::new(LlmClient::new(&config)?);
    let executor = Arc::new(SqliteExecutor::new(config.database_dir.clone()));
    let pipeline = Pipeline::from_config(llm, executor, &config);

    let report = pipeline.run(&samples, tokio::signal::ctrl_c()).await;

    let path = output_path(&config.results_dir, report.results.len(), output.as_deref());
    report.write_to(&path)?;

    println!("\n{}", "=".repeat(80));
    println!("EVALUATION RESULTS");
    println!("{}", "=".repeat(80));
    println!("{}", report.summary);
    println!("{}", "=".repeat(80));
    info!("✅ Results saved to: {}", path.display());

    Ok(())
}
