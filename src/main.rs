use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use student_outcome::api::{self, AppState};
use student_outcome::client::PredictClient;
use student_outcome::dashboard::{self, DashboardState};
use student_outcome::model::load_artifact;
use student_outcome::prediction;
use student_outcome::record::StudentRecord;
use student_outcome::report;

const DEFAULT_MODEL_PATH: &str = "models/xgboost/xgboost-model.json";

#[derive(Parser)]
#[command(name = "student-outcome")]
#[command(about = "Student dropout risk prediction service and dashboard", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve predictions over HTTP
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
    },
    /// Serve the form dashboard
    Dashboard {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 8501)]
        port: u16,
        #[arg(long, default_value = "http://127.0.0.1:8000")]
        api_url: String,
    },
    /// Score one record from a JSON file and print the outcome
    Predict {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        model: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve { host, port, model } => {
            let state = AppState::load(&model).with_context(|| {
                format!("failed to load model artifact from {}", model.display())
            })?;
            let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                .await
                .with_context(|| format!("failed to bind {host}:{port}"))?;
            api::serve(listener, Arc::new(state))
                .await
                .context("prediction service stopped")?;
        }
        Commands::Dashboard {
            host,
            port,
            api_url,
        } => {
            let state = DashboardState {
                client: PredictClient::new(&api_url),
            };
            let listener = tokio::net::TcpListener::bind((host.as_str(), port))
                .await
                .with_context(|| format!("failed to bind {host}:{port}"))?;
            dashboard::serve(listener, Arc::new(state))
                .await
                .context("dashboard stopped")?;
        }
        Commands::Predict { input, model, out } => {
            let classifier = load_artifact(&model).with_context(|| {
                format!("failed to load model artifact from {}", model.display())
            })?;
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            let payload: serde_json::Value = serde_json::from_str(&text)
                .with_context(|| format!("{} is not valid JSON", input.display()))?;
            let record = StudentRecord::from_value(&payload)?;
            let result = prediction::predict(&classifier, &record)?;

            println!(
                "Prediction: {} ({:.1}% confidence)",
                result.prediction,
                result.probability * 100.0
            );

            if let Some(out) = out {
                let report = report::build_report(
                    &record,
                    &result,
                    &model.display().to_string(),
                    chrono::Utc::now(),
                );
                std::fs::write(&out, report)?;
                println!("Report written to {}.", out.display());
            }
        }
    }

    Ok(())
}
