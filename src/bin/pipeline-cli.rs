//! # Pipeline CLI
//!
//! Command-line tool for checking pipeline configuration and for running the
//! whole pipeline in memory against fake collaborators.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ocr_pipeline::config::ConfigManager;
use ocr_pipeline::logging::init_structured_logging;
use ocr_pipeline::messaging::{encode_payload, InMemoryBus, MessagePublisher, UploadEvent};
use ocr_pipeline::orchestration::{Pipeline, PipelineHost};
use ocr_pipeline::test_helpers::TestCollaborators;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "pipeline-cli")]
#[command(about = "Inspect and exercise the OCR translate pipeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Environment to load (development, test, production)
    #[arg(short, long, env = "PIPELINE_ENV", default_value = "development")]
    environment: String,

    /// Configuration directory (default: config/pipeline)
    #[arg(short, long, env = "PIPELINE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate configuration, then print it with secrets masked
    Validate,

    /// Run one upload through the in-memory pipeline and print the notifications
    Simulate {
        /// Name of the uploaded image
        #[arg(long, default_value = "sample.jpg")]
        filename: String,

        /// Text the fake OCR engine reads from the image
        #[arg(long)]
        text: String,

        /// Language the fake language detector reports
        #[arg(long, default_value = "en")]
        source_language: String,

        /// Override the configured target languages (comma separated)
        #[arg(long, value_delimiter = ',')]
        targets: Vec<String>,

        /// Maximum host rounds before giving up
        #[arg(long, default_value_t = 10_000)]
        max_rounds: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_structured_logging();

    let manager = ConfigManager::load_from_directory_with_env(cli.config_dir, &cli.environment)
        .with_context(|| format!("loading configuration for {}", cli.environment))?;

    match cli.command {
        Commands::Validate => {
            println!("✅ Configuration for '{}' is valid", manager.environment());
            println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
        }
        Commands::Simulate {
            filename,
            text,
            source_language,
            targets,
            max_rounds,
        } => {
            let mut config = manager.config().clone();
            if !targets.is_empty() {
                config.languages.targets = targets;
            }

            let bus = Arc::new(InMemoryBus::new());
            let fakes = TestCollaborators::new().with_text(&filename, &text, &source_language);
            let pipeline = Pipeline::new(config, bus.clone(), fakes.bundle())?;
            let host = PipelineHost::new(Arc::new(pipeline), bus.clone());

            let uploads = host.pipeline().config().topics.uploads.clone();
            bus.publish(&uploads, encode_payload(&UploadEvent::new("uploads", &filename))?)
                .await?;
            let stats = host.run_until_idle(max_rounds).await?;
            info!(?stats, "Simulation finished");

            let bucket = &host.pipeline().config().storage.result_bucket;
            let artifacts: Vec<_> = fakes
                .blob_store
                .keys(bucket)
                .into_iter()
                .map(|key| {
                    let content = fakes
                        .blob_store
                        .contents(bucket, &key)
                        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                        .unwrap_or_default();
                    serde_json::json!({ "artifact": key, "content": content })
                })
                .collect();

            let summary = serde_json::json!({
                "artifacts": artifacts,
                "sms": fakes.sms.sent(),
                "calls": fakes.call.placed(),
                "deliveries": {
                    "received": stats.received,
                    "acked": stats.acked,
                    "dropped": stats.dropped,
                    "redelivered": stats.redelivered,
                    "dead_lettered": stats.dead_lettered,
                },
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
