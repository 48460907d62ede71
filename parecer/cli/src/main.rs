//! Parecer - Legal Document Analysis in the Terminal
//!
//! Interactive surface over `parecer-core`. The model's answer streams to
//! stdout; logs and notices go to stderr.
//!
//! # Usage
//!
//! ```bash
//! # Analyze a PDF right away, then ask follow-ups
//! parecer --pdf inquerito.pdf
//!
//! # Local model through Ollama
//! parecer --backend ollama --model llama3.2 --text caso.txt
//!
//! # Verbose logging
//! RUST_LOG=debug parecer
//! ```
//!
//! # Commands
//!
//! See `/help` inside the loop.

mod printer;
mod repl;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use parecer_core::{
    load_config_from_path, Analyst, AnalystConfig, BackendKind, ConfigOverrides,
    DocumentExtractor, ModelBackend,
};

use printer::EventPrinter;
use repl::Repl;

/// Capacity of the analyst-to-terminal event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Parecer - legal analysis of police inquiries with a language model
#[derive(Parser, Debug)]
#[command(name = "parecer")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "PARECER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Model backend (gemini, ollama)
    #[arg(short = 'b', long, value_name = "BACKEND")]
    backend: Option<BackendKind>,

    /// Model identifier
    #[arg(short = 'm', long, value_name = "ID")]
    model: Option<String>,

    /// PDF to analyze on startup
    #[arg(long, value_name = "FILE", conflicts_with = "text")]
    pdf: Option<PathBuf>,

    /// Plain-text file to analyze on startup
    #[arg(long, value_name = "FILE")]
    text: Option<PathBuf>,

    /// Prompt template file
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Default path for `/save`
    #[arg(long, value_name = "FILE")]
    html_out: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "PARECER_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(backend) = self.backend {
            overrides = overrides.with_backend(backend);
        }
        if let Some(model) = &self.model {
            overrides = overrides.with_model(model.clone());
        }
        if let Some(path) = &self.template {
            overrides = overrides.with_template_path(path.clone());
        }
        if let Some(path) = &self.html_out {
            overrides = overrides.with_html_out(path.clone());
        }
        overrides
    }
}

/// Initialize logging on stderr with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("parecer={level},parecer_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

/// Load configuration before any runtime exists, then run the loop
fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "parecer starting");

    let mut config =
        load_config_from_path(args.config.clone()).context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid configuration")?;
    info!(
        source = %config.source(),
        backend = %config.model.backend,
        model = %config.model.model,
        "Configuration resolved"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let result = runtime.block_on(run(args, config));

    info!("parecer stopped");
    result
}

async fn run(args: Args, config: AnalystConfig) -> Result<()> {
    let composer = config
        .composer()
        .await
        .context("Failed to load prompt template")?;
    let backend =
        ModelBackend::from_config(&config.model).context("Failed to create model backend")?;
    if !backend.health_check().await {
        warn!(
            host = %config.model.ollama_host,
            port = config.model.ollama_port,
            "Ollama is not reachable; requests will fail until it is running"
        );
    }

    let extractor = DocumentExtractor::default().with_max_bytes(config.max_document_bytes);
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let analyst = Analyst::new(
        Arc::new(backend),
        config.model.model.clone(),
        composer,
        extractor,
    )
    .with_events(event_tx);

    let printer = tokio::spawn(EventPrinter::new().run(event_rx));

    let initial = args.pdf.or(args.text);
    let result = Repl::new(analyst, config.html_out).run(initial).await;

    // Repl owned the last event sender; the printer drains and exits
    if let Err(e) = printer.await {
        warn!(error = %e, "Event printer task failed");
    }

    result
}
