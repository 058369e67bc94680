use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use fieldex::config::LayoutMode;
use fieldex::pipeline::{Backends, LogProgress, Pipeline, PipelineConfig};
use fieldex::processor::PageOutcome;
use fieldex::telemetry::{init_logging, LogFormat};
use fieldex::WorkflowService;

#[derive(Parser)]
#[command(name = "fieldex")]
#[command(about = "Extract reviewable field records from PDF and image documents")]
#[command(version)]
struct Cli {
    /// Project directory holding config/, input/, output/ and logs/
    #[arg(short, long, global = true, default_value = ".")]
    root: PathBuf,

    /// Log output format
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum LogFormatArg {
    #[default]
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum LayoutArg {
    UniformBlock,
    SingleColumn,
    SparseText,
}

impl From<LayoutArg> for LayoutMode {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::UniformBlock => LayoutMode::UniformBlock,
            LayoutArg::SingleColumn => LayoutMode::SingleColumn,
            LayoutArg::SparseText => LayoutMode::SparseText,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Extract every inbox document into the review CSV
    Extract,

    /// Hand approved rows to the downstream import and file the documents
    Upload {
        /// Only write the access-ready CSV, skip the import command
        #[arg(long)]
        csv_only: bool,
    },

    /// Check that the configured import command and database exist
    CheckSink,

    /// Print the resolved text of a single document, page by page
    Ocr {
        /// PDF or image file
        file: PathBuf,

        /// Page layout hint for the recognizer
        #[arg(short, long, value_enum)]
        layout: Option<LayoutArg>,

        /// Recognizer languages, e.g. "eng" or "deu"
        #[arg(long, value_delimiter = ',')]
        languages: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format.into()).context("Failed to initialize logging")?;

    let service = WorkflowService::new(&cli.root);

    match cli.command {
        Commands::Extract => {
            let config = service.load_config().context("Failed to load configuration")?;
            let backends = Backends::tesseract(&config.ocr);
            let summary = service
                .extract_for_review(&config, &backends, Arc::new(LogProgress::new()))
                .context("Extraction failed")?;

            let flagged = summary.records.iter().filter(|r| !r.extraction_ok).count();
            println!(
                "Extracted {} document(s), {} need attention",
                summary.records.len(),
                flagged
            );
            println!("Review CSV: {}", summary.review_csv.display());
        }

        Commands::Upload { csv_only } => {
            let config = service.load_config().context("Failed to load configuration")?;
            let sink = service.configured_sink(&config, csv_only);
            let summary = service
                .upload(&config, sink.as_ref(), Arc::new(LogProgress::new()))
                .context("Upload failed")?;

            println!(
                "{} approved, {} pending, {} archived, {} rejected",
                summary.approved_count,
                summary.pending_count,
                summary.moved_to_archive.len(),
                summary.moved_to_rejected.len()
            );
            if !summary.already_filed.is_empty() {
                println!(
                    "Skipped {} row(s) filed by an earlier upload",
                    summary.already_filed.len()
                );
            }
            println!("Log: {}", summary.log_path.display());
            if let Some(error) = summary.error {
                anyhow::bail!("Import failed: {}", error);
            }
        }

        Commands::CheckSink => {
            let config = service.load_config().context("Failed to load configuration")?;
            service.check_sink(&config)?;
            println!("Import command and database found");
        }

        Commands::Ocr {
            file,
            layout,
            languages,
        } => {
            if !file.exists() {
                anyhow::bail!("File does not exist: {}", file.display());
            }

            let mut config = PipelineConfig::with_fields(Vec::new());
            if let Some(layout) = layout {
                config.ocr.layout = layout.into();
            }
            if !languages.is_empty() {
                config.ocr.languages = languages;
            }

            let backends = Backends::tesseract(&config.ocr);
            let pipeline = Pipeline::from_config(Arc::new(config), &backends)?;

            info!("Resolving {}", file.display());
            let pages = pipeline
                .resolve_file(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;

            for page in pages {
                let source = match page.outcome {
                    PageOutcome::Embedded => "embedded text".to_string(),
                    PageOutcome::Ocr => "OCR".to_string(),
                    PageOutcome::Unresolved(reason) => format!("unresolved: {}", reason),
                };
                println!("=== Page {} ({}) ===", page.index + 1, source);
                println!("{}", page.text);
            }
        }
    }

    Ok(())
}
