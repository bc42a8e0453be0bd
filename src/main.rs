// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::app_config::{Config, RefinementProviderKind};
use crate::document_format::DocumentFormat;
use crate::errors::AppError;
use crate::pipeline::{CommandTranslator, DocumentPipeline, PipelineEvent};
use crate::refinement::RefinementEvent;

mod app_config;
mod converter;
mod document_format;
mod errors;
mod file_utils;
mod pipeline;
mod providers;
mod reconstructor;
mod refinement;
mod segment;
mod segmenter;

/// CLI Wrapper for RefinementProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliRefinementProvider {
    Ollama,
    LMStudio,
    OpenAI,
    Anthropic,
    Gemini,
}

impl From<CliRefinementProvider> for RefinementProviderKind {
    fn from(cli_provider: CliRefinementProvider) -> Self {
        match cli_provider {
            CliRefinementProvider::Ollama => RefinementProviderKind::Ollama,
            CliRefinementProvider::LMStudio => RefinementProviderKind::LMStudio,
            CliRefinementProvider::OpenAI => RefinementProviderKind::OpenAI,
            CliRefinementProvider::Anthropic => RefinementProviderKind::Anthropic,
            CliRefinementProvider::Gemini => RefinementProviderKind::Gemini,
        }
    }
}

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

fn level_filter(level: &app_config::LogLevel) -> LevelFilter {
    match level {
        app_config::LogLevel::Error => LevelFilter::Error,
        app_config::LogLevel::Warn => LevelFilter::Warn,
        app_config::LogLevel::Info => LevelFilter::Info,
        app_config::LogLevel::Debug => LevelFilter::Debug,
        app_config::LogLevel::Trace => LevelFilter::Trace,
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a document (default command)
    #[command(alias = "translate")]
    Translate(TranslateArgs),

    /// List models available on the configured local refinement backend
    Models {
        /// Configuration file path
        #[arg(short, long, default_value = "conf.json")]
        config_path: String,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Input document to translate (.txt, .docx, .epub, .pdf)
    #[arg(value_name = "INPUT_PATH")]
    input_path: PathBuf,

    /// Output document path (defaults to <input>_translated.<ext>)
    #[arg(value_name = "OUTPUT_PATH")]
    output_path: Option<PathBuf>,

    /// Refine the machine translation with the configured AI provider
    #[arg(short, long)]
    refine: bool,

    /// Refinement provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliRefinementProvider>,

    /// Model name to use for refinement
    #[arg(short, long)]
    model: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

/// doctrans - AI-assisted document translation
///
/// Translates TXT, DOCX, EPUB and PDF documents through an external
/// translation engine, optionally refining the result with an LLM backend,
/// and rebuilds the original container format around the translated text.
#[derive(Parser, Debug)]
#[command(name = "doctrans")]
#[command(version = "1.0.0")]
#[command(about = "AI-assisted document translation tool")]
#[command(long_about = "doctrans splits a document into translatable segments, feeds each one to
the configured translation engine, optionally refines the machine translation
with an LLM backend, and reassembles the translated document.

EXAMPLES:
    doctrans book.epub                        # Translate using default config
    doctrans report.docx out.docx -r          # Translate and refine with AI
    doctrans paper.pdf -r -p ollama -m qwen2  # Refine via a local Ollama model
    doctrans models                           # List local backend models

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a
    different config file with --config. If the config file doesn't exist, a
    default one will be created automatically.

SUPPORTED REFINEMENT PROVIDERS:
    ollama    - Local Ollama server (http://localhost:11434)
    lmstudio  - LM Studio local server (http://localhost:1234)
    openai    - OpenAI API (requires API key)
    anthropic - Anthropic Claude API (requires API key)
    gemini    - Google Gemini API (requires API key)")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Input document to translate
    #[arg(value_name = "INPUT_PATH")]
    input_path: Option<PathBuf>,

    /// Output document path (defaults to <input>_translated.<ext>)
    #[arg(value_name = "OUTPUT_PATH")]
    output_path: Option<PathBuf>,

    /// Refine the machine translation with the configured AI provider
    #[arg(short, long)]
    refine: bool,

    /// Refinement provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliRefinementProvider>,

    /// Model name to use for refinement
    #[arg(short, long)]
    model: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json")]
    config_path: String,

    /// Set logging level
    #[arg(short, long, value_enum)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @creates: New logger with specified level
    fn new(level: LevelFilter) -> Self {
        CustomLogger { level }
    }

    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        let logger = Box::new(CustomLogger::new(level));
        log::set_boxed_logger(logger)?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI color code for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let color = Self::color_for_level(record.level());

            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:5} {}\x1B[0m",
                color,
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize the logger once with info level by default
    // We'll update the level after loading the config if needed
    CustomLogger::init(LevelFilter::Info)?;

    // Parse command line arguments using clap
    let cli = CommandLineOptions::parse();

    match cli.command {
        Some(Commands::Models { config_path }) => run_models(&config_path).await,
        Some(Commands::Translate(args)) => run_translate(args).await,
        None => {
            // Default behavior - use top-level args
            let input_path = cli
                .input_path
                .ok_or_else(|| anyhow!("INPUT_PATH is required when no subcommand is specified"))?;

            let translate_args = TranslateArgs {
                input_path,
                output_path: cli.output_path,
                refine: cli.refine,
                provider: cli.provider,
                model: cli.model,
                config_path: cli.config_path,
                log_level: cli.log_level,
            };
            run_translate(translate_args).await
        }
    }
}

/// Load the configuration file, creating a default one when missing
fn load_config(config_path: &str) -> Result<Config> {
    if Path::new(config_path).exists() {
        let file = File::open(config_path)
            .context(format!("Failed to open config file: {}", config_path))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .context(format!("Failed to parse config file: {}", config_path))
    } else {
        warn!(
            "Config file not found at '{}', creating default config.",
            config_path
        );
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(config_path, config_json)
            .context(format!("Failed to write default config to file: {}", config_path))?;
        Ok(config)
    }
}

async fn run_translate(options: TranslateArgs) -> Result<()> {
    // If log level is set via command line, apply it immediately
    if let Some(cmd_log_level) = &options.log_level {
        let config_log_level: app_config::LogLevel = cmd_log_level.clone().into();
        log::set_max_level(level_filter(&config_log_level));
    }

    let mut config = load_config(&options.config_path)?;

    // Override config with CLI options if provided
    if options.refine {
        config.refinement.enabled = true;
    }
    if let Some(provider) = &options.provider {
        config.refinement.provider = provider.clone().into();
    }
    if let Some(model) = &options.model {
        config.refinement.model = model.clone();
    }
    if let Some(log_level) = &options.log_level {
        config.log_level = log_level.clone().into();
    }

    // Validate the configuration after loading and overriding
    config
        .validate()
        .context("Configuration validation failed")?;

    // If log level was not set via command line, update it from config now
    if options.log_level.is_none() {
        log::set_max_level(level_filter(&config.log_level));
    }

    let input_path = options.input_path;
    if !file_utils::FileManager::file_exists(&input_path) {
        return Err(anyhow!("Input file does not exist: {:?}", input_path));
    }
    let format = DocumentFormat::from_path(&input_path)
        .map_err(|e| anyhow!("{}", e))?;

    // PDF comes back out as DOCX; everything else keeps its own extension
    let output_extension = match format {
        DocumentFormat::Pdf => "docx",
        other => other.extension(),
    };
    let output_path = options
        .output_path
        .unwrap_or_else(|| file_utils::FileManager::default_output_path(&input_path, output_extension));

    let translator = CommandTranslator::from_config(&config.engine)
        .map_err(|e| anyhow!("{}", e))?;

    // Progress rendering: one bar for segments, one for refinement chunks
    let multi_progress = MultiProgress::new();
    let translation_bar = multi_progress.add(ProgressBar::new(0));
    translation_bar.set_style(
        ProgressStyle::with_template("{prefix:>10} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    translation_bar.set_prefix("translate");

    let refine_bar = if config.refinement.enabled {
        let bar = multi_progress.add(ProgressBar::new(0));
        bar.set_style(
            ProgressStyle::with_template("{prefix:>10} [{bar:40.green/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_prefix("refine");
        Some(bar)
    } else {
        None
    };

    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();
    let progress_task = {
        let translation_bar = translation_bar.clone();
        let refine_bar = refine_bar.clone();
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                match event {
                    PipelineEvent::TranslationProgress { current, total } => {
                        translation_bar.set_length(total as u64);
                        translation_bar.set_position(current as u64);
                    }
                    PipelineEvent::Refinement(RefinementEvent::Progress { completed, total }) => {
                        if let Some(bar) = &refine_bar {
                            bar.set_length(total as u64);
                            bar.set_position(completed as u64);
                        }
                    }
                    PipelineEvent::Refinement(RefinementEvent::Partial(_)) => {}
                    PipelineEvent::Warning(message) => {
                        warn!("{}", message);
                    }
                }
            }
        })
    };

    let mut pipeline =
        DocumentPipeline::new(&input_path, &output_path, config).with_events(events_tx);

    // Ctrl-C requests cooperative cancellation
    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested");
            cancel.cancel();
        }
    });

    let result = pipeline.run(&translator).await;
    // The pipeline holds the event sender; dropping it lets the progress
    // task drain and finish
    drop(pipeline);
    let _ = progress_task.await;
    translation_bar.finish_and_clear();
    if let Some(bar) = refine_bar {
        bar.finish_and_clear();
    }

    match result {
        Ok(report) => {
            println!(
                "Successfully saved to: {} ({} segments{})",
                report.output_path.display(),
                report.segments,
                if report.refined_segments > 0 {
                    format!(", {} refined", report.refined_segments)
                } else {
                    String::new()
                }
            );
            Ok(())
        }
        Err(AppError::Cancelled) => {
            println!("Translation cancelled");
            Ok(())
        }
        Err(e) => Err(anyhow!("{}", e)),
    }
}

async fn run_models(config_path: &str) -> Result<()> {
    let config = load_config(config_path)?;

    let models = match &config.refinement.provider {
        RefinementProviderKind::Ollama => {
            let client = providers::ollama::Ollama::from_config(&config.refinement);
            client.list_models().await.map_err(|e| anyhow!("{}", e))?
        }
        RefinementProviderKind::LMStudio => {
            let client = providers::lmstudio::LMStudio::from_config(&config.refinement);
            client.list_models().await.map_err(|e| anyhow!("{}", e))?
        }
        other => {
            return Err(anyhow!(
                "Model discovery is only available for local providers, not {}",
                other.display_name()
            ));
        }
    };

    if models.is_empty() {
        println!("No models reported by the backend");
    } else {
        for model in models {
            println!("{}", model);
        }
    }
    Ok(())
}
