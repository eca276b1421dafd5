// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{anyhow, Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn, Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use scriptdle_parser::app_config::{Config, LogLevel, ProviderKind};
use scriptdle_parser::file_utils::FileManager;
use scriptdle_parser::pipeline::{BatchSummary, ParseOptions, Parsed, Pipeline, UnitOutcome};
use scriptdle_parser::providers;
use scriptdle_parser::scrapers::ImsdbClient;
use scriptdle_parser::SourceFamily;

/// CLI Wrapper for ProviderKind to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliProvider {
    Gemini,
    Anthropic,
    #[value(name = "openai")]
    OpenAI,
    Ollama,
}

impl From<CliProvider> for ProviderKind {
    fn from(cli_provider: CliProvider) -> Self {
        match cli_provider {
            CliProvider::Gemini => ProviderKind::Gemini,
            CliProvider::Anthropic => ProviderKind::Anthropic,
            CliProvider::OpenAI => ProviderKind::OpenAI,
            CliProvider::Ollama => ProviderKind::Ollama,
        }
    }
}

/// Language model overrides shared by the commands that can use one
#[derive(Args, Debug, Clone)]
struct LlmArgs {
    /// Language model provider to use
    #[arg(short, long, value_enum)]
    provider: Option<CliProvider>,

    /// Model name to use
    #[arg(short, long)]
    model: Option<String>,
}

/// Document metadata and parser choice
#[derive(Args, Debug, Clone)]
struct DocumentArgs {
    /// Output id (defaults to the slug of the title)
    #[arg(long)]
    id: Option<String>,

    /// Movie title (defaults to the detected title or the file name)
    #[arg(long)]
    title: Option<String>,

    /// Release year
    #[arg(long)]
    year: Option<i32>,

    /// Parse with the language model instead of the heuristic parser
    #[arg(long)]
    llm: bool,

    /// Force a heuristic parser family (pdf, ocr, preformatted, structured, transcript)
    #[arg(long)]
    family: Option<SourceFamily>,
}

impl DocumentArgs {
    fn options(&self) -> ParseOptions {
        ParseOptions {
            id: self.id.clone(),
            title: self.title.clone(),
            year: self.year,
            use_llm: self.llm,
            family: self.family,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse a local PDF, HTML or text script
    Parse {
        /// Script file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[command(flatten)]
        document: DocumentArgs,

        #[command(flatten)]
        llm: LlmArgs,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch and parse a script or transcript page
    ParseUrl {
        #[arg(value_name = "URL")]
        url: String,

        #[command(flatten)]
        document: DocumentArgs,

        #[command(flatten)]
        llm: LlmArgs,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download scripts from IMSDb
    Download {
        /// Download only the first script whose title contains this
        #[arg(short, long)]
        title: Option<String>,

        /// Maximum number of scripts to download
        #[arg(short, long, default_value_t = 5)]
        limit: usize,

        /// Directory for downloaded scripts
        #[arg(short, long, default_value = "scripts")]
        output: PathBuf,
    },

    /// Parse every script in a directory
    Batch {
        #[arg(value_name = "DIR")]
        dir: PathBuf,

        /// Parse with the language model instead of the heuristic parser
        #[arg(long)]
        llm: bool,

        #[command(flatten)]
        llm_args: LlmArgs,

        /// Directory for JSON output
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Pick the best script for a subtitle track and fuse the two
    Fuse {
        /// SRT subtitle file
        #[arg(value_name = "SUBTITLE")]
        subtitle: PathBuf,

        /// Candidate script files
        #[arg(value_name = "SCRIPT", required = true)]
        scripts: Vec<PathBuf>,

        /// Movie title (defaults to the subtitle file name)
        #[arg(long)]
        title: Option<String>,

        /// Release year
        #[arg(long)]
        year: Option<i32>,

        #[command(flatten)]
        llm: LlmArgs,

        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate shell completions for scriptdle
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Scriptdle - screenplay dialogue extraction
///
/// Extracts character-attributed dialogue from screenplays and transcripts
/// (PDF, HTML, wiki pages, plain text) into a canonical JSON record.
#[derive(Parser, Debug)]
#[command(name = "scriptdle")]
#[command(version)]
#[command(about = "Screenplay dialogue extraction tool")]
#[command(long_about = "Scriptdle extracts character-attributed dialogue from screenplays and transcripts.

EXAMPLES:
    scriptdle parse shrek.pdf --year 2001              # Heuristic parse of a PDF
    scriptdle parse shrek.pdf --llm -p gemini          # Whole-PDF parse with Gemini
    scriptdle parse-url https://example.com/script.html -o shrek.json
    scriptdle download --title Shrek                   # Fetch one script from IMSDb
    scriptdle batch scripts/ -o output/                # Parse a whole directory
    scriptdle fuse shrek.srt a.pdf b.html --year 2001  # Select the best script and fuse
    scriptdle completions bash > scriptdle.bash        # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically.

SUPPORTED PROVIDERS:
    gemini    - Google Gemini API (GEMINI_API_KEY, accepts whole PDFs)
    anthropic - Anthropic API (ANTHROPIC_API_KEY)
    openai    - OpenAI API (OPENAI_API_KEY)
    ollama    - Local Ollama server")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

// @struct: Custom logger implementation, filtered by `log::max_level`
struct CustomLogger;

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn colour_for_level(level: Level) -> &'static str {
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
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let mut stderr = std::io::stderr();
            let _ = writeln!(
                stderr,
                "{}{} {:<5} {}\x1B[0m",
                Self::colour_for_level(record.level()),
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

fn level_filter(level: &LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error => LevelFilter::Error,
        LogLevel::Warn => LevelFilter::Warn,
        LogLevel::Info => LevelFilter::Info,
        LogLevel::Debug => LevelFilter::Debug,
        LogLevel::Trace => LevelFilter::Trace,
    }
}

/// Load `path`, writing a default config there when it is missing
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let file = File::open(path).with_context(|| format!("Failed to open config file: {:?}", path))?;
        serde_json::from_reader(BufReader::new(file)).with_context(|| format!("Failed to parse config file: {:?}", path))
    } else {
        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        FileManager::write_json(path, &config).context("Failed to write default config")?;
        Ok(config)
    }
}

fn apply_llm_args(config: &mut Config, args: &LlmArgs) {
    if let Some(provider) = &args.provider {
        config.llm.provider = provider.clone().into();
    }
    if let Some(model) = &args.model {
        config.llm.set_model(model.clone());
    }
}

/// Pipeline with a provider attached when one is needed
fn build_pipeline(config: Config, needs_llm: bool) -> Result<Pipeline> {
    if !needs_llm {
        return Ok(Pipeline::new(config));
    }
    let provider = providers::from_config(&config.llm)?;
    info!("Using {} - {}", config.llm.provider.display_name(), config.llm.get_model());
    Ok(Pipeline::new(config).with_provider(provider))
}

fn emit(parsed: &Parsed, output: Option<&Path>) -> Result<()> {
    for warning in &parsed.warnings {
        warn!("Degraded: {}", warning);
    }
    match output {
        Some(path) => {
            FileManager::write_json(path, &parsed.document)?;
            info!(
                "Wrote {} lines from {} characters to {:?}",
                parsed.document.lines().len(),
                parsed.document.characters().len(),
                path
            );
        }
        None => println!("{}", parsed.document.to_json_pretty()?),
    }
    Ok(())
}

fn progress_bar(total: usize) -> ProgressBar {
    let progress_bar = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} sources ({percent}%) {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style.progress_chars("█▓▒░"));
    progress_bar
}

#[tokio::main]
async fn main() -> Result<()> {
    CustomLogger::init(LevelFilter::Info)?;
    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "scriptdle", &mut std::io::stdout());
        return Ok(());
    }

    let mut config = load_config(&cli.config)?;
    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        level_filter(&config.log_level)
    };
    log::set_max_level(level);

    match cli.command {
        Commands::Parse {
            file,
            document,
            llm,
            output,
        } => {
            apply_llm_args(&mut config, &llm);
            config.validate().context("Configuration validation failed")?;
            let pipeline = build_pipeline(config, document.llm)?;
            let parsed = pipeline.parse_file(&file, &document.options()).await?;
            emit(&parsed, output.as_deref())
        }
        Commands::ParseUrl {
            url,
            document,
            llm,
            output,
        } => {
            apply_llm_args(&mut config, &llm);
            config.validate().context("Configuration validation failed")?;
            let pipeline = build_pipeline(config, document.llm)?;
            let parsed = pipeline.parse_url(&url, &document.options()).await?;
            emit(&parsed, output.as_deref())
        }
        Commands::Download { title, limit, output } => {
            let client = ImsdbClient::new(&config.fetch, &output)?;
            match title {
                Some(title) => match client.download_by_title(&title).await? {
                    Some(path) => info!("Downloaded {:?}", path),
                    None => return Err(anyhow!("No script found for {}", title)),
                },
                None => {
                    let saved = client.download_all(Some(limit)).await?;
                    info!("Downloaded {} script(s) to {:?}", saved.len(), output);
                }
            }
            Ok(())
        }
        Commands::Batch {
            dir,
            llm,
            llm_args,
            output,
        } => {
            apply_llm_args(&mut config, &llm_args);
            config.validate().context("Configuration validation failed")?;
            let paths = FileManager::find_sources(&dir)?;
            if paths.is_empty() {
                warn!("No script files found in {:?}", dir);
                return Ok(());
            }

            let pipeline = build_pipeline(config, llm)?;
            let options = ParseOptions {
                use_llm: llm,
                ..ParseOptions::default()
            };
            let pb = progress_bar(paths.len());
            let callback_pb = pb.clone();
            let reports = pipeline
                .run_batch(&paths, &options, move |done, _| callback_pb.set_position(done as u64))
                .await;
            pb.finish_and_clear();

            for (path, report) in paths.iter().zip(&reports) {
                println!("{}", report);
                if let Some(document) = report.outcome.document() {
                    FileManager::write_json(FileManager::json_output_path(path, &output), document)?;
                }
            }

            let summary = BatchSummary::from_reports(&reports);
            info!(
                "{} succeeded, {} degraded, {} failed",
                summary.succeeded, summary.degraded, summary.failed
            );
            if reports.iter().all(|r| matches!(r.outcome, UnitOutcome::Failed(_))) {
                return Err(anyhow!("Every source in {:?} failed", dir));
            }
            Ok(())
        }
        Commands::Fuse {
            subtitle,
            scripts,
            title,
            year,
            llm,
            output,
        } => {
            apply_llm_args(&mut config, &llm);
            config.validate().context("Configuration validation failed")?;
            let movie = title.unwrap_or_else(|| {
                subtitle
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default()
            });
            let pipeline = build_pipeline(config, true)?;
            let outcome = pipeline.fuse_files(&subtitle, &scripts, &movie, year).await?;
            if outcome.report.is_degraded() {
                warn!(
                    "{} of {} fusion parts lost ({} dropped, {} rate-limited)",
                    outcome.report.dropped + outcome.report.throttled,
                    outcome.report.chunks_total,
                    outcome.report.dropped,
                    outcome.report.throttled
                );
            }
            if outcome.fused.low_confidence {
                warn!("Low confidence: best script overlap {:.1}%", outcome.fused.script_overlap_score * 100.0);
            }
            match output {
                Some(path) => {
                    FileManager::write_json(&path, &outcome.fused)?;
                    info!("Wrote {} fused lines to {:?}", outcome.fused.lines.len(), path);
                }
                None => println!("{}", serde_json::to_string_pretty(&outcome.fused)?),
            }
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}
