//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use postforge_core::{
    CancelFlag, EnrichmentPipeline, FormatPipeline, Ingestor, Pacer, RunProgress,
};
use postforge_extract::Extractor;
use postforge_shared::{
    AppConfig, DocumentStore, RunOutcome, RunStatus, RunSummary, config_file_path, expand_home,
    init_config, load_config, load_config_from, read_api_key,
};
use postforge_storage::SqliteStore;
use postforge_synthesis::LlmClient;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Postforge — enrich blog posts with reference-backed synthesis.
#[derive(Parser)]
#[command(
    name = "postforge",
    version,
    about = "Ingest blog posts and enhance them with LLM synthesis over related articles.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Path to the database file (overrides config).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Path to the config file (defaults to ~/.postforge/postforge.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ingest the oldest posts from a blog index page.
    Ingest {
        /// Blog index page URL to read post cards from.
        index_url: String,

        /// How many of the oldest posts to ingest.
        #[arg(short, long, default_value_t = 5)]
        count: usize,
    },

    /// Enhance pending posts with reference-backed synthesis.
    Enrich,

    /// Reformat the raw original text of stored posts.
    Format,

    /// List stored posts and their enrichment state.
    List {
        /// Emit the full documents as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
    /// Print the config file path.
    Path,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "postforge=info",
        1 => "postforge=debug",
        _ => "postforge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Ingest { index_url, count } => cmd_ingest(&cli, index_url, *count).await,
        Command::Enrich => cmd_enrich(&cli).await,
        Command::Format => cmd_format(&cli).await,
        Command::List { json } => cmd_list(&cli, *json).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&cli),
            ConfigAction::Path => cmd_config_path(),
        },
    }
}

/// Load config honoring the global `--config` flag.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(path) => Ok(load_config_from(path)?),
        None => Ok(load_config()?),
    }
}

/// Database path: `--db` flag wins over the configured path.
fn resolve_db_path(cli: &Cli, config: &AppConfig) -> PathBuf {
    cli.db
        .clone()
        .unwrap_or_else(|| expand_home(&config.defaults.db_path))
}

async fn open_store(cli: &Cli, config: &AppConfig) -> Result<SqliteStore> {
    let path = resolve_db_path(cli, config);
    Ok(SqliteStore::open(&path).await?)
}

/// Cancellation flag tripped by ctrl-C. The in-flight document finishes;
/// the run stops before the next one.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupt received, finishing current item...");
            flag.cancel();
        }
    });
    cancel
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ingest(cli: &Cli, index_url: &str, count: usize) -> Result<()> {
    let config = resolve_config(cli)?;
    let url = Url::parse(index_url).map_err(|e| eyre!("invalid index URL '{index_url}': {e}"))?;

    let store = open_store(cli, &config).await?;
    let extractor = Extractor::new()?;
    let pacer = Pacer::new(
        config.pacing.document_delay_ms,
        config.pacing.fetch_delay_ms,
    );

    info!(url = %url, count, "ingesting seed posts");

    let progress = CliProgress::new();
    let summary = Ingestor::new(&store, &extractor, pacer)
        .run(url.as_str(), count, &progress)
        .await?;
    progress.finish();

    print_summary("Ingestion", &summary);
    Ok(())
}

async fn cmd_enrich(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;

    // Fail on missing keys before any document is touched.
    let serp_key = read_api_key(&config.serp.api_key_env)?;
    let openai_key = read_api_key(&config.openai.api_key_env)?;

    let store = open_store(cli, &config).await?;
    let search = postforge_discovery::SerpClient::new(
        &config.serp.base_url,
        serp_key,
        &config.serp.engine,
        config.defaults.max_search_results,
    )?;
    let extractor = Extractor::new()?;
    let synthesizer = LlmClient::new(&config.openai.base_url, openai_key, &config.openai.model)?;
    let pacer = Pacer::new(
        config.pacing.document_delay_ms,
        config.pacing.fetch_delay_ms,
    );
    let cancel = cancel_on_ctrl_c();

    info!(model = %config.openai.model, "starting enrichment");

    let progress = CliProgress::new();
    let summary = EnrichmentPipeline::new(&store, &search, &extractor, &synthesizer, pacer, cancel)
        .with_target_references(config.defaults.target_references)
        .run(&progress)
        .await?;
    progress.finish();

    print_summary("Enrichment", &summary);
    Ok(())
}

async fn cmd_format(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let openai_key = read_api_key(&config.openai.api_key_env)?;

    let store = open_store(cli, &config).await?;
    let synthesizer = LlmClient::new(&config.openai.base_url, openai_key, &config.openai.model)?;
    let pacer = Pacer::new(
        config.pacing.document_delay_ms,
        config.pacing.fetch_delay_ms,
    );
    let cancel = cancel_on_ctrl_c();

    info!(model = %config.openai.model, "starting formatting");

    let progress = CliProgress::new();
    let summary = FormatPipeline::new(&store, &synthesizer, pacer, cancel)
        .run(&progress)
        .await?;
    progress.finish();

    print_summary("Formatting", &summary);
    Ok(())
}

async fn cmd_list(cli: &Cli, json: bool) -> Result<()> {
    let config = resolve_config(cli)?;
    let store = open_store(cli, &config).await?;
    let docs = store.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }

    if docs.is_empty() {
        println!("No posts stored yet. Run `postforge ingest <index-url>` first.");
        return Ok(());
    }

    println!();
    for doc in &docs {
        let state = if doc.is_enhanced() {
            "enhanced"
        } else {
            "pending"
        };
        let formatted = if doc.formatted_original_content.is_some() {
            " +formatted"
        } else {
            ""
        };
        println!("  [{state}{formatted}] {}", doc.title);
        println!("      {}", doc.url);
        if let Some(model) = &doc.enrichment_model {
            println!("      model: {model}  sources: {}", doc.sources.len());
        }
    }
    println!();
    println!("  {} post(s) total", docs.len());
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn cmd_config_path() -> Result<()> {
    println!("{}", config_file_path()?.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl RunProgress for CliProgress {
    fn item_started(&self, current: usize, total: usize, title: &str) {
        self.spinner
            .set_message(format!("[{current}/{total}] {title}"));
    }

    fn item_finished(&self, outcome: &RunOutcome) {
        let mark = match outcome.status {
            RunStatus::Success => "✓",
            RunStatus::Failed => "✗",
            RunStatus::Skipped => "·",
        };
        self.spinner
            .println(format!("  {mark} {} — {}", outcome.title, outcome.message));
    }
}

// ---------------------------------------------------------------------------
// Summary output
// ---------------------------------------------------------------------------

fn print_summary(label: &str, summary: &RunSummary) {
    println!();
    println!("  {label} complete");
    println!("  Success: {}", summary.success_count());
    println!("  Failed:  {}", summary.failed_count());
    println!("  Skipped: {}", summary.skipped_count());
    println!("  Total:   {}", summary.total());

    if summary.failed_count() > 0 {
        println!();
        println!("  Failures:");
        for outcome in summary.failures() {
            println!("    {} — {}", outcome.title, outcome.message);
        }
    }
    println!();
}
