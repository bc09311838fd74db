//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use tracing::info;

use questguide_cache::ContentCache;
use questguide_core::{Enricher, Enrichment};
use questguide_guide::{GuideGenerator, OpenRouterModel};
use questguide_images::ImageCollector;
use questguide_shared::{
    AppConfig, CacheConfig, GeneratorConfig, ImageConfig, Quest, config_file_path, init_config,
    load_config, validate_api_key,
};

use crate::render;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// QuestGuide: AI quest guides with matched images.
#[derive(Parser)]
#[command(
    name = "questguide",
    version,
    about = "Generate per-objective quest guides with relevant images, cached by quest content.",
    long_about = None,
)]
pub(crate) struct Cli {
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
    /// Enrich quests loaded from JSON files.
    Enrich {
        /// Quest JSON files. Each holds one quest object or an array of them.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print results as JSON instead of text.
        #[arg(long)]
        json: bool,

        /// Regenerate even if a cached result exists.
        #[arg(long)]
        no_cache: bool,

        /// Override the configured OpenRouter model.
        #[arg(long)]
        model: Option<String>,
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
    /// Print the config file location.
    Path,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "questguide=warn",
        1 => "questguide=info",
        2 => "questguide=debug",
        _ => "questguide=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `--json` output on stdout stays parseable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Enrich {
            files,
            json,
            no_cache,
            model,
        } => cmd_enrich(&files, json, no_cache, model).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
            ConfigAction::Path => cmd_config_path(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

type CliEnricher = Enricher<GuideGenerator<OpenRouterModel>, ImageCollector>;

async fn cmd_enrich(
    files: &[PathBuf],
    json: bool,
    no_cache: bool,
    model: Option<String>,
) -> Result<()> {
    let mut config = load_config()?;
    if let Some(model) = model {
        config.openrouter.model = model;
    }
    validate_api_key(&config)?;

    let quests = files
        .iter()
        .map(|path| load_quests(path))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    let enricher = build_enricher(&config)?;
    let sweeper = enricher
        .cache()
        .spawn_sweeper(CacheConfig::from(&config).sweep_interval);

    info!(quests = quests.len(), no_cache, "enriching quests");

    let spinner = Spinner::new()?;
    let mut outputs = Vec::with_capacity(quests.len());
    for quest in &quests {
        spinner.set_message(format!("Enriching {}...", quest.name));
        if no_cache {
            enricher.invalidate(quest);
        }
        let outcome = enricher.enrich(quest).await;
        outputs.push(outcome);
    }
    spinner.finish();
    sweeper.abort();

    if json {
        let report: Vec<_> = quests
            .iter()
            .zip(&outputs)
            .map(|(quest, outcome)| render::json_entry(quest, outcome))
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (quest, outcome) in quests.iter().zip(&outputs) {
        match outcome {
            Enrichment::Enriched(result) => {
                print!(
                    "{}",
                    render::enriched(quest, result, |i| enricher.match_image(quest, i, &result.images))
                );
            }
            Enrichment::Baseline => print!("{}", render::baseline(quest)),
        }
    }

    let stats = enricher.cache_stats();
    info!(
        entries = stats.entry_count,
        hits = stats.hit_count,
        misses = stats.miss_count,
        "cache stats"
    );

    Ok(())
}

fn build_enricher(config: &AppConfig) -> Result<CliEnricher> {
    let cache = Arc::new(ContentCache::new(&CacheConfig::from(config)));
    let model = OpenRouterModel::from_config(&config.openrouter)?;
    let guides = GuideGenerator::new(model, GeneratorConfig::from(config));
    let images = ImageCollector::new(ImageConfig::from(config))?;
    Ok(Enricher::new(cache, guides, images))
}

/// A quest file holds either a single quest or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum QuestFile {
    Many(Vec<Quest>),
    One(Box<Quest>),
}

fn parse_quests(content: &str) -> serde_json::Result<Vec<Quest>> {
    Ok(match serde_json::from_str(content)? {
        QuestFile::Many(quests) => quests,
        QuestFile::One(quest) => vec![*quest],
    })
}

fn load_quests(path: &Path) -> Result<Vec<Quest>> {
    let content = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("cannot read quest file '{}'", path.display()))?;
    let quests = parse_quests(&content)
        .map_err(|e| eyre!("invalid quest JSON in '{}': {e}", path.display()))?;
    if quests.is_empty() {
        return Err(eyre!("no quests found in '{}'", path.display()));
    }
    Ok(quests)
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

fn cmd_config_path() -> Result<()> {
    println!("{}", config_file_path()?.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress spinner
// ---------------------------------------------------------------------------

/// Spinner shown on stderr while quests are enriched.
struct Spinner {
    bar: ProgressBar,
}

impl Spinner {
    fn new() -> Result<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")?
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Ok(Self { bar })
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
