//! CLI command definitions, routing, and tracing setup.

use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use pressfeat_core::{BridgeTagger, PassSummary, ProgressReporter, run_pass};
use pressfeat_shared::{
    AppConfig, PassConfig, RawDocument, init_config, load_config, validate_taggers,
};
use pressfeat_storage::Storage;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// pressfeat: turn scraped press releases into labeled feature records.
#[derive(Parser)]
#[command(
    name = "pressfeat",
    version,
    about = "Featurize scraped press releases into labeled records for text classification.",
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
    /// Run one featurization pass over unprocessed documents.
    Run {
        /// Source filter (defaults to `defaults.source`).
        #[arg(short, long)]
        source: Option<String>,

        /// Database path (defaults to `defaults.database`).
        #[arg(long, env = "PRESSFEAT_DB")]
        db: Option<String>,
    },

    /// Import raw documents from a JSON-lines file (`-` for stdin).
    Import {
        /// JSON-lines file of scraped documents.
        file: String,

        /// Database path (defaults to `defaults.database`).
        #[arg(long, env = "PRESSFEAT_DB")]
        db: Option<String>,
    },

    /// Export persisted feature records as JSON lines.
    Export {
        /// Output file (defaults to stdout).
        #[arg(short, long)]
        out: Option<String>,

        /// Only export records from this source.
        #[arg(short, long)]
        source: Option<String>,

        /// Database path (defaults to `defaults.database`).
        #[arg(long, env = "PRESSFEAT_DB")]
        db: Option<String>,
    },

    /// Show document counts per outcome and recent passes.
    Status {
        /// Source filter (defaults to `defaults.source`).
        #[arg(short, long)]
        source: Option<String>,

        /// Database path (defaults to `defaults.database`).
        #[arg(long, env = "PRESSFEAT_DB")]
        db: Option<String>,
    },

    /// Make failed documents eligible for the next pass.
    Requeue {
        /// Source filter (defaults to `defaults.source`).
        #[arg(short, long)]
        source: Option<String>,

        /// Also requeue documents skipped for missing text, location or org.
        #[arg(long)]
        all: bool,

        /// Database path (defaults to `defaults.database`).
        #[arg(long, env = "PRESSFEAT_DB")]
        db: Option<String>,
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
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pressfeat=info",
        1 => "pressfeat=debug",
        _ => "pressfeat=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `export` can stream records on stdout.
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
        Command::Run { source, db } => cmd_run(source, db).await,
        Command::Import { file, db } => cmd_import(&file, db).await,
        Command::Export { out, source, db } => cmd_export(out.as_deref(), source, db).await,
        Command::Status { source, db } => cmd_status(source, db).await,
        Command::Requeue { source, all, db } => cmd_requeue(source, all, db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Database path: CLI flag, then config file, then built-in default.
fn resolve_db(flag: Option<String>, config: &AppConfig) -> PathBuf {
    PathBuf::from(flag.unwrap_or_else(|| config.defaults.database.clone()))
}

fn resolve_source(flag: Option<String>, config: &AppConfig) -> String {
    flag.unwrap_or_else(|| config.defaults.source.clone())
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(source: Option<String>, db: Option<String>) -> Result<()> {
    // Validate taggers before touching the database
    let config = load_config()?;
    let (pos_cmd, ner_cmd) = validate_taggers(&config)?;

    let mut pass_config = PassConfig::from(&config);
    pass_config.source = resolve_source(source, &config);
    let db_path = resolve_db(db, &config);

    info!(source = %pass_config.source, db = %db_path.display(), "starting featurization");

    let storage = Storage::open(&db_path).await?;
    let reporter = CliProgress::new();

    reporter.phase("Starting taggers");
    let tagger = BridgeTagger::spawn(pos_cmd, ner_cmd)?;

    let result = run_pass(&pass_config, &storage, &tagger, &reporter).await;
    tagger.shutdown();
    let summary = result?;

    println!();
    println!("  Featurization pass complete");
    println!("  Run:       {}", summary.run_id);
    println!("  Source:    {}", pass_config.source);
    println!("  Visited:   {}", summary.visited);
    println!("  Persisted: {}", summary.persisted);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Failed:    {}", summary.failed);
    if summary.missing > 0 {
        println!("  Missing:   {}", summary.missing);
    }
    println!("  Time:      {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_import(file: &str, db: Option<String>) -> Result<()> {
    let config = load_config()?;
    let storage = Storage::open(&resolve_db(db, &config)).await?;

    let reader: Box<dyn BufRead> = if file == "-" {
        Box::new(BufReader::new(std::io::stdin()))
    } else {
        let f = std::fs::File::open(file).wrap_err_with(|| format!("cannot open '{file}'"))?;
        Box::new(BufReader::new(f))
    };

    let mut inserted = 0usize;
    let mut existing = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line.wrap_err_with(|| format!("read error at line {}", idx + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: RawDocument = serde_json::from_str(&line)
            .wrap_err_with(|| format!("invalid document at line {}", idx + 1))?;
        if storage.insert_raw_document(&doc).await? {
            inserted += 1;
        } else {
            existing += 1;
        }
    }

    info!(inserted, existing, "import complete");
    println!("Imported {inserted} document(s), {existing} already present.");
    Ok(())
}

async fn cmd_export(out: Option<&str>, source: Option<String>, db: Option<String>) -> Result<()> {
    let config = load_config()?;
    let storage = open_existing(&resolve_db(db, &config)).await?;
    let records = storage.list_feature_records(source.as_deref()).await?;

    let mut writer: Box<dyn Write> = match out {
        Some(path) => {
            let f = std::fs::File::create(path)
                .wrap_err_with(|| format!("cannot create '{path}'"))?;
            Box::new(BufWriter::new(f))
        }
        None => Box::new(BufWriter::new(std::io::stdout().lock())),
    };

    for record in &records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    info!(count = records.len(), out = out.unwrap_or("-"), "export complete");
    Ok(())
}

async fn cmd_status(source: Option<String>, db: Option<String>) -> Result<()> {
    let config = load_config()?;
    let source = resolve_source(source, &config);
    let db_path = resolve_db(db, &config);
    let storage = open_existing(&db_path).await?;

    let counts = storage.outcome_counts(&source).await?;
    let results = storage.count_results(&source).await?;
    let runs = storage.list_runs(&source, 5).await?;

    println!();
    println!("  Source:      {source}");
    println!("  Database:    {}", db_path.display());
    println!("  Unprocessed: {}", counts.unprocessed);
    println!("  Persisted:   {}", counts.persisted);
    println!("  Skipped:     {}", counts.skipped);
    println!("  Failed:      {}", counts.failed);
    println!("  Records:     {results}");

    if !runs.is_empty() {
        println!();
        println!("  Recent passes:");
        for run in runs {
            let finished = run.finished_at.as_deref().unwrap_or("(unfinished)");
            println!("    {}  {}  →  {}", run.id, run.started_at, finished);
            if let Some(stats) = run.stats_json {
                println!("      {stats}");
            }
        }
    }
    println!();
    Ok(())
}

async fn cmd_requeue(source: Option<String>, all: bool, db: Option<String>) -> Result<()> {
    let config = load_config()?;
    let source = resolve_source(source, &config);
    let storage = Storage::open(&resolve_db(db, &config)).await?;

    let count = storage.requeue(&source, all).await?;
    if count == 0 {
        warn!(%source, "nothing to requeue");
    }
    println!("Requeued {count} document(s) from '{source}'.");
    Ok(())
}

async fn open_existing(path: &Path) -> Result<Storage> {
    Storage::open_readonly(path)
        .await
        .map_err(|e| eyre!("{e}. Run `pressfeat import` first?"))
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter: a spinner for phases, a bar for documents.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        bar.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { bar }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.bar.set_message(name.to_string());
    }

    fn document(&self, id: &str, current: usize, total: usize) {
        if self.bar.length() != Some(total as u64) {
            self.bar.set_length(total as u64);
            self.bar.set_style(
                ProgressStyle::with_template("{spinner:.cyan} [{pos}/{len}] {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
        }
        self.bar.set_position(current as u64);
        self.bar.set_message(id.to_string());
    }

    fn done(&self, _summary: &PassSummary) {
        self.bar.finish_and_clear();
    }
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
