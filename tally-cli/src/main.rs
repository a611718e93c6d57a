use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tally_core::Category;
use tally_finance::{
    Analysis, AnalysisOptions, CategoryCache, ChartPaths, Classifier, JsonFileCache, RowPolicy,
    ServicePolicy, analyze, largest_swings, month_over_month, render_all,
};
use tally_ingest::{raw_transactions, read_table, spend_records, write_classified};

mod auth;
mod config;
mod llm;
mod state;

use config::Config;
use llm::{LlmConfig, LlmService, Provider};

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version = env!("TALLY_LONG_VERSION"),
    about = "Classify bank transactions with an LLM and chart where the money went"
)]
struct Cli {
    /// Config file (default: ~/.tally/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add Category and Confidence columns to a transaction table
    Classify {
        /// Input CSV with Description and Amount columns
        #[arg(long)]
        input: Option<PathBuf>,

        /// Output CSV
        #[arg(long)]
        output: Option<PathBuf>,

        /// Classification cache (JSON)
        #[arg(long)]
        cache: Option<PathBuf>,

        /// What to do with rows missing a description or amount: skip|abort
        #[arg(long)]
        on_invalid_row: Option<RowPolicy>,

        /// What to do when the service fails twice: mark-unclassified|abort
        #[arg(long)]
        on_service_error: Option<ServicePolicy>,
    },

    /// Summarize a classified table and render charts
    Analyze {
        /// Classified CSV with Date, Amount and Category columns
        #[arg(long)]
        input: Option<PathBuf>,

        /// Directory for the chart images
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// Drop rows whose confidence is below this
        #[arg(long)]
        min_confidence: Option<f64>,

        /// Exclude a category (repeatable; replaces the configured list)
        #[arg(long = "exclude")]
        exclude: Vec<Category>,

        /// Disable every row filter
        #[arg(long, conflicts_with_all = ["min_confidence", "exclude"])]
        include_all: bool,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Store API credentials in ~/.tally/auth.json
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    /// Paste an API key interactively
    PasteApiKey {
        /// openai|anthropic (default: the configured provider)
        #[arg(long)]
        provider: Option<Provider>,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG > --verbose > info
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .init();

    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Classify {
            input,
            output,
            cache,
            on_invalid_row,
            on_service_error,
        } => {
            let mut section = cfg.classify.clone();
            if let Some(p) = input {
                section.input = p;
            }
            if let Some(p) = output {
                section.output = p;
            }
            if let Some(p) = cache {
                section.cache = p;
            }
            if let Some(p) = on_invalid_row {
                section.on_invalid_row = p;
            }
            if let Some(p) = on_service_error {
                section.on_service_error = p;
            }
            cmd_classify(&cfg, &section)?;
        }

        Command::Analyze {
            input,
            out_dir,
            min_confidence,
            exclude,
            include_all,
        } => {
            let mut section = cfg.analyze.clone();
            if let Some(p) = input {
                section.input = p;
            }
            if let Some(p) = out_dir {
                section.out_dir = p;
            }
            if let Some(c) = min_confidence {
                section.min_confidence = c;
            }
            if !exclude.is_empty() {
                section.exclude_categories = exclude.iter().map(|c| c.to_string()).collect();
            }
            let options = if include_all {
                AnalysisOptions::unfiltered()
            } else {
                section.analysis_options()?
            };
            cmd_analyze(&section, &options)?;
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(cli.config.as_deref())?,
            ConfigCommand::Show => {
                let s = toml::to_string_pretty(&cfg).context("serialize config")?;
                print!("{s}");
            }
        },

        Command::Auth { command } => match command {
            AuthCommand::PasteApiKey { provider } => {
                let provider = match provider {
                    Some(p) => p,
                    None => cfg.llm.provider()?,
                };
                auth::paste_api_key(provider)?;
            }
        },
    }

    Ok(())
}

fn cmd_classify(cfg: &Config, section: &config::ClassifySection) -> Result<()> {
    let llm_cfg = LlmConfig::from_section(&cfg.llm)?;
    // Credentials and cache are checked before any row is read.
    let api_key = auth::resolve_api_key(llm_cfg.provider)?;
    let cache = JsonFileCache::open(&section.cache)
        .with_context(|| format!("open cache {}", section.cache.display()))?;
    info!(
        provider = %llm_cfg.provider,
        model = %llm_cfg.model,
        cached = cache.len(),
        "classifier ready"
    );

    let table = read_table(&section.input)
        .with_context(|| format!("read {}", section.input.display()))?;
    let rows = raw_transactions(&table)
        .with_context(|| format!("read transactions from {}", section.input.display()))?;
    debug!(rows = rows.len(), "loaded input");

    let service = LlmService::new(llm_cfg, api_key)?;
    let mut classifier = Classifier::new(cache, service)
        .with_row_policy(section.on_invalid_row)
        .with_service_policy(section.on_service_error);
    let report = classifier.run(&rows)?;

    write_classified(&section.output, &table, &report.rows)
        .with_context(|| format!("write {}", section.output.display()))?;

    if report.unclassified > 0 {
        warn!(rows = report.unclassified, "some rows could not be classified");
    }
    println!(
        "Classified {} of {} rows ({} from cache, {} new, {} unclassified, {} skipped)",
        report.rows.len(),
        report.total,
        report.cached,
        report.classified,
        report.unclassified,
        report.skipped
    );
    println!("Service calls: {}", report.external_calls);
    println!("Wrote {}", section.output.display());
    println!("Cache: {} ({} entries)", section.cache.display(), classifier.cache().len());
    Ok(())
}

fn cmd_analyze(section: &config::AnalyzeSection, options: &AnalysisOptions) -> Result<()> {
    let table = read_table(&section.input)
        .with_context(|| format!("read {}", section.input.display()))?;
    let spend = spend_records(&table)
        .with_context(|| format!("read spending from {}", section.input.display()))?;
    if spend.skipped > 0 {
        warn!(rows = spend.skipped, "skipped rows with an unreadable date or amount");
    }

    if !spend.has_confidence {
        debug!("no Confidence column; confidence filter not applied");
    }

    let analysis = analyze(&spend.records, options);
    print_analysis(&analysis, &spend.records, options);

    let out_dir = section.out_dir.as_path();
    ensure_dir(out_dir)?;
    let paths = ChartPaths::in_dir(out_dir);
    render_all(&analysis, &paths, &section.chart_options()).context("render charts")?;
    println!("\nCharts:");
    for p in paths.all() {
        println!("  {}", p.display());
    }
    Ok(())
}

fn print_analysis(analysis: &Analysis, records: &[tally_core::SpendRecord], options: &AnalysisOptions) {
    let o = &analysis.overview;
    println!("Rows analyzed: {} (filtered out: {})", o.rows, analysis.filtered_out);
    println!("Months: {}", o.months);
    println!("Total spend: ${:.2}", o.total);
    if let Some(avg) = o.monthly_average {
        println!("Monthly average: ${avg:.2}");
    }

    if analysis.is_empty() {
        println!("\nNo spending to report.");
        return;
    }

    println!("\nTop categories:");
    for (category, total) in analysis.by_category.iter().take(12) {
        println!("  {:<14} ${:>10.2}", category.as_str(), total);
    }

    if let Some(mom) = month_over_month(analysis) {
        let pct = match mom.percent {
            Some(p) => format!("{p:+.1}%"),
            None => "n/a".to_string(),
        };
        println!(
            "\nMonth over month ({} -> {}): {:+.2} ({pct})",
            mom.previous, mom.last, mom.delta
        );
    }

    let swings = largest_swings(records, options);
    if !swings.is_empty() {
        println!("\nLargest swings vs prior average:");
        for s in swings.iter().take(10) {
            println!(
                "  {:<14} last ${:>9.2}  prior avg ${:>9.2}  change {:+.2}",
                s.category.as_str(),
                s.last_month,
                s.prior_average,
                s.delta
            );
        }
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        bail!("output path is not a directory: {}", dir.display());
    }
    std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))
}
