//! crisiswire CLI
//!
//! Ingest crisis reports, record citizen votes, inspect the corpus and run
//! collectors against a local store or a remote core.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use crisiswire_collectors::{
    CollectorConfig, FeedCollector, Forwarder, HttpTarget, IngestTarget, PageCollector,
};
use crisiswire_core::{Candidate, CoreConfig, Sanitizer, ThreatCategory, ThreatRecord};
use crisiswire_runtime::{Core, Harvester, HarvesterConfig, VoteRequest};
use crisiswire_store::{MemoryStore, SharedStore};

#[derive(Parser)]
#[command(name = "crisiswire")]
#[command(author, version, about = "crisiswire: crisis signal intake and crowd credibility", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,

    /// TOML configuration file
    #[arg(long, env = "CRISISWIRE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// JSON snapshot the store loads from and saves to
    #[arg(long, env = "CRISISWIRE_STORE", global = true)]
    store: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest candidates from a JSON file (one object or an array)
    Ingest {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Record a vote on a threat
    Vote {
        /// Threat id
        id: String,

        /// confirm, deny, skeptical (or credible / not_credible)
        kind: String,

        /// Voter id (anonymous if omitted)
        #[arg(long)]
        voter: Option<String>,

        /// Free-text reasoning kept in the audit trail
        #[arg(long)]
        reasoning: Option<String>,
    },

    /// Show one threat with its score breakdown and audit trail
    Show {
        /// Threat id
        id: String,
    },

    /// List threats (active only unless --all)
    List {
        /// Include monitoring and resolved threats
        #[arg(long)]
        all: bool,

        /// Only this category (Cyber, Health, Climate, Conflict, Economic, AI)
        #[arg(long = "type")]
        threat_type: Option<String>,
    },

    /// Corpus statistics
    Stats,

    /// Run collectors and forward what they find
    Collect {
        /// JSON feed URL (repeatable)
        #[arg(long)]
        feed: Vec<String>,

        /// HTML page URL to scrape (repeatable)
        #[arg(long)]
        page: Vec<String>,

        /// Base URL of a remote core; ingests locally if omitted
        #[arg(long)]
        core: Option<String>,

        /// Rounds to run (0 = until Ctrl-C)
        #[arg(long, default_value = "1")]
        rounds: u64,

        /// Seconds between rounds
        #[arg(long, default_value = "300")]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => CoreConfig::default(),
    };

    let store = open_store(cli.store.as_deref(), &config).await?;
    let core = Core::new(store, config.clone());

    let result = run_command(cli.command, &core, &config).await;

    // Flush even when the command failed
    core.close().await.context("closing store")?;
    result
}

async fn open_store(path: Option<&Path>, config: &CoreConfig) -> Result<SharedStore> {
    let path = path.or(config.store.snapshot_path.as_deref());

    match path {
        Some(path) => {
            let store = MemoryStore::open(path, &config.credibility)
                .await
                .with_context(|| format!("opening store {}", path.display()))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("No --store given; changes will not be persisted");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

async fn run_command(command: Commands, core: &Core, config: &CoreConfig) -> Result<()> {
    match command {
        Commands::Ingest { file } => ingest_file(core, &file).await,
        Commands::Vote {
            id,
            kind,
            voter,
            reasoning,
        } => {
            let request = VoteRequest {
                threat_id: id,
                vote_kind: kind,
                voter_id: voter,
                reasoning,
            };
            let outcome = core.record_vote(request).await?;
            println!(
                "✅ {} credibility {} | status {}",
                outcome.threat_id, outcome.credibility_score, outcome.status
            );
            if outcome.status_changed() {
                println!("   status changed from {}", outcome.previous_status);
            }
            Ok(())
        }
        Commands::Show { id } => show_threat(core, &id).await,
        Commands::List { all, threat_type } => {
            let mut records = match threat_type {
                Some(name) => {
                    let category: ThreatCategory = name.parse()?;
                    core.threats_by_type(category).await?
                }
                None => core.threats().await?,
            };
            if !all {
                records.retain(ThreatRecord::is_active);
            }
            print_table(&records);
            Ok(())
        }
        Commands::Stats => {
            let stats = core.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
            Ok(())
        }
        Commands::Collect {
            feed,
            page,
            core: remote,
            rounds,
            interval_secs,
        } => {
            run_collect(
                core,
                config,
                feed,
                page,
                remote,
                rounds,
                interval_secs,
            )
            .await
        }
    }
}

async fn ingest_file(core: &Core, file: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", file.display()))?;

    let candidates: Vec<Candidate> = match value {
        serde_json::Value::Array(items) => items.into_iter().map(Candidate::from_value).collect(),
        other => vec![Candidate::from_value(other)],
    };

    let report = core.ingest_batch(&candidates).await;
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(id) => println!("✅ [{}] {}", outcome.index, id),
            Err(e) => println!("❌ [{}] {}: {}", outcome.index, e.kind(), e),
        }
    }
    println!(
        "\n📊 {} accepted, {} rejected",
        report.accepted(),
        report.failed()
    );
    Ok(())
}

async fn show_threat(core: &Core, id: &str) -> Result<()> {
    let record = core
        .threat(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("threat not found: {}", id))?;

    println!("{}", serde_json::to_string_pretty(&record)?);

    let breakdown = core.policy().explain(&record.votes);
    println!(
        "\n🧮 Credibility {} = round(100 × {} / {})",
        breakdown.score, breakdown.numerator, breakdown.denominator
    );

    let audit = core.audit_for(id).await?;
    if !audit.is_empty() {
        println!("\n🗳️  Votes:");
        for entry in audit {
            println!(
                "   {} {} by {}{}",
                entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                entry.kind,
                entry.voter_id,
                entry
                    .reasoning
                    .map(|r| format!(" ({})", r))
                    .unwrap_or_default()
            );
        }
    }
    Ok(())
}

fn print_table(records: &[ThreatRecord]) {
    if records.is_empty() {
        println!("No threats.");
        return;
    }

    for record in records {
        let title: String = record.title.chars().take(60).collect();
        println!(
            "{}  {:<9} sev {:>3}  cred {:>3}  {:<10}  {}  {}",
            record.timestamp.format("%Y-%m-%d"),
            record.threat_type.as_str(),
            record.severity,
            record.credibility_score,
            record.status.as_str(),
            record.id,
            title
        );
    }
}

async fn run_collect(
    core: &Core,
    config: &CoreConfig,
    feeds: Vec<String>,
    pages: Vec<String>,
    remote: Option<String>,
    rounds: u64,
    interval_secs: u64,
) -> Result<()> {
    if feeds.is_empty() && pages.is_empty() {
        anyhow::bail!("nothing to collect: pass at least one --feed or --page");
    }

    let forwarder = Forwarder::new(Sanitizer::new(config.limits.clone()), &config.collector);
    let mut harvester = Harvester::new(
        forwarder,
        HarvesterConfig {
            interval: Duration::from_secs(interval_secs),
            max_rounds: rounds,
        },
    );

    let base = CollectorConfig::from_settings(&config.collector);
    if !feeds.is_empty() {
        harvester.add_collector(Box::new(FeedCollector::new(
            base.clone().with_id("feed-1"),
            feeds,
        )?));
    }
    if !pages.is_empty() {
        harvester.add_collector(Box::new(PageCollector::new(
            base.with_id("page-1"),
            pages,
        )?));
    }

    let http_target;
    let target: &dyn IngestTarget = match &remote {
        Some(url) => {
            http_target = HttpTarget::new(url, config.collector.forward_timeout())?;
            &http_target
        }
        None => core.pipeline(),
    };

    println!("🛰️  Collecting into {}", target.describe());
    let report = harvester.run(target).await;

    println!(
        "\n📊 {} rounds, {} collected, {} accepted, {} failed{}",
        report.rounds,
        report.collected,
        report.forwarded.accepted(),
        report.forwarded.failed(),
        if report.interrupted { " (interrupted)" } else { "" }
    );
    for outcome in report.forwarded.outcomes.iter().filter(|o| o.result.is_err()) {
        if let Err(e) = &outcome.result {
            println!("   ❌ {}: {}", outcome.title, e);
        }
    }
    Ok(())
}
