/*
 * SubTakeover - Subdomain Takeover Scanner
 *
 * Probes subdomains for dangling records that point at decommissioned
 * third-party services (storage buckets, PaaS apps, CDN endpoints).
 * GitHub: https://github.com/Varp0s/subtakeover
 * Author: Varp0s
 */

mod error;
mod findings;
mod matcher;
mod probe;
mod report;
mod scheduler;
mod transport;


use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::{ArgAction, Parser};
use colored::*;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::findings::{JsonLinesSink, DEFAULT_FINDINGS_FILE};
use crate::matcher::{Fingerprint, FingerprintTable, Matcher};
use crate::probe::Prober;
use crate::report::Reporter;
use crate::scheduler::{
    ScanSettings, Scheduler, DEFAULT_CONCURRENCY, DEFAULT_COOLDOWN_SECS, DEFAULT_RETRIES,
};
use crate::transport::HttpTransport;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const BANNER: &str = r#"
 ____        _   _____     _
/ ___| _   _| |_|_   _|_ _| | _____  _____   _____ _ __
\___ \| | | | '_ \| |/ _` | |/ / _ \/ _ \ \ / / _ \ '__|
 ___) | |_| | |_) | | (_| |   <  __/ (_) \ V /  __/ |
|____/ \__,_|_.__/|_|\__,_|_|\_\___|\___/ \_/ \___|_|
"#;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Parser, Debug)]
#[command(author, version, about = "Check subdomains for takeover vulnerabilities", long_about = None)]
struct Args {
    /// Path to the file containing the list of subdomains
    file: PathBuf,

    /// Maximum number of probes in flight
    #[arg(short = 't', long = "threads", visible_alias = "concurrency", default_value_t = DEFAULT_CONCURRENCY, value_parser = parse_concurrency)]
    threads: usize,

    /// Retry rounds for subdomains that could not be reached
    #[arg(short = 'r', long = "retries", default_value_t = DEFAULT_RETRIES)]
    retries: u32,

    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Pause between retry rounds in seconds
    #[arg(long = "cooldown", default_value_t = DEFAULT_COOLDOWN_SECS)]
    cooldown: u64,

    /// Findings log (one JSON object per line, appended)
    #[arg(short = 'o', long = "output", default_value = DEFAULT_FINDINGS_FILE)]
    output: PathBuf,

    /// JSON fingerprint table replacing the built-in one
    #[arg(short = 'f', long = "fingerprints")]
    fingerprints: Option<PathBuf>,

    /// Extra case-insensitive fingerprint phrase, appended to the table (repeatable)
    #[arg(short = 'a', long = "add-fingerprint", value_name = "PHRASE")]
    add_fingerprint: Vec<String>,

    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[arg(long = "no-progress")]
    no_progress: bool,

    /// Only write the findings log, no console output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

impl Args {
    fn settings(&self) -> ScanSettings {
        ScanSettings {
            max_concurrency: self.threads,
            max_retries: self.retries,
            cooldown: Duration::from_secs(self.cooldown),
        }
    }
}

fn parse_concurrency(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("sub_takeover={}", level))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// One subdomain per line; blank lines dropped, duplicates kept.
fn parse_subdomains(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

async fn read_subdomains(path: &Path) -> anyhow::Result<Vec<String>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("subdomain list {} could not be read", path.display()))?;
    Ok(parse_subdomains(&content))
}

async fn load_fingerprints(
    path: Option<&Path>,
    extra: &[String],
) -> anyhow::Result<FingerprintTable> {
    let mut table = match path {
        Some(path) => FingerprintTable::load(path).await?,
        None => FingerprintTable::builtin(),
    };
    for phrase in extra.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        table.push(Fingerprint::new(phrase).with_service("custom"));
    }
    Ok(table)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    if !args.quiet {
        println!("{}", BANNER.bright_cyan());
        println!("{}", format!("SubTakeover v{} - Subdomain Takeover Scanner", VERSION).bright_green());
        println!("{}", "Developer: Varp0s".bright_blue());
        println!("{}", "=".repeat(60).bright_yellow());
    }

    let subdomains = read_subdomains(&args.file).await?;
    if subdomains.is_empty() {
        warn!(file = %args.file.display(), "subdomain list is empty");
    }

    let table = load_fingerprints(args.fingerprints.as_deref(), &args.add_fingerprint).await?;
    let matcher = Arc::new(Matcher::new(table));
    let transport = HttpTransport::new(Duration::from_secs(args.timeout))
        .context("HTTP client could not be built")?;
    let prober = Arc::new(Prober::new(Arc::new(transport), matcher));
    let sink = JsonLinesSink::open(&args.output)
        .await
        .with_context(|| format!("findings log {} could not be opened", args.output.display()))?;
    let findings_path = sink.path().display().to_string();

    let reporter = if args.quiet {
        Reporter::silent()
    } else {
        Reporter::new(!args.no_progress)
    };
    let fingerprints = prober.matcher().table().len();
    let scheduler = Scheduler::new(prober, Arc::new(sink), reporter.clone(), args.settings());

    let start_time = Local::now();
    if !args.quiet {
        println!(
            "{} {}",
            "🧬 Fingerprints loaded:".bright_blue(),
            fingerprints.to_string().bright_green()
        );
        println!(
            "\n{} {}",
            "🕒 Scan start time:".bright_blue(),
            start_time.format("%d-%m-%Y %H:%M:%S").to_string().bright_yellow()
        );
        println!(
            "{} {} {}",
            "🔍 Scan starts:".bright_blue(),
            format!("{} subdomains", subdomains.len()).bright_green(),
            format!(
                "(Threads: {}, Retries: {})",
                scheduler.settings().max_concurrency,
                scheduler.settings().max_retries
            )
            .bright_yellow()
        );
        println!("{}", "=".repeat(60).bright_yellow());
    }

    tokio::select! {
        summary = scheduler.run(subdomains) => {
            reporter.summary(&summary, start_time, &findings_path);
            if !args.quiet {
                println!("\n{}", "👋 Scan completed!".bright_green().bold());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, remaining probes and rounds abandoned");
            println!("\n{}", "⚠️ Scan interrupted".bright_red().bold());
        }
    }

    Ok(())
}
