use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use ingress_tally::metrics::{GroupBy, MetricCollector};
use ingress_tally::parsers::{LineParser, ACCESS_LOG_FORMAT, ERROR_LOG_FORMAT};
use ingress_tally::report;

/// Aggregates nginx-ingress access logs into per-path latency, response
/// status and timeout statistics.
#[derive(Debug, Parser)]
#[command(name = "ingress-tally", version, about)]
struct Cli {
    /// Log file to read; standard input when omitted.
    file: Option<PathBuf>,

    /// Dimension used to bucket requests.
    #[arg(long, value_enum, default_value = "path")]
    group_by: GroupKey,

    /// Directory to write results-all.csv and results-greater-2s.csv into.
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// Emit the summary as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Override the access log format ($field placeholders).
    #[arg(long, default_value = ACCESS_LOG_FORMAT, hide_default_value = true)]
    access_format: String,

    /// Override the error log format ($field placeholders).
    #[arg(long, default_value = ERROR_LOG_FORMAT, hide_default_value = true)]
    error_format: String,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupKey {
    Path,
    Upstream,
}

impl From<GroupKey> for GroupBy {
    fn from(key: GroupKey) -> Self {
        match key {
            GroupKey::Path => GroupBy::Path,
            GroupKey::Upstream => GroupBy::UpstreamAddr,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let parser = LineParser::with_formats(&cli.access_format, &cli.error_format)
        .context("invalid log format")?;
    let mut collector = MetricCollector::new(cli.group_by.into());

    // Ctrl-C only raises a flag; the ingestion loop below is the one path
    // that reports and exits.
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
        .context("failed to install interrupt handler")?;

    let reader: Box<dyn BufRead> = match &cli.file {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("cannot open {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    ingest(reader, &parser, &mut collector, &shutdown);

    let summary = collector.summarize();
    let mut stdout = io::stdout().lock();
    if cli.json {
        report::render_json(&summary, &mut stdout)?;
    } else {
        report::render(&summary, &mut stdout)?;
    }

    if let Some(dir) = &cli.export_dir {
        // A failed export must not poison what was already reported.
        match report::export_csv(&collector, dir) {
            Ok(()) => info!(dir = %dir.display(), "wrote CSV export"),
            Err(err) => error!("{err}"),
        }
    }

    Ok(())
}

fn ingest(
    reader: impl BufRead,
    parser: &LineParser,
    collector: &mut MetricCollector,
    shutdown: &AtomicBool,
) {
    let mut skipped = 0u64;
    for line in reader.lines() {
        if shutdown.load(Ordering::SeqCst) {
            info!("interrupt received, reporting early");
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                error!("failed to read input: {err}");
                break;
            }
        };
        if line.is_empty() {
            continue;
        }
        match parser.parse(&line) {
            Ok(record) => collector.add(&record),
            Err(err) => {
                skipped += 1;
                warn!(%err, "skipping line");
            }
        }
    }
    if skipped > 0 {
        info!(skipped, "lines did not match any known format");
    }
}
