// File: src/report.rs

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::metrics::{LatencySample, MetricCollector, Summary, HIGH_LATENCY_SECS};

pub const EXPORT_ALL_FILE: &str = "results-all.csv";
pub const EXPORT_SLOW_FILE: &str = "results-greater-2s.csv";

/// The export could not be created or written. Fatal to the export step
/// only; the in-memory aggregates and the ingestion exit status are
/// untouched.
#[derive(Debug, thiserror::Error)]
#[error("cannot write export file `{}`: {source}", path.display())]
pub struct ExportError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Writes a section header: a horizontal rule, the title, and a closing rule,
/// mirroring the `GetInfo` section layout of the original source.
fn section(out: &mut impl Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "---------------------------------")?;
    writeln!(out, "{title}")?;
    writeln!(out, "---------------------------------")
}

/// Renders the summary as the sectioned text report.
pub fn render(summary: &Summary, out: &mut impl Write) -> io::Result<()> {
    section(out, "OVERVIEW")?;
    writeln!(
        out,
        "Total number of requests tracked: {}",
        summary.tracked_requests
    )?;
    writeln!(out)?;

    section(out, "RESPONSE STATUS CODE METRICS")?;
    for anomaly in &summary.response_anomalies {
        writeln!(out, "{}:", anomaly.group)?;
        for (code, count) in &anomaly.histogram {
            writeln!(out, "  {code} -- {count}")?;
        }
        writeln!(out, "Total: {}", anomaly.total)?;
        writeln!(out)?;
    }

    section(out, "TIME OUT PERCENTAGES")?;
    for ratio in &summary.timeout_ratios {
        writeln!(
            out,
            "{}: {} / {} ({:.2}%)",
            ratio.group, ratio.count, ratio.total, ratio.percent
        )?;
    }
    writeln!(out)?;

    section(out, "LATENCY")?;
    for mean in &summary.latency_means {
        writeln!(
            out,
            "{}: {} mean over {} requests",
            mean.group,
            format_latency(mean.mean_secs),
            mean.samples
        )?;
    }
    writeln!(out)?;

    writeln!(
        out,
        "requests over {}: {} ({:.4}%)",
        format_latency(summary.high_latency.threshold_secs),
        summary.high_latency.count,
        summary.high_latency.percent
    )
}

/// Renders the summary as pretty-printed JSON.
pub fn render_json(summary: &Summary, out: &mut impl Write) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, summary)?;
    writeln!(out)
}

/// Writes the raw per-sample rows into `dir`: every sample to
/// [`EXPORT_ALL_FILE`], the ones above the high-latency threshold to
/// [`EXPORT_SLOW_FILE`]. Row shape: `group,rfc3339-timestamp,latency`.
pub fn export_csv(collector: &MetricCollector, dir: &Path) -> Result<(), ExportError> {
    write_samples(collector, &dir.join(EXPORT_ALL_FILE), |_| true)?;
    write_samples(collector, &dir.join(EXPORT_SLOW_FILE), |sample| {
        sample.latency_secs > HIGH_LATENCY_SECS
    })
}

fn write_samples(
    collector: &MetricCollector,
    path: &Path,
    keep: impl Fn(&LatencySample) -> bool,
) -> Result<(), ExportError> {
    let wrap = |source| ExportError {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(wrap)?;
    let mut out = BufWriter::new(file);
    for (group, sample) in collector.samples().filter(|(_, sample)| keep(sample)) {
        writeln!(
            out,
            "{},{},{}",
            csv_field(group),
            sample.time.to_rfc3339(),
            sample.latency_secs
        )
        .map_err(wrap)?;
    }
    out.flush().map_err(wrap)
}

fn format_latency(secs: f64) -> String {
    let rounded_ms = (secs * 1000.0).round().max(0.0) as u64;
    humantime::format_duration(Duration::from_millis(rounded_ms)).to_string()
}

/// Quotes a field only when it contains CSV structural characters.
fn csv_field(raw: &str) -> Cow<'_, str> {
    if raw.contains([',', '"', '\n']) {
        Cow::Owned(format!("\"{}\"", raw.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{GroupBy, MetricCollector};
    use crate::parsers::record::{Outcome, RequestLine, RequestRecord};
    use crate::time::parse_time_local;
    use pretty_assertions::assert_eq;

    fn sample_collector() -> MetricCollector {
        let mut collector = MetricCollector::new(GroupBy::Path);
        for i in 0..150 {
            collector.add(&RequestRecord {
                upstream_addr: "10.0.0.5:8080".to_string(),
                request: RequestLine {
                    method: "GET".to_string(),
                    path: "/api".to_string(),
                    query: None,
                },
                upstream_status: if i % 2 == 0 { 200 } else { 502 },
                outcome: Outcome::Completed {
                    time_local: parse_time_local("2/Jan/2006:15:04:05 +0000").unwrap(),
                    request_time: if i == 0 { 2.5 } else { 0.5 },
                },
            });
        }
        collector.add(&RequestRecord {
            upstream_addr: "10.0.0.5:8080".to_string(),
            request: RequestLine {
                method: "GET".to_string(),
                path: "/api".to_string(),
                query: None,
            },
            upstream_status: 504,
            outcome: Outcome::TimedOut,
        });
        collector
    }

    #[test]
    fn sections_come_in_the_documented_order() {
        let summary = sample_collector().summarize();
        let mut rendered = Vec::new();
        render(&summary, &mut rendered).unwrap();
        let text = String::from_utf8(rendered).unwrap();

        let overview = text.find("OVERVIEW").unwrap();
        let responses = text.find("RESPONSE STATUS CODE METRICS").unwrap();
        let timeouts = text.find("TIME OUT PERCENTAGES").unwrap();
        let latency = text.find("LATENCY").unwrap();
        let over = text.find("requests over 2s:").unwrap();
        assert!(overview < responses && responses < timeouts);
        assert!(timeouts < latency && latency < over);

        assert!(text.contains("Total number of requests tracked: 150"));
        assert!(text.contains("  502 -- 75"));
        assert!(text.contains("/api: 1 / 151 (0.66%)"));
    }

    #[test]
    fn json_rendering_round_trips() {
        let summary = sample_collector().summarize();
        let mut rendered = Vec::new();
        render_json(&summary, &mut rendered).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&rendered).unwrap();
        assert_eq!(value["tracked_requests"], 150);
        assert_eq!(value["high_latency"]["count"], 1);
    }

    #[test]
    fn csv_export_splits_on_the_threshold() {
        let collector = sample_collector();
        let dir = tempfile::tempdir().unwrap();
        export_csv(&collector, dir.path()).unwrap();

        let all = std::fs::read_to_string(dir.path().join(EXPORT_ALL_FILE)).unwrap();
        let slow = std::fs::read_to_string(dir.path().join(EXPORT_SLOW_FILE)).unwrap();
        assert_eq!(all.lines().count(), 150);
        assert_eq!(slow.lines().count(), 1);
        assert_eq!(slow.trim_end(), "/api,2006-01-02T15:04:05+00:00,2.5");
    }

    #[test]
    fn unwritable_export_dir_fails_the_export_only() {
        let collector = sample_collector();
        let err = export_csv(&collector, Path::new("/nonexistent-dir-for-sure")).unwrap_err();
        assert!(err.path.ends_with(EXPORT_ALL_FILE));
    }

    #[test]
    fn csv_fields_with_commas_are_quoted() {
        assert_eq!(csv_field("/plain"), "/plain");
        assert_eq!(csv_field("/a,b"), "\"/a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
