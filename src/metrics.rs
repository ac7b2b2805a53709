// File: src/metrics.rs

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::parsers::record::{Outcome, RequestRecord};

/// Groups with this many requests or fewer are left out of the anomaly
/// and timeout sections of the summary.
pub const REPORT_MIN_REQUESTS: u64 = 100;

/// Latency, in seconds, above which a request is counted (and exported)
/// separately.
pub const HIGH_LATENCY_SECS: f64 = 2.0;

/// Dimension used to bucket records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupBy {
    #[default]
    Path,
    UpstreamAddr,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    pub latency_secs: f64,
    pub time: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimeoutCounter {
    pub count: u64,
    pub total: u64,
}

/// Running aggregates over every record seen so far.
///
/// One instance owns all state; nothing here is process-global, so tests
/// and shards can run their own collectors side by side.
#[derive(Debug)]
pub struct MetricCollector {
    group_by: GroupBy,
    latency: HashMap<String, Vec<LatencySample>>,
    responses: HashMap<String, BTreeMap<u16, u64>>,
    timeouts: HashMap<String, TimeoutCounter>,
}

impl MetricCollector {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            latency: HashMap::new(),
            responses: HashMap::new(),
            timeouts: HashMap::new(),
        }
    }

    /// Registers one record's contribution. Never fails: a record whose
    /// group key is empty cannot be attributed and is dropped.
    ///
    /// Every accepted record bumps the response histogram and the timeout
    /// counter exactly once; latency samples are kept only for requests
    /// that actually completed.
    pub fn add(&mut self, record: &RequestRecord) {
        let key = match self.group_by {
            GroupBy::Path => record.request.path.as_str(),
            GroupBy::UpstreamAddr => record.upstream_addr.as_str(),
        };
        if key.is_empty() {
            return;
        }

        if let Outcome::Completed {
            time_local,
            request_time,
        } = record.outcome
        {
            self.latency
                .entry(key.to_string())
                .or_default()
                .push(LatencySample {
                    latency_secs: request_time,
                    time: time_local,
                });
        }

        *self
            .responses
            .entry(key.to_string())
            .or_default()
            .entry(record.upstream_status)
            .or_insert(0) += 1;

        let timeouts = self.timeouts.entry(key.to_string()).or_default();
        timeouts.total += 1;
        if record.timed_out() {
            timeouts.count += 1;
        }
    }

    /// Snapshot of the aggregates. Read-only; calling it repeatedly
    /// without an intervening [`add`](Self::add) yields identical output.
    pub fn summarize(&self) -> Summary {
        let tracked_requests: u64 = self.latency.values().map(|s| s.len() as u64).sum();

        let mut response_anomalies: Vec<ResponseAnomaly> = self
            .responses
            .iter()
            .filter_map(|(group, histogram)| {
                let total: u64 = histogram.values().sum();
                let anomalous = histogram.keys().any(|&code| code >= 400);
                (anomalous && total > REPORT_MIN_REQUESTS).then(|| ResponseAnomaly {
                    group: group.clone(),
                    histogram: histogram.clone(),
                    total,
                })
            })
            .collect();
        response_anomalies.sort_by(|a, b| a.group.cmp(&b.group));

        let mut timeout_ratios: Vec<TimeoutRatio> = self
            .timeouts
            .iter()
            .filter(|(_, counter)| counter.count > 0 && counter.total > REPORT_MIN_REQUESTS)
            .map(|(group, counter)| TimeoutRatio {
                group: group.clone(),
                count: counter.count,
                total: counter.total,
                percent: 100.0 * counter.count as f64 / counter.total as f64,
            })
            .collect();
        timeout_ratios.sort_by(|a, b| a.group.cmp(&b.group));

        let mut high_latency_count = 0u64;
        let mut latency_means: Vec<LatencyMean> = self
            .latency
            .iter()
            .map(|(group, samples)| {
                let sum: f64 = samples.iter().map(|s| s.latency_secs).sum();
                high_latency_count += samples
                    .iter()
                    .filter(|s| s.latency_secs > HIGH_LATENCY_SECS)
                    .count() as u64;
                LatencyMean {
                    group: group.clone(),
                    mean_secs: sum / samples.len() as f64,
                    samples: samples.len() as u64,
                }
            })
            .collect();
        latency_means.sort_by(|a, b| a.group.cmp(&b.group));

        let percent = if tracked_requests == 0 {
            0.0
        } else {
            100.0 * high_latency_count as f64 / tracked_requests as f64
        };

        Summary {
            tracked_requests,
            response_anomalies,
            timeout_ratios,
            latency_means,
            high_latency: HighLatency {
                threshold_secs: HIGH_LATENCY_SECS,
                count: high_latency_count,
                percent,
            },
        }
    }

    /// Every latency sample with its group key, groups in sorted order.
    /// Feed for the CSV export.
    pub fn samples(&self) -> impl Iterator<Item = (&str, &LatencySample)> {
        let mut groups: Vec<_> = self.latency.iter().collect();
        groups.sort_by(|a, b| a.0.cmp(b.0));
        groups
            .into_iter()
            .flat_map(|(group, samples)| samples.iter().map(move |s| (group.as_str(), s)))
    }

    pub fn latency_data(&self) -> &HashMap<String, Vec<LatencySample>> {
        &self.latency
    }

    pub fn response_data(&self) -> &HashMap<String, BTreeMap<u16, u64>> {
        &self.responses
    }

    pub fn timeout_data(&self) -> &HashMap<String, TimeoutCounter> {
        &self.timeouts
    }
}

/// What [`MetricCollector::summarize`] reports. Plain data, ready for the
/// text or JSON renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Requests that completed (timed-out requests are not tracked here).
    pub tracked_requests: u64,
    pub response_anomalies: Vec<ResponseAnomaly>,
    pub timeout_ratios: Vec<TimeoutRatio>,
    pub latency_means: Vec<LatencyMean>,
    pub high_latency: HighLatency,
}

/// A group that cleared the reporting threshold and saw at least one
/// 4xx/5xx response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseAnomaly {
    pub group: String,
    pub histogram: BTreeMap<u16, u64>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeoutRatio {
    pub group: String,
    pub count: u64,
    pub total: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyMean {
    pub group: String,
    pub mean_secs: f64,
    pub samples: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HighLatency {
    pub threshold_secs: f64,
    pub count: u64,
    pub percent: f64,
}
