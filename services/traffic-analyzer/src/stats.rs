//! Single-pass reduction of a corpus into frequency tables and a time window.
//!
//! [`TrafficAccumulator`] is an associative reducer: partial accumulators built
//! over disjoint slices and merged in order equal the sequential result.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::classifiers::is_bot;
use crate::model::LogEntry;
use crate::patterns::{AttackCategory, CategoryCounts, PatternCatalog};

pub type FrequencyTable<K> = BTreeMap<K, u64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Microsecond resolution; spans too large for that fall back to whole seconds.
    pub fn duration_seconds(&self) -> f64 {
        let span = self.end - self.start;
        span.num_microseconds().map_or(span.num_seconds() as f64, |us| us as f64 / 1_000_000.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UserAgentStats {
    pub bot: u64,
    pub human: u64,
}

/// Finished aggregate for one corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrafficStats {
    pub total_requests: u64,
    #[serde(serialize_with = "serialize_window")]
    pub time_window: Option<TimeWindow>,
    pub patterns: FrequencyTable<AttackCategory>,
    pub ip_stats: FrequencyTable<String>,
    pub path_stats: FrequencyTable<String>,
    pub status_code_stats: FrequencyTable<u16>,
    pub country_stats: FrequencyTable<String>,
    pub asn_stats: FrequencyTable<String>,
    pub user_agent_stats: UserAgentStats,
}

impl TrafficStats {
    /// Zero when the corpus carried no parseable timestamp.
    pub fn duration_seconds(&self) -> f64 { self.time_window.map(|w| w.duration_seconds()).unwrap_or(0.0) }

    pub fn pattern_count(&self, category: AttackCategory) -> u64 { self.patterns.get(&category).copied().unwrap_or(0) }

    pub fn error_count(&self) -> u64 { self.status_code_stats.range(400..).map(|(_, c)| *c).sum() }

    pub fn top_addresses(&self, n: usize) -> Vec<(String, u64)> { top_n(&self.ip_stats, n) }
}

fn serialize_window<S: serde::Serializer>(w: &Option<TimeWindow>, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = s.serialize_map(None)?;
    if let Some(w) = w {
        map.serialize_entry("start", &w.start.to_rfc3339())?;
        map.serialize_entry("end", &w.end.to_rfc3339())?;
        map.serialize_entry("duration_seconds", &w.duration_seconds())?;
    }
    map.end()
}

/// Highest counts first; equal counts by ascending key so output is stable.
pub fn top_n<K: Ord + Clone>(table: &FrequencyTable<K>, n: usize) -> Vec<(K, u64)> {
    let mut rows: Vec<(K, u64)> = table.iter().map(|(k, c)| (k.clone(), *c)).collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    rows.truncate(n);
    rows
}

fn bump(table: &mut FrequencyTable<String>, key: &str) {
    match table.get_mut(key) {
        Some(c) => *c += 1,
        None => { table.insert(key.to_string(), 1); }
    }
}

fn merge_tables<K: Ord>(into: &mut FrequencyTable<K>, from: FrequencyTable<K>) {
    for (k, c) in from { *into.entry(k).or_insert(0) += c; }
}

#[derive(Debug, Clone, Default)]
pub struct TrafficAccumulator {
    total: u64,
    patterns: CategoryCounts,
    by_address: FrequencyTable<String>,
    by_path: FrequencyTable<String>,
    by_status: FrequencyTable<u16>,
    by_country: FrequencyTable<String>,
    by_asn: FrequencyTable<String>,
    user_agents: UserAgentStats,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
}

impl TrafficAccumulator {
    pub fn new() -> Self { Self::default() }

    pub fn absorb(&mut self, index: usize, entry: &LogEntry, catalog: &PatternCatalog) {
        self.total += 1;
        bump(&mut self.by_address, &entry.client_ip);
        bump(&mut self.by_path, &entry.path);
        *self.by_status.entry(entry.status_code).or_insert(0) += 1;
        bump(&mut self.by_country, &entry.country);
        bump(&mut self.by_asn, &entry.asn);
        for hit in catalog.scan(index, entry) { self.patterns.record(hit); }
        if is_bot(&entry.user_agent) { self.user_agents.bot += 1; } else { self.user_agents.human += 1; }
        if let Some(ts) = entry.timestamp {
            self.earliest = Some(self.earliest.map_or(ts, |e| e.min(ts)));
            self.latest = Some(self.latest.map_or(ts, |l| l.max(ts)));
        }
    }

    pub fn merge(mut self, other: TrafficAccumulator) -> TrafficAccumulator {
        self.total += other.total;
        self.patterns.merge(&other.patterns);
        merge_tables(&mut self.by_address, other.by_address);
        merge_tables(&mut self.by_path, other.by_path);
        merge_tables(&mut self.by_status, other.by_status);
        merge_tables(&mut self.by_country, other.by_country);
        merge_tables(&mut self.by_asn, other.by_asn);
        self.user_agents.bot += other.user_agents.bot;
        self.user_agents.human += other.user_agents.human;
        self.earliest = match (self.earliest, other.earliest) { (Some(a), Some(b)) => Some(a.min(b)), (a, b) => a.or(b) };
        self.latest = match (self.latest, other.latest) { (Some(a), Some(b)) => Some(a.max(b)), (a, b) => a.or(b) };
        self
    }

    pub fn finish(self) -> TrafficStats {
        let time_window = match (self.earliest, self.latest) {
            (Some(start), Some(end)) => Some(TimeWindow { start, end }),
            _ => None,
        };
        let patterns = AttackCategory::ALL
            .iter()
            .filter(|c| self.patterns.get(**c) > 0)
            .map(|c| (*c, self.patterns.get(*c)))
            .collect();
        TrafficStats {
            total_requests: self.total,
            time_window,
            patterns,
            ip_stats: self.by_address,
            path_stats: self.by_path,
            status_code_stats: self.by_status,
            country_stats: self.by_country,
            asn_stats: self.by_asn,
            user_agent_stats: self.user_agents,
        }
    }
}

/// Sequential reduction; see `analysis` for the partitioned variant.
pub fn aggregate(entries: &[LogEntry], catalog: &PatternCatalog) -> TrafficStats {
    let mut acc = TrafficAccumulator::new();
    for (i, e) in entries.iter().enumerate() { acc.absorb(i, e, catalog); }
    acc.finish()
}
