//! Replays a candidate rule over a corpus and estimates its impact.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::anomaly::percent;
use crate::config::SimulationConfig;
use crate::expression::{ExpressionMatcher, FragmentFamily, HeuristicExpression};
use crate::model::{ActionBucket, LogEntry, Rule};

const BENIGN_PATH_PREFIXES: &[&str] = &["/api/", "/static/", "/assets/"];
const BROWSER_TOKENS: &[&str] = &["Chrome/", "Firefox/", "Safari/"];

static VERSION_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+\.\d+").expect("version regex"));

/// Successful hits on common application paths, or a versioned browser
/// user agent, are treated as likely legitimate.
pub fn is_potential_false_positive(entry: &LogEntry) -> bool {
    if entry.status_code == 200 && BENIGN_PATH_PREFIXES.iter().any(|p| entry.path.contains(p)) {
        return true;
    }
    BROWSER_TOKENS.iter().any(|b| entry.user_agent.contains(b)) && VERSION_NUMBER.is_match(&entry.user_agent)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedRequest {
    pub timestamp: Option<DateTime<Utc>>,
    pub ip: String,
    pub path: String,
    pub method: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub family: FragmentFamily,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub rule: Rule,
    pub total_requests: u64,
    pub matched: u64,
    pub would_block: u64,
    pub would_challenge: u64,
    pub would_log: u64,
    /// First matches in corpus order, capped.
    pub matched_requests: Vec<MatchedRequest>,
    /// First candidates in corpus order, capped; see `false_positive_count` for the total.
    pub false_positive_candidates: Vec<LogEntry>,
    pub false_positive_count: u64,
    pub match_rate: f64,
    pub false_positive_rate_estimate: f64,
    pub high_false_positive_risk: bool,
}

#[derive(Debug, Clone)]
pub struct SimulationAccumulator {
    cap: usize,
    total: u64,
    matched: u64,
    would_block: u64,
    would_challenge: u64,
    would_log: u64,
    samples: Vec<MatchedRequest>,
    fp_candidates: Vec<LogEntry>,
    fp_count: u64,
}

impl SimulationAccumulator {
    pub fn new(cap: usize) -> Self {
        Self { cap, total: 0, matched: 0, would_block: 0, would_challenge: 0, would_log: 0, samples: Vec::new(), fp_candidates: Vec::new(), fp_count: 0 }
    }

    pub fn absorb(&mut self, entry: &LogEntry, matcher: &dyn ExpressionMatcher, bucket: ActionBucket) {
        self.total += 1;
        let Some(family) = matcher.matched_family(entry) else { return };
        self.matched += 1;
        match bucket {
            ActionBucket::Block => self.would_block += 1,
            ActionBucket::Challenge => self.would_challenge += 1,
            ActionBucket::Log => self.would_log += 1,
        }
        if self.samples.len() < self.cap {
            self.samples.push(MatchedRequest {
                timestamp: entry.timestamp,
                ip: entry.client_ip.clone(),
                path: entry.path.clone(),
                method: entry.method.clone(),
                status_code: entry.status_code,
                family,
            });
        }
        if is_potential_false_positive(entry) {
            self.fp_count += 1;
            if self.fp_candidates.len() < self.cap { self.fp_candidates.push(entry.clone()); }
        }
    }

    /// `other` must cover entries after `self`'s for the samples to stay in corpus order.
    pub fn merge(mut self, other: SimulationAccumulator) -> SimulationAccumulator {
        self.total += other.total;
        self.matched += other.matched;
        self.would_block += other.would_block;
        self.would_challenge += other.would_challenge;
        self.would_log += other.would_log;
        self.fp_count += other.fp_count;
        let room = self.cap.saturating_sub(self.samples.len());
        self.samples.extend(other.samples.into_iter().take(room));
        let room = self.cap.saturating_sub(self.fp_candidates.len());
        self.fp_candidates.extend(other.fp_candidates.into_iter().take(room));
        self
    }

    pub fn finish(self, rule: &Rule, cfg: &SimulationConfig) -> SimulationResult {
        let match_rate = percent(self.matched, self.total);
        let false_positive_rate_estimate = percent(self.fp_count, self.matched);
        SimulationResult {
            rule: rule.clone(),
            total_requests: self.total,
            matched: self.matched,
            would_block: self.would_block,
            would_challenge: self.would_challenge,
            would_log: self.would_log,
            matched_requests: self.samples,
            false_positive_candidates: self.fp_candidates,
            false_positive_count: self.fp_count,
            match_rate,
            false_positive_rate_estimate,
            high_false_positive_risk: false_positive_rate_estimate > cfg.fp_warning_percent,
        }
    }
}

/// Simulate `rule` with the built-in heuristic evaluator.
pub fn simulate(entries: &[LogEntry], rule: &Rule, cfg: &SimulationConfig) -> SimulationResult {
    let matcher = HeuristicExpression::parse(&rule.expression);
    if !matcher.is_recognized() {
        warn!(target: "traffic_analyzer", expression = %rule.expression, "no known fragment in rule expression; nothing will match");
    } else {
        debug!(target: "traffic_analyzer", families = ?matcher.families(), "rule expression scanned");
    }
    simulate_with(entries, rule, &matcher, cfg)
}

pub fn simulate_with(entries: &[LogEntry], rule: &Rule, matcher: &dyn ExpressionMatcher, cfg: &SimulationConfig) -> SimulationResult {
    let bucket = rule.action.bucket();
    let acc = if entries.len() >= cfg.parallel_min_entries.max(1) {
        entries
            .par_iter()
            .fold(
                || SimulationAccumulator::new(cfg.sample_cap),
                |mut acc, e| {
                    acc.absorb(e, matcher, bucket);
                    acc
                },
            )
            .reduce(|| SimulationAccumulator::new(cfg.sample_cap), SimulationAccumulator::merge)
    } else {
        entries.iter().fold(SimulationAccumulator::new(cfg.sample_cap), |mut acc, e| {
            acc.absorb(e, matcher, bucket);
            acc
        })
    };
    let result = acc.finish(rule, cfg);
    info!(
        target: "traffic_analyzer",
        total = result.total_requests,
        matched = result.matched,
        match_rate = result.match_rate,
        fp_rate = result.false_positive_rate_estimate,
        "rule simulation complete"
    );
    result
}
