//! Per-entry heuristics shared by both engines.
//!
//! The scores are illustrative stand-ins for an edge platform's classifiers,
//! not calibrated models. They sit behind [`ScoreFunction`] so a real
//! classifier can replace them without touching callers.

use crate::model::LogEntry;

const BOT_TOKENS: &[&str] = &["bot", "crawler", "spider", "scraper", "curl", "wget"];
const MIN_HUMAN_UA_LEN: usize = 10;

const SENSITIVE_PATH_TOKENS: &[&str] = &["admin", "wp-", "phpmyadmin", ".env"];
const AUTOMATION_UA_TOKENS: &[&str] = &["bot", "curl"];

const CRAWLER_TOKENS: &[&str] = &["bot", "crawler", "spider"];
const CLI_TOOL_TOKENS: &[&str] = &["curl", "wget"];
const SHORT_UA_LEN: usize = 20;

/// Short or absent user agents count as automated.
pub fn is_bot(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    BOT_TOKENS.iter().any(|t| ua.contains(t)) || user_agent.chars().count() < MIN_HUMAN_UA_LEN
}

pub trait ScoreFunction: Send + Sync {
    fn name(&self) -> &'static str;
    fn score(&self, entry: &LogEntry) -> u32;
}

/// Additive threat heuristic: sensitive path +20, error status +10, automation UA +15.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockThreatScore;

impl ScoreFunction for MockThreatScore {
    fn name(&self) -> &'static str { "mock_threat_score" }

    fn score(&self, entry: &LogEntry) -> u32 {
        let mut score = 0;
        let path = entry.path.to_lowercase();
        if SENSITIVE_PATH_TOKENS.iter().any(|t| path.contains(t)) { score += 20; }
        if entry.status_code >= 400 { score += 10; }
        let ua = entry.user_agent.to_lowercase();
        if AUTOMATION_UA_TOKENS.iter().any(|t| ua.contains(t)) { score += 15; }
        score
    }
}

/// Bot likelihood on 0..=100, lower meaning more automated.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockBotScore;

impl ScoreFunction for MockBotScore {
    fn name(&self) -> &'static str { "mock_bot_score" }

    fn score(&self, entry: &LogEntry) -> u32 {
        let ua = entry.user_agent.to_lowercase();
        if CRAWLER_TOKENS.iter().any(|t| ua.contains(t)) {
            10
        } else if CLI_TOOL_TOKENS.iter().any(|t| ua.contains(t)) {
            5
        } else if entry.user_agent.chars().count() < SHORT_UA_LEN {
            25
        } else {
            80
        }
    }
}

pub fn mock_threat_score(entry: &LogEntry) -> u32 { MockThreatScore.score(entry) }
pub fn mock_bot_score(entry: &LogEntry) -> u32 { MockBotScore.score(entry) }
