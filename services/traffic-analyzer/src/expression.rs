//! Approximate evaluation of WAF rule expressions.
//!
//! This is NOT an expression-language interpreter. An expression is scanned for
//! known fragments (e.g. `contains ".."`); each recognised fragment family then
//! tests the entry independently, and the first family that fires decides the
//! match. Logical operators are ignored and unrecognised expressions never
//! match. Results are estimates, not what a production engine would do.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use crate::classifiers::{MockBotScore, MockThreatScore, ScoreFunction};
use crate::model::LogEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentFamily {
    PathTraversal,
    SqlInjection,
    Xss,
    ThreatScore,
    BotScore,
    Country,
}

impl FragmentFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            FragmentFamily::PathTraversal => "path_traversal",
            FragmentFamily::SqlInjection => "sql_injection",
            FragmentFamily::Xss => "xss",
            FragmentFamily::ThreatScore => "threat_score",
            FragmentFamily::BotScore => "bot_score",
            FragmentFamily::Country => "country",
        }
    }
}

impl fmt::Display for FragmentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Families recognised by a literal trigger in the expression and decided by
/// indicator substrings in the lower-cased `path?query`.
struct SubstringFamily {
    family: FragmentFamily,
    triggers: &'static [&'static str],
    indicators: &'static [&'static str],
}

const SUBSTRING_FAMILIES: &[SubstringFamily] = &[
    SubstringFamily {
        family: FragmentFamily::PathTraversal,
        triggers: &[r#"contains "..""#, r#"contains "%2e%2e""#],
        indicators: &["..", "%2e%2e"],
    },
    SubstringFamily {
        family: FragmentFamily::SqlInjection,
        triggers: &["union select", "drop table"],
        indicators: &["union select", "drop table", "' or '1'='1"],
    },
    SubstringFamily {
        family: FragmentFamily::Xss,
        triggers: &["<script", "javascript:"],
        indicators: &["<script", "javascript:", "onerror="],
    },
];

static THREAT_GT: Lazy<Regex> = Lazy::new(|| Regex::new(r"cf\.threat_score\s+gt\s+(\d+)").expect("threat comparison regex"));
static BOT_LT: Lazy<Regex> = Lazy::new(|| Regex::new(r"cf\.bot_management\.score\s+lt\s+(\d+)").expect("bot comparison regex"));
static COUNTRY_EQ: Lazy<Regex> = Lazy::new(|| Regex::new(r#"eq "([A-Z]{2})""#).expect("country regex"));

const COUNTRY_FIELD: &str = "ip.geoip.country";

pub trait ExpressionMatcher: Send + Sync {
    /// Family that fired for `entry`, if any.
    fn matched_family(&self, entry: &LogEntry) -> Option<FragmentFamily>;

    fn matches(&self, entry: &LogEntry) -> bool { self.matched_family(entry).is_some() }
}

enum Check {
    Indicators { family: FragmentFamily, indicators: &'static [&'static str] },
    ThreatAbove(u32),
    BotBelow(u32),
    Country(String),
}

impl Check {
    fn family(&self) -> FragmentFamily {
        match self {
            Check::Indicators { family, .. } => *family,
            Check::ThreatAbove(_) => FragmentFamily::ThreatScore,
            Check::BotBelow(_) => FragmentFamily::BotScore,
            Check::Country(_) => FragmentFamily::Country,
        }
    }
}

/// An expression pre-scanned once into the checks it implies.
pub struct HeuristicExpression {
    checks: Vec<Check>,
    threat: Box<dyn ScoreFunction>,
    bot: Box<dyn ScoreFunction>,
}

impl fmt::Debug for HeuristicExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeuristicExpression")
            .field("families", &self.families())
            .field("threat", &self.threat.name())
            .field("bot", &self.bot.name())
            .finish()
    }
}

fn parse_threshold(re: &Regex, expression: &str) -> Option<u32> {
    re.captures(expression).and_then(|c| c.get(1)).and_then(|m| m.as_str().parse().ok())
}

impl HeuristicExpression {
    pub fn parse(expression: &str) -> Self { Self::with_scorers(expression, Box::new(MockThreatScore), Box::new(MockBotScore)) }

    pub fn with_scorers(expression: &str, threat: Box<dyn ScoreFunction>, bot: Box<dyn ScoreFunction>) -> Self {
        let mut checks: Vec<Check> = SUBSTRING_FAMILIES
            .iter()
            .filter(|f| f.triggers.iter().any(|t| expression.contains(t)))
            .map(|f| Check::Indicators { family: f.family, indicators: f.indicators })
            .collect();
        if let Some(n) = parse_threshold(&THREAT_GT, expression) { checks.push(Check::ThreatAbove(n)); }
        if let Some(n) = parse_threshold(&BOT_LT, expression) { checks.push(Check::BotBelow(n)); }
        if expression.contains(COUNTRY_FIELD) {
            if let Some(code) = COUNTRY_EQ.captures(expression).and_then(|c| c.get(1)) {
                checks.push(Check::Country(code.as_str().to_string()));
            }
        }
        Self { checks, threat, bot }
    }

    pub fn families(&self) -> Vec<FragmentFamily> {
        self.checks.iter().map(Check::family).collect()
    }

    /// False when no known fragment was found; such an expression matches nothing.
    pub fn is_recognized(&self) -> bool { !self.checks.is_empty() }
}

impl ExpressionMatcher for HeuristicExpression {
    fn matched_family(&self, entry: &LogEntry) -> Option<FragmentFamily> {
        let mut target: Option<String> = None;
        for check in &self.checks {
            let hit = match check {
                Check::Indicators { indicators, .. } => {
                    let t = target.get_or_insert_with(|| format!("{}?{}", entry.path.to_lowercase(), entry.query.to_lowercase()));
                    indicators.iter().any(|i| t.contains(i))
                }
                Check::ThreatAbove(n) => self.threat.score(entry) > *n,
                Check::BotBelow(n) => self.bot.score(entry) < *n,
                Check::Country(code) => entry.country == *code,
            };
            if hit { return Some(check.family()); }
        }
        None
    }
}

/// One-shot evaluation; prefer [`HeuristicExpression::parse`] when testing many entries.
pub fn evaluate(expression: &str, entry: &LogEntry) -> bool { HeuristicExpression::parse(expression).matches(entry) }

#[cfg(test)]
mod tests {
    use super::*;

    fn req(path: &str, query: &str) -> LogEntry { LogEntry { path: path.into(), query: query.into(), ..Default::default() } }

    #[test]
    fn traversal_fragment() {
        let expr = r#"http.request.uri.path contains "..""#;
        assert!(evaluate(expr, &req("/static/../../etc/passwd", "")));
        assert!(evaluate(expr, &req("/download", "file=%2E%2E/secret")));
        assert!(!evaluate(expr, &req("/download", "file=report.pdf")));
    }

    #[test]
    fn sql_and_xss_fragments() {
        let sqli = r#"http.request.uri.query contains "union select""#;
        assert!(evaluate(sqli, &req("/items", "id=1 UNION SELECT pw")));
        assert!(evaluate(sqli, &req("/login", "u=x' or '1'='1")));
        let xss = r#"http.request.uri.query contains "<script""#;
        assert!(evaluate(xss, &req("/search", "q=<img src=x onerror=alert(1)>")));
        assert!(!evaluate(xss, &req("/search", "q=shoes")));
    }

    #[test]
    fn score_comparisons() {
        let admin = LogEntry { path: "/admin".into(), status_code: 200, user_agent: "Mozilla/5.0 Firefox/120.0 long enough".into(), ..Default::default() };
        assert!(evaluate("cf.threat_score gt 10", &admin));
        assert!(!evaluate("cf.threat_score gt 20", &admin));
        let crawler = LogEntry { user_agent: "SemrushBot/7".into(), ..Default::default() };
        assert!(evaluate("cf.bot_management.score lt 30", &crawler));
        assert!(!evaluate("cf.bot_management.score lt 30", &admin));
    }

    #[test]
    fn country_fragment() {
        let expr = r#"ip.geoip.country eq "CN""#;
        let cn = LogEntry { country: "CN".into(), ..Default::default() };
        let us = LogEntry { country: "US".into(), ..Default::default() };
        assert!(evaluate(expr, &cn));
        assert!(!evaluate(expr, &us));
        assert!(!evaluate(r#"ip.src eq "CN""#, &cn));
    }

    #[test]
    fn unrecognised_expression_never_matches() {
        let h = HeuristicExpression::parse("http.request.method eq \"POST\"");
        assert!(!h.is_recognized());
        assert!(!h.matches(&req("/../x", "")));
    }

    #[test]
    fn first_family_wins() {
        let h = HeuristicExpression::parse(r#"http.request.uri contains ".." or ip.geoip.country eq "RU""#);
        assert_eq!(h.families(), vec![FragmentFamily::PathTraversal, FragmentFamily::Country]);
        let both = LogEntry { path: "/../x".into(), country: "RU".into(), ..Default::default() };
        assert_eq!(h.matched_family(&both), Some(FragmentFamily::PathTraversal));
        let only_country = LogEntry { path: "/".into(), country: "RU".into(), ..Default::default() };
        assert_eq!(h.matched_family(&only_country), Some(FragmentFamily::Country));
    }
}
