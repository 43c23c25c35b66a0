//! Shared data model for both engines.
//!
//! Decoding is lenient for optional fields: a missing, null or mistyped value
//! degrades to its default instead of rejecting the entry.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

pub const UNKNOWN_LABEL: &str = "Unknown";

/// One recorded edge request. Unknown JSON fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(rename = "clientIP", default, deserialize_with = "lenient_string")]
    pub client_ip: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub path: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub query: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub method: String,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status_code: u16,
    #[serde(default = "unknown_label", deserialize_with = "lenient_label")]
    pub country: String,
    #[serde(default = "unknown_label", deserialize_with = "lenient_label")]
    pub asn: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_agent: String,
}

impl Default for LogEntry {
    fn default() -> Self {
        Self {
            timestamp: None,
            client_ip: String::new(),
            path: String::new(),
            query: String::new(),
            method: String::new(),
            status_code: 0,
            country: unknown_label(),
            asn: unknown_label(),
            user_agent: String::new(),
        }
    }
}

fn unknown_label() -> String { UNKNOWN_LABEL.to_string() }

/// Accepts RFC 3339 (`Z` or offset) and offset-less ISO 8601, the latter read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => parse_timestamp(&s),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_label<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => unknown_label(),
    })
}

fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> Result<u16, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u16::try_from(v).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    // declaration order drives Ord: Medium < High < Critical
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Action named by a candidate rule. Unrecognised values are kept verbatim
/// for reporting and tallied as `log`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleAction {
    Block,
    Challenge,
    JsChallenge,
    ManagedChallenge,
    #[default]
    Log,
    Other(String),
}

/// Tally bucket a matched request lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionBucket {
    Block,
    Challenge,
    Log,
}

impl ActionBucket {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionBucket::Block => "block",
            ActionBucket::Challenge => "challenge",
            ActionBucket::Log => "log",
        }
    }
}

impl RuleAction {
    pub fn as_str(&self) -> &str {
        match self {
            RuleAction::Block => "block",
            RuleAction::Challenge => "challenge",
            RuleAction::JsChallenge => "js_challenge",
            RuleAction::ManagedChallenge => "managed_challenge",
            RuleAction::Log => "log",
            RuleAction::Other(s) => s,
        }
    }

    pub fn bucket(&self) -> ActionBucket {
        match self {
            RuleAction::Block => ActionBucket::Block,
            RuleAction::Challenge | RuleAction::JsChallenge | RuleAction::ManagedChallenge => ActionBucket::Challenge,
            RuleAction::Log | RuleAction::Other(_) => ActionBucket::Log,
        }
    }
}

impl From<String> for RuleAction {
    fn from(s: String) -> Self {
        match s.as_str() {
            "block" => RuleAction::Block,
            "challenge" => RuleAction::Challenge,
            "js_challenge" => RuleAction::JsChallenge,
            "managed_challenge" => RuleAction::ManagedChallenge,
            "log" => RuleAction::Log,
            _ => RuleAction::Other(s),
        }
    }
}

impl From<&str> for RuleAction {
    fn from(s: &str) -> Self { RuleAction::from(s.to_string()) }
}

impl From<RuleAction> for String {
    fn from(a: RuleAction) -> Self { a.as_str().to_string() }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Candidate filtering rule under simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub expression: String,
    #[serde(default, deserialize_with = "lenient_action")]
    pub action: RuleAction,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
}

/// A null action is the default `log`; any other non-string value is kept
/// verbatim as its JSON text.
fn lenient_action<'de, D: Deserializer<'de>>(d: D) -> Result<RuleAction, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => RuleAction::from(s),
        None | Some(Value::Null) => RuleAction::Log,
        Some(other) => RuleAction::Other(other.to_string()),
    })
}

impl Rule {
    pub fn new(expression: impl Into<String>, action: impl Into<RuleAction>, description: impl Into<String>) -> Self {
        Self { expression: expression.into(), action: action.into(), description: description.into() }
    }
}
