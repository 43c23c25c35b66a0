use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::anomaly::{Anomaly, AnomalyKind};
use crate::model::Severity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationAction {
    Block,
    RateLimit,
    Challenge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    WafCustomRule,
    RateLimiting,
    BotManagement,
}

impl MitigationAction {
    pub fn as_str(self) -> &'static str {
        match self {
            MitigationAction::Block => "block",
            MitigationAction::RateLimit => "rate_limit",
            MitigationAction::Challenge => "challenge",
        }
    }
}

impl RuleCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleCategory::WafCustomRule => "waf_custom_rule",
            RuleCategory::RateLimiting => "rate_limiting",
            RuleCategory::BotManagement => "bot_management",
        }
    }
}

impl fmt::Display for MitigationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for RuleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    #[serde(rename = "for")]
    pub target: AnomalyKind,
    pub action: MitigationAction,
    pub rule_type: RuleCategory,
    pub priority: Severity,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<BTreeMap<String, String>>,
}

pub const DEFAULT_RATE: &str = "100 requests per 10 seconds";
pub const DEFAULT_RATE_SCOPE: &str = "ip.src";

/// High-error-rate anomalies are informational and map to nothing.
pub fn recommend(anomaly: &Anomaly) -> Option<Recommendation> {
    let rec = match anomaly.kind {
        AnomalyKind::Pattern(cat) => Recommendation {
            target: anomaly.kind,
            action: MitigationAction::Block,
            rule_type: RuleCategory::WafCustomRule,
            priority: Severity::High,
            description: format!("Block {} patterns immediately", cat.label()),
            params: None,
        },
        AnomalyKind::PotentialDdos => Recommendation {
            target: anomaly.kind,
            action: MitigationAction::RateLimit,
            rule_type: RuleCategory::RateLimiting,
            priority: Severity::Critical,
            description: "Apply aggressive rate limiting per IP/ASN".into(),
            params: Some(BTreeMap::from([
                ("rate".to_string(), DEFAULT_RATE.to_string()),
                ("scope".to_string(), DEFAULT_RATE_SCOPE.to_string()),
            ])),
        },
        AnomalyKind::BotSpike => Recommendation {
            target: anomaly.kind,
            action: MitigationAction::Challenge,
            rule_type: RuleCategory::BotManagement,
            priority: Severity::Medium,
            description: "Enable Bot Management or add JavaScript challenge".into(),
            params: None,
        },
        AnomalyKind::HighErrorRate => return None,
    };
    Some(rec)
}

pub fn recommend_all(anomalies: &[Anomaly]) -> Vec<Recommendation> { anomalies.iter().filter_map(recommend).collect() }
