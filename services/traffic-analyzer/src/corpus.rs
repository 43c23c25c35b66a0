//! Decoding of traffic corpora and rule definitions from JSON text.

use serde_json::Value;
use thiserror::Error;

use crate::model::{LogEntry, Rule};

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corpus must be an array of entries or a single entry object, got {0}")]
    NotACorpus(&'static str),
    #[error("entry {index} is not an object")]
    EntryNotObject { index: usize },
    #[error("rule must be a JSON object")]
    RuleNotObject,
    #[error("rule is missing required field `expression`")]
    MissingExpression,
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A JSON array of entries, or a single object read as a one-entry corpus.
pub fn parse_corpus(text: &str) -> Result<Vec<LogEntry>, CorpusError> {
    let value: Value = serde_json::from_str(text)?;
    let items = match value {
        Value::Array(items) => items,
        obj @ Value::Object(_) => vec![obj],
        other => return Err(CorpusError::NotACorpus(kind_of(&other))),
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            if !item.is_object() {
                return Err(CorpusError::EntryNotObject { index });
            }
            Ok(serde_json::from_value(item)?)
        })
        .collect()
}

pub fn parse_rule(text: &str) -> Result<Rule, CorpusError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(map) = &value else { return Err(CorpusError::RuleNotObject) };
    if !matches!(map.get("expression"), Some(Value::String(_))) {
        return Err(CorpusError::MissingExpression);
    }
    Ok(serde_json::from_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionBucket, RuleAction};

    #[test]
    fn single_object_is_one_entry() {
        let logs = parse_corpus(r#"{"clientIP": "10.0.0.1", "path": "/"}"#).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].client_ip, "10.0.0.1");
    }

    #[test]
    fn scalar_corpus_rejected() {
        assert!(matches!(parse_corpus("42"), Err(CorpusError::NotACorpus("number"))));
        assert!(matches!(parse_corpus("[{}, 3]"), Err(CorpusError::EntryNotObject { index: 1 })));
        assert!(matches!(parse_corpus("[{"), Err(CorpusError::Json(_))));
    }

    #[test]
    fn empty_array_is_valid() {
        assert!(parse_corpus("[]").unwrap().is_empty());
    }

    #[test]
    fn rule_defaults_and_required_expression() {
        let rule = parse_rule(r#"{"expression": "http.request.uri.path contains \"..\""}"#).unwrap();
        assert_eq!(rule.action, RuleAction::Log);
        assert!(rule.description.is_empty());
        assert!(matches!(parse_rule(r#"{"action": "block"}"#), Err(CorpusError::MissingExpression)));
        assert!(matches!(parse_rule("[]"), Err(CorpusError::RuleNotObject)));
    }

    #[test]
    fn null_or_mistyped_action_and_description_degrade() {
        let rule = parse_rule(r#"{"expression": "uri contains \"..\"", "action": null, "description": null}"#).unwrap();
        assert_eq!(rule.action, RuleAction::Log);
        assert!(rule.description.is_empty());
        let numeric = parse_rule(r#"{"expression": "uri contains \"..\"", "action": 5, "description": 7}"#).unwrap();
        assert_eq!(numeric.action, RuleAction::Other("5".into()));
        assert_eq!(numeric.action.bucket(), ActionBucket::Log);
        assert_eq!(numeric.description, "7");
    }
}
