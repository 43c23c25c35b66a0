//! Attack-signature catalog over request path and query text.

use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{LogEntry, Severity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackCategory {
    PathTraversal,
    SqlInjection,
    Xss,
    CommandInjection,
    Xxe,
}

impl AttackCategory {
    pub const ALL: [AttackCategory; 5] = [
        AttackCategory::PathTraversal,
        AttackCategory::SqlInjection,
        AttackCategory::Xss,
        AttackCategory::CommandInjection,
        AttackCategory::Xxe,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttackCategory::PathTraversal => "path_traversal",
            AttackCategory::SqlInjection => "sql_injection",
            AttackCategory::Xss => "xss",
            AttackCategory::CommandInjection => "command_injection",
            AttackCategory::Xxe => "xxe",
        }
    }

    /// Human form used in descriptions, e.g. "sql injection".
    pub fn label(self) -> String { self.as_str().replace('_', " ") }

    pub fn severity(self) -> Severity {
        match self {
            AttackCategory::SqlInjection | AttackCategory::CommandInjection => Severity::Critical,
            _ => Severity::High,
        }
    }

    fn index(self) -> usize { self as usize }
}

impl fmt::Display for AttackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Built-in signatures, compiled case-insensitively. Catalog order is the
/// order pattern anomalies are reported in.
const BUILTIN_PATTERNS: &[(AttackCategory, &str)] = &[
    (AttackCategory::PathTraversal, r"\.\.[/\\]|\.\.%2f|%2e%2e"),
    (
        AttackCategory::SqlInjection,
        r#"(\bunion\b|\bselect\b|\binsert\b|\bdrop\b|\bdelete\b|\bupdate\b).+(\bfrom\b|\bwhere\b|\btable\b)|['"]\s*(or|and)\s*['"]\s*=\s*['"]"#,
    ),
    (AttackCategory::Xss, r"<script|javascript:|onerror=|onload="),
    (AttackCategory::CommandInjection, r"[;&|`$()]|\bsh\b|\bbash\b|\bexec\b"),
    (AttackCategory::Xxe, r"<!ENTITY|SYSTEM|PUBLIC"),
];

static BUILTIN: Lazy<PatternCatalog> = Lazy::new(|| {
    PatternCatalog::from_table(BUILTIN_PATTERNS).expect("built-in attack patterns compile")
});

/// One category hit for the entry at `entry` in the analyzed slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternHit {
    pub category: AttackCategory,
    pub entry: usize,
}

#[derive(Debug, Clone)]
pub struct PatternCatalog {
    entries: Vec<(AttackCategory, Regex)>,
}

impl PatternCatalog {
    pub fn builtin() -> &'static PatternCatalog { &BUILTIN }

    pub fn from_table(table: &[(AttackCategory, &str)]) -> Result<Self, regex::Error> {
        let entries = table
            .iter()
            .map(|(cat, pat)| Ok((*cat, RegexBuilder::new(pat).case_insensitive(true).build()?)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { entries })
    }

    pub fn categories(&self) -> impl Iterator<Item = AttackCategory> + '_ { self.entries.iter().map(|(c, _)| *c) }

    /// False for categories the catalog does not carry.
    pub fn matches(&self, category: AttackCategory, text: &str) -> bool {
        self.entries.iter().any(|(c, re)| *c == category && re.is_match(text))
    }

    /// Categories hit by either the path or the query of `entry`; at most one hit per category.
    pub fn scan<'a>(&'a self, index: usize, entry: &'a LogEntry) -> impl Iterator<Item = PatternHit> + 'a {
        self.entries
            .iter()
            .filter(move |(_, re)| re.is_match(&entry.path) || re.is_match(&entry.query))
            .map(move |(category, _)| PatternHit { category: *category, entry: index })
    }
}

/// Fixed-size hit counter indexed by category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CategoryCounts([u64; AttackCategory::ALL.len()]);

impl CategoryCounts {
    pub fn record(&mut self, hit: PatternHit) { self.0[hit.category.index()] += 1; }
    pub fn get(&self, category: AttackCategory) -> u64 { self.0[category.index()] }
    pub fn merge(&mut self, other: &CategoryCounts) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) { *a += b; }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, query: &str) -> LogEntry {
        LogEntry { path: path.into(), query: query.into(), ..Default::default() }
    }

    #[test]
    fn builtin_catalog_covers_every_category() {
        let cats: Vec<_> = PatternCatalog::builtin().categories().collect();
        assert_eq!(cats, AttackCategory::ALL.to_vec());
    }

    #[test]
    fn traversal_including_encoded_forms() {
        let c = PatternCatalog::builtin();
        assert!(c.matches(AttackCategory::PathTraversal, "/files/../etc/passwd"));
        assert!(c.matches(AttackCategory::PathTraversal, "/files/..%2Fetc"));
        assert!(c.matches(AttackCategory::PathTraversal, "/files/%2E%2E/etc"));
        assert!(!c.matches(AttackCategory::PathTraversal, "/files/report.v2.pdf"));
    }

    #[test]
    fn sql_keywords_and_tautologies() {
        let c = PatternCatalog::builtin();
        assert!(c.matches(AttackCategory::SqlInjection, "id=1 UNION SELECT password FROM users"));
        assert!(c.matches(AttackCategory::SqlInjection, "user=admin' or '1'='1"));
        assert!(!c.matches(AttackCategory::SqlInjection, "q=selected items"));
    }

    #[test]
    fn markup_shell_and_entity_markers() {
        let c = PatternCatalog::builtin();
        assert!(c.matches(AttackCategory::Xss, "q=<SCRIPT>alert(1)</script>"));
        assert!(c.matches(AttackCategory::Xss, "img onerror=steal()"));
        assert!(c.matches(AttackCategory::CommandInjection, "host=example.com;cat /etc/passwd"));
        assert!(c.matches(AttackCategory::CommandInjection, "cmd=bash -i"));
        assert!(c.matches(AttackCategory::Xxe, "<!ENTITY xxe SYSTEM \"file:///etc/passwd\">"));
        assert!(!c.matches(AttackCategory::Xss, "/index.html"));
    }

    #[test]
    fn scan_reports_one_hit_per_category() {
        let c = PatternCatalog::builtin();
        let e = entry("/a/../b/../c", "x=../y");
        let hits: Vec<_> = c.scan(7, &e).collect();
        assert_eq!(hits, vec![PatternHit { category: AttackCategory::PathTraversal, entry: 7 }]);
        assert_eq!(c.scan(0, &entry("/", "")).count(), 0);
    }

    #[test]
    fn counts_merge_elementwise() {
        let mut a = CategoryCounts::default();
        a.record(PatternHit { category: AttackCategory::Xss, entry: 0 });
        let mut b = CategoryCounts::default();
        b.record(PatternHit { category: AttackCategory::Xss, entry: 1 });
        b.record(PatternHit { category: AttackCategory::Xxe, entry: 1 });
        a.merge(&b);
        assert_eq!(a.get(AttackCategory::Xss), 2);
        assert_eq!(a.get(AttackCategory::Xxe), 1);
        assert_eq!(a.get(AttackCategory::SqlInjection), 0);
    }
}
