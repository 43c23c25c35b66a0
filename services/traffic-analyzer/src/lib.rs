//! Edge-traffic anomaly analysis and WAF rule impact simulation.
//!
//! Two engines share one log-entry model:
//! - [`analyze`] reduces a corpus into frequency tables, detects attack-signature
//!   and volumetric anomalies, and maps them to mitigation recommendations.
//! - [`simulate`] replays a candidate rule over the same corpus and estimates
//!   its match rate and false-positive exposure.
//!
//! Both are synchronous and side-effect free apart from `tracing` events.

pub mod analysis;
pub mod anomaly;
pub mod classifiers;
pub mod config;
pub mod corpus;
pub mod expression;
pub mod model;
pub mod patterns;
pub mod recommend;
pub mod report;
pub mod simulation;
pub mod stats;

pub use analysis::{analyze, analyze_with, AnalysisResult};
pub use anomaly::{Anomaly, AnomalyKind, AddressCount};
pub use config::{AnalysisConfig, AnalyzerConfig, SimulationConfig};
pub use corpus::{parse_corpus, parse_rule, CorpusError};
pub use expression::{evaluate, ExpressionMatcher, FragmentFamily, HeuristicExpression};
pub use model::{ActionBucket, LogEntry, Rule, RuleAction, Severity};
pub use patterns::{AttackCategory, PatternCatalog};
pub use recommend::Recommendation;
pub use report::{render_analysis, render_simulation};
pub use simulation::{simulate, simulate_with, SimulationResult};
pub use stats::TrafficStats;
