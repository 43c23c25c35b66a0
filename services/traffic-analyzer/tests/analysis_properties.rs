//! Whole-pipeline properties of the traffic analysis engine.

use proptest::prelude::*;

use traffic_analyzer::{analyze, AnalysisConfig, AnomalyKind, AttackCategory, LogEntry, Severity};

const BROWSER: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0";

fn benign(i: usize) -> LogEntry {
    LogEntry {
        client_ip: format!("192.0.2.{}", i % 50),
        path: format!("/products/{i}"),
        method: "GET".into(),
        status_code: 200,
        user_agent: BROWSER.into(),
        ..Default::default()
    }
}

#[test]
fn traversal_share_is_reported_with_high_severity() {
    let logs: Vec<_> = (0..100)
        .map(|i| {
            let mut e = benign(i);
            if i < 30 { e.path = format!("/files/../secret/{i}"); }
            e
        })
        .collect();
    let r = analyze(&logs, &AnalysisConfig::default());
    assert_eq!(r.stats.pattern_count(AttackCategory::PathTraversal), 30);
    let a = r.anomalies.iter().find(|a| a.kind == AnomalyKind::Pattern(AttackCategory::PathTraversal)).unwrap();
    assert_eq!(a.percentage, Some(30.0));
    assert_eq!(a.severity, Severity::High);
    assert_eq!(r.anomalies.len(), 1);
}

#[test]
fn volumetric_outlier_is_flagged() {
    let mut logs: Vec<_> = (0..9).flat_map(|i| std::iter::repeat(i).take(5)).map(|i| LogEntry { client_ip: format!("198.51.100.{i}"), ..benign(0) }).collect();
    logs.extend((0..50).map(|_| LogEntry { client_ip: "203.0.113.66".into(), ..benign(0) }));
    let r = analyze(&logs, &AnalysisConfig::default());
    let ddos = r.anomalies.iter().find(|a| a.kind == AnomalyKind::PotentialDdos).unwrap();
    assert_eq!(ddos.details[0].ip, "203.0.113.66");
    assert_eq!(r.anomalies_by_severity()[0].kind, AnomalyKind::PotentialDdos);
}

#[test]
fn serialised_result_uses_flat_layout() {
    let r = analyze(&[benign(1)], &AnalysisConfig::default());
    let v = serde_json::to_value(&r).unwrap();
    for key in ["total_requests", "time_window", "patterns", "ip_stats", "path_stats", "status_code_stats", "country_stats", "asn_stats", "user_agent_stats", "anomalies", "recommendations"] {
        assert!(v.get(key).is_some(), "missing {key}");
    }
    assert_eq!(v["status_code_stats"]["200"], 1);
    assert_eq!(v["user_agent_stats"]["human"], 1);
}

fn arb_entry() -> impl Strategy<Value = LogEntry> {
    (
        prop::sample::select(vec!["10.0.0.1", "10.0.0.2", "10.0.0.3", "172.16.0.9"]),
        prop::sample::select(vec!["/", "/login", "/../etc/passwd", "/api/x", "/search"]),
        prop::sample::select(vec!["", "q=shoes", "id=1 union select a from b", "x=<script>", "c=;ls"]),
        prop::sample::select(vec![200u16, 301, 404, 500]),
        prop::sample::select(vec![BROWSER, "curl/8.0", "Googlebot/2.1", "x"]),
        prop::option::of(0i64..86_400),
    )
        .prop_map(|(ip, path, query, status, ua, offset)| LogEntry {
            client_ip: ip.into(),
            path: path.into(),
            query: query.into(),
            status_code: status,
            user_agent: ua.into(),
            timestamp: offset.and_then(|s| chrono::DateTime::from_timestamp(1_700_000_000 + s, 0)),
            ..Default::default()
        })
}

proptest! {
    #[test]
    fn percentages_stay_in_range(logs in prop::collection::vec(arb_entry(), 1..200)) {
        let r = analyze(&logs, &AnalysisConfig::default());
        for a in &r.anomalies {
            if let Some(p) = a.percentage {
                prop_assert!((0.0..=100.0).contains(&p), "{} out of range", p);
            }
        }
    }

    #[test]
    fn tables_sum_to_total(logs in prop::collection::vec(arb_entry(), 0..200)) {
        let s = analyze(&logs, &AnalysisConfig::default()).stats;
        let total = logs.len() as u64;
        prop_assert_eq!(s.total_requests, total);
        prop_assert_eq!(s.ip_stats.values().sum::<u64>(), total);
        prop_assert_eq!(s.path_stats.values().sum::<u64>(), total);
        prop_assert_eq!(s.status_code_stats.values().sum::<u64>(), total);
        prop_assert_eq!(s.user_agent_stats.bot + s.user_agent_stats.human, total);
        prop_assert!(s.duration_seconds() >= 0.0);
    }

    #[test]
    fn partitioning_does_not_change_results(logs in prop::collection::vec(arb_entry(), 0..300)) {
        let seq = analyze(&logs, &AnalysisConfig { parallel_min_entries: usize::MAX, ..Default::default() });
        let par = analyze(&logs, &AnalysisConfig { parallel_min_entries: 1, ..Default::default() });
        prop_assert_eq!(&seq, &par);
        prop_assert_eq!(seq, analyze(&logs, &AnalysisConfig::default()));
    }
}
