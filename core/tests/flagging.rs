//! Flag rule engine tests.

use sar_review_core::{
    config::ReviewConfig,
    normalizer::{normalize, NormalizedTable, RawTable},
    rules::{evaluate, BatchWarning, CaseBook, FlagKind},
    workflow::{Tier1Action, WorkflowSession},
};
use std::collections::HashSet;

const COLUMNS: [&str; 6] = [
    "TXN_STEP",
    "TXN_ID",
    "ACCOUNT_ID",
    "COUNTER_PARTY_ACCOUNT_NUM",
    "TXN_AMOUNT",
    "TXN_SOURCE_TYPE_CODE",
];

/// Rows are (step, txn_id, sender, counterparty, amount).
fn batch(rows: &[(&str, &str, &str, &str, &str)]) -> RawTable {
    let mut raw = RawTable::new(COLUMNS);
    for (step, txn, sender, counterparty, amount) in rows {
        raw.push_row([*step, *txn, *sender, *counterparty, *amount, "WIRE"]);
    }
    raw
}

fn table(raw: &RawTable, alerted: &[&str]) -> NormalizedTable {
    let set: HashSet<String> = alerted.iter().map(|s| s.to_string()).collect();
    let alerted = if alerted.is_empty() { None } else { Some(&set) };
    normalize(raw, alerted, &ReviewConfig::default().columns).unwrap()
}

/// Ten rows: S→C four times, S→D three times, X→C three times.
fn mule_batch() -> RawTable {
    batch(&[
        ("1", "T01", "S", "C", "100"),
        ("1", "T02", "S", "D", "100"),
        ("2", "T03", "X", "C", "100"),
        ("2", "T04", "S", "C", "100"),
        ("3", "T05", "S", "D", "100"),
        ("3", "T06", "X", "C", "100"),
        ("4", "T07", "S", "C", "100"),
        ("4", "T08", "S", "D", "100"),
        ("5", "T09", "X", "C", "100"),
        ("5", "T10", "S", "C", "100"),
    ])
}

#[test]
fn single_high_value_row_becomes_a_case() {
    let raw = batch(&[("1", "T1", "A1", "B1", "200")]);
    let session = WorkflowSession::load(&raw, None, ReviewConfig::with_threshold(150.0)).unwrap();

    let case = session.case("1-T1").unwrap();
    assert_eq!(case.flags, vec![FlagKind::HighValue { amount: 200.0 }]);
    assert_eq!(case.flags_joined, "High-value: $200.00");

    let table = session.flagged_table();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].case_id, "1-T1");
    assert_eq!(table[0].sender, "A1");
}

#[test]
fn amount_at_or_below_threshold_is_not_high_value() {
    let raw = batch(&[("1", "T1", "A1", "B1", "150"), ("1", "T2", "A1", "B2", "149.99")]);
    let flags = evaluate(&table(&raw, &[]), &ReviewConfig::with_threshold(150.0));

    assert!(!flags[0].iter().any(|f| matches!(f, FlagKind::HighValue { .. })));
    assert!(flags[1].is_empty());
}

#[test]
fn amount_exactly_at_threshold_gets_fallback_reason() {
    let raw = batch(&[("1", "T1", "A1", "B1", "9000")]);
    let flags = evaluate(&table(&raw, &[]), &ReviewConfig::default());
    assert_eq!(flags[0], vec![FlagKind::ThresholdExceeded]);
    assert_eq!(flags[0][0].to_string(), "Threshold exceeded");
}

#[test]
fn fallback_is_suppressed_when_another_reason_exists() {
    let raw = batch(&[("1", "T1", "A1", "B1", "9000")]);
    let flags = evaluate(&table(&raw, &["A1"]), &ReviewConfig::default());
    assert_eq!(flags[0], vec![FlagKind::PriorAlert]);
}

#[test]
fn frequent_pair_flags_only_that_pair() {
    let raw = mule_batch();
    let session = WorkflowSession::load(&raw, None, ReviewConfig::default()).unwrap();

    let ids: Vec<&str> = session.cases().iter().map(|c| c.case_id.as_str()).collect();
    assert_eq!(ids, vec!["1-T01", "2-T04", "4-T07", "5-T10"]);
    for case in session.cases().iter() {
        assert_eq!(case.flags, vec![FlagKind::FrequentReceiver { pair_count: 4 }]);
        assert_eq!(case.flags_joined, "Frequent receiver pattern (possible mule)");
    }
}

#[test]
fn unknown_counterparty_never_counts_as_a_pair() {
    let raw = batch(&[
        ("1", "T1", "S", "", "10"),
        ("1", "T2", "S", "", "10"),
        ("1", "T3", "S", "", "10"),
        ("1", "T4", "S", "", "10"),
        ("1", "T5", "S", "", "10"),
    ]);
    let flags = evaluate(&table(&raw, &[]), &ReviewConfig::default());
    assert!(flags.iter().all(Vec::is_empty));
}

#[test]
fn batch_without_counterparty_column_has_no_mule_flags() {
    let mut raw = RawTable::new(["TXN_ID", "ACCOUNT_ID", "TXN_AMOUNT"]);
    for i in 0..6 {
        raw.push_row([format!("T{i}"), "S".to_string(), "10".to_string()]);
    }
    let flags = evaluate(&table(&raw, &[]), &ReviewConfig::default());
    assert!(flags.iter().all(Vec::is_empty));
}

#[test]
fn pair_threshold_is_configurable() {
    let raw = batch(&[("1", "T1", "S", "C", "10"), ("1", "T2", "S", "C", "10")]);
    let config = ReviewConfig {
        frequent_pair_threshold: 1,
        ..ReviewConfig::default()
    };
    let flags = evaluate(&table(&raw, &[]), &config);
    assert_eq!(flags[0], vec![FlagKind::FrequentReceiver { pair_count: 2 }]);
}

#[test]
fn prior_alert_flags_sender() {
    let raw = batch(&[("1", "T1", "A1", "B1", "10"), ("1", "T2", "A2", "B1", "10")]);
    let flags = evaluate(&table(&raw, &["A1"]), &ReviewConfig::default());
    assert_eq!(flags[0], vec![FlagKind::PriorAlert]);
    assert_eq!(flags[0][0].to_string(), "Previous alert on sender");
    assert!(flags[1].is_empty());
}

#[test]
fn multiple_flags_follow_rule_order() {
    let raw = batch(&[
        ("1", "T1", "S", "C", "12000"),
        ("1", "T2", "S", "C", "10"),
        ("1", "T3", "S", "C", "10"),
        ("1", "T4", "S", "C", "10"),
    ]);
    let flags = evaluate(&table(&raw, &["S"]), &ReviewConfig::default());
    assert_eq!(
        flags[0],
        vec![
            FlagKind::HighValue { amount: 12000.0 },
            FlagKind::FrequentReceiver { pair_count: 4 },
            FlagKind::PriorAlert,
        ]
    );

    let session = WorkflowSession::load(&raw, None, ReviewConfig::default()).unwrap();
    assert_eq!(
        session.case("1-T1").unwrap().flags_joined,
        "High-value: $12,000.00; Frequent receiver pattern (possible mule)"
    );
}

#[test]
fn evaluation_is_deterministic() {
    let raw = mule_batch();
    let t = table(&raw, &["X"]);
    let config = ReviewConfig::with_threshold(50.0);

    let first = evaluate(&t, &config);
    let second = evaluate(&t, &config);
    assert_eq!(first, second);
}

#[test]
fn a_row_is_a_case_iff_it_has_flags() {
    let raw = mule_batch();
    let t = table(&raw, &["X"]);
    let config = ReviewConfig::default();
    let flags = evaluate(&t, &config);
    let book = CaseBook::build(&t, &config);

    for (row, row_flags) in t.rows.iter().zip(&flags) {
        assert_eq!(
            book.contains(&row.case_id),
            !row_flags.is_empty(),
            "case membership mismatch for {}",
            row.case_id
        );
    }
    assert!(book.iter().all(|c| !c.flags.is_empty()));
}

#[test]
fn case_ids_are_unique_for_unique_step_and_transaction() {
    let raw = mule_batch();
    let session = WorkflowSession::load(&raw, None, ReviewConfig::with_threshold(0.0)).unwrap();

    assert_eq!(session.cases().len(), 10);
    assert!(session.warnings().is_empty());
    let ids: HashSet<&str> = session.cases().iter().map(|c| c.case_id.as_str()).collect();
    assert_eq!(ids.len(), 10);
}

#[test]
fn duplicate_case_ids_warn_and_last_row_wins() {
    let raw = batch(&[
        ("1", "T1", "A1", "B1", "20000"),
        ("1", "T2", "A2", "B2", "15000"),
        ("1", "T1", "A9", "B9", "30000"),
    ]);
    let session = WorkflowSession::load(&raw, None, ReviewConfig::default()).unwrap();

    assert_eq!(
        session.warnings(),
        &[BatchWarning::DuplicateCaseId { case_id: "1-T1".into(), rows: vec![0, 2] }]
    );
    assert_eq!(session.cases().len(), 2);
    let first = session.cases().iter().next().unwrap();
    assert_eq!(first.case_id, "1-T1");
    assert_eq!(first.sender, "A9");
    assert_eq!(first.amount, 30000.0);
}

#[test]
fn suggested_action_escalates_high_value_cases() {
    let raw = batch(&[("1", "T1", "A1", "B1", "20000"), ("1", "T2", "A2", "B2", "10")]);
    let mut alerts = RawTable::new(["ACCOUNT_ID"]);
    alerts.push_row(["A2"]);
    let session = WorkflowSession::load(&raw, Some(&alerts), ReviewConfig::default()).unwrap();

    assert_eq!(session.case("1-T1").unwrap().suggested_action(), Tier1Action::EscalateToTier2);
    assert_eq!(session.case("1-T2").unwrap().suggested_action(), Tier1Action::MonitorOnly);
}
