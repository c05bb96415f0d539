//! SAR content and document layout tests.

use chrono::NaiveDate;
use sar_review_core::{
    config::ReviewConfig,
    normalizer::RawTable,
    report::{render_report, Block, PlainTextRenderer, SarContent},
    workflow::{Tier1Action, WorkflowSession},
};

fn report_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

/// Walk one case through escalation and approval and return its report.
fn approved_report(raw: &RawTable, alerts: Option<&RawTable>, case_id: &str, actions: &[Tier1Action]) -> SarContent {
    let mut session = WorkflowSession::load(raw, alerts, ReviewConfig::default()).unwrap();
    session.select_case(case_id).unwrap();
    session.record_tier1_decision(true).unwrap();
    session.set_tier1_actions(actions.iter().copied()).unwrap();
    session.submit_tier1().unwrap();
    session.decide_tier2(case_id, true).unwrap();
    session.generate_report_on(case_id, report_date()).unwrap();
    session.report(case_id).cloned().unwrap()
}

fn full_batch() -> RawTable {
    let mut raw = RawTable::new([
        "TXN_STEP",
        "TXN_ID",
        "ACCOUNT_ID",
        "COUNTER_PARTY_ACCOUNT_NUM",
        "TXN_AMOUNT",
        "TXN_SOURCE_TYPE_CODE",
    ]);
    raw.push_row(["7", "T100", "ACC-1", "ACC-9", "12500.5", "WIRE"]);
    raw
}

#[test]
fn content_carries_subject_fields() {
    let mut alerts = RawTable::new(["ACCOUNT_ID"]);
    alerts.push_row(["ACC-1"]);
    let report = approved_report(&full_batch(), Some(&alerts), "7-T100", &[Tier1Action::EscalateToTier2]);

    assert_eq!(report.case_id, "7-T100");
    assert_eq!(report.report_date, report_date());
    assert_eq!(report.institution, "Simulated Bank Corp");
    assert_eq!(report.subject.sender, "ACC-1");
    assert_eq!(report.subject.receiver, "ACC-9");
    assert_eq!(report.subject.amount, "$12,500.50");
    assert_eq!(report.subject.channel, "WIRE");
    assert_eq!(report.subject.step, "7");
    assert!(report.subject.prior_alert);
    assert_eq!(
        report.indicators,
        vec!["High-value: $12,500.50".to_string(), "Previous alert on sender".to_string()]
    );
}

#[test]
fn narrative_interpolates_amount_channel_and_step() {
    let report = approved_report(
        &full_batch(),
        None,
        "7-T100",
        &[Tier1Action::TemporaryHold, Tier1Action::EscalateToTier2],
    );

    assert_eq!(report.narrative[0], "Transfer of $12,500.50 via WIRE at Step 7.");
    assert_eq!(report.narrative[1], "Flags: High-value: $12,500.50.");
    assert_eq!(
        report.narrative[2],
        "Tier 1 Actions: Place temporary hold on sender account, Escalate to Tier 2."
    );
    assert_eq!(report.narrative[3], "Tier 2 Approval: Yes");
    assert!(report.analyst_escalated);
    assert!(report.tier2_approved);
    assert_eq!(report.tier1_actions.len(), 2);
}

#[test]
fn missing_optional_fields_render_as_not_available() {
    let mut raw = RawTable::new(["TXN_ID", "ACCOUNT_ID", "AMOUNT"]);
    raw.push_row(["T5", "ACC-2", "20000"]);
    let report = approved_report(&raw, None, "T5", &[Tier1Action::EscalateToTier2]);

    assert_eq!(report.subject.receiver, "N/A");
    assert_eq!(report.subject.channel, "N/A");
    assert_eq!(report.subject.step, "N/A");
    assert!(!report.subject.prior_alert);
    assert_eq!(report.narrative[0], "Transfer of $20,000.00 via N/A at Step N/A.");
}

#[test]
fn file_name_uses_case_id() {
    let report = approved_report(&full_batch(), None, "7-T100", &[Tier1Action::EscalateToTier2]);
    assert_eq!(report.file_stem(), "SAR_7-T100");
    assert_eq!(report.file_name("docx"), "SAR_7-T100.docx");
}

#[test]
fn document_has_four_sections_in_order() {
    let report = approved_report(&full_batch(), None, "7-T100", &[Tier1Action::EscalateToTier2]);
    let document = report.to_document();

    assert_eq!(
        document.blocks[0],
        Block::Heading1("SUSPICIOUS ACTIVITY REPORT - Case 7-T100".into())
    );
    let sections: Vec<&str> = document
        .blocks
        .iter()
        .filter_map(|b| match b {
            Block::Heading2(text) => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        sections,
        vec![
            "Section I - Subject Information",
            "Section II - Suspicious Activity Indicators",
            "Section III - Narrative Explanation",
            "Section IV - Actions Taken",
        ]
    );

    let bullets = document.blocks.iter().filter(|b| matches!(b, Block::Bullet(_))).count();
    assert_eq!(bullets, report.indicators.len());
    assert!(document
        .blocks
        .contains(&Block::Paragraph("Report Date: 2026-10-18".into())));
    assert!(document
        .blocks
        .contains(&Block::Paragraph("Tier 2 Approved: Yes".into())));
}

#[test]
fn plain_text_rendering_names_the_file_and_lists_indicators() {
    let report = approved_report(&full_batch(), None, "7-T100", &[Tier1Action::EscalateToTier2]);
    let rendered = render_report(&report, &PlainTextRenderer).unwrap();

    assert_eq!(rendered.file_name, "SAR_7-T100.txt");
    let text = String::from_utf8(rendered.bytes).unwrap();
    assert!(text.starts_with("SUSPICIOUS ACTIVITY REPORT - Case 7-T100\n===="));
    assert!(text.contains("  • High-value: $12,500.50\n"));
    assert!(text.contains("Section IV - Actions Taken\n--------------------------\n"));
    assert!(text.contains("Analyst Decision: Escalated to Tier 2\n"));
}
