//! SAR report content.
//!
//! `SarContent::build` is a pure function of the case, its workflow state,
//! the config and the report date. Turning content into a file belongs to a
//! `ReportRenderer`; the crate ships a plain-text one.

use crate::{
    config::ReviewConfig,
    error::ReviewResult,
    rules::Case,
    types::{format_currency, CaseId},
    workflow::{join_actions, CaseWorkflowState, Tier1Action, Tier2Approval},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectInfo {
    pub sender: String,
    pub receiver: String,
    /// Currency-formatted, e.g. `$9,500.00`.
    pub amount: String,
    pub channel: String,
    pub step: String,
    pub prior_alert: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarContent {
    pub case_id: CaseId,
    pub report_date: NaiveDate,
    pub institution: String,
    pub filed_by: String,
    pub subject: SubjectInfo,
    pub indicators: Vec<String>,
    pub narrative: Vec<String>,
    pub tier1_actions: Vec<String>,
    pub tier1_actions_summary: String,
    pub analyst_escalated: bool,
    pub tier2_approved: bool,
}

impl SarContent {
    pub fn build(
        case: &Case,
        state: &CaseWorkflowState,
        config: &ReviewConfig,
        report_date: NaiveDate,
    ) -> Self {
        let subject = SubjectInfo {
            sender: case.sender.clone(),
            receiver: non_empty_or_na(&case.receiver),
            amount: format_currency(case.amount),
            channel: case.channel.clone().unwrap_or_else(|| NOT_AVAILABLE.into()),
            step: case.step.clone().unwrap_or_else(|| NOT_AVAILABLE.into()),
            prior_alert: case.has_prior_alert,
        };
        let indicators: Vec<String> = case.flags.iter().map(ToString::to_string).collect();

        let actions = state.submitted_actions().cloned().unwrap_or_default();
        let tier1_actions: Vec<String> = actions.iter().map(|a| a.label().to_string()).collect();
        let tier1_actions_summary = join_actions(&actions);
        let tier2_approved = state.tier2_approval == Tier2Approval::Approved;

        let mut narrative = vec![
            format!(
                "Transfer of {} via {} at Step {}.",
                subject.amount, subject.channel, subject.step
            ),
            format!("Flags: {}.", indicators.join(", ")),
        ];
        if !tier1_actions.is_empty() {
            narrative.push(format!("Tier 1 Actions: {tier1_actions_summary}."));
        }
        narrative.push(format!("Tier 2 Approval: {}", yes_no(tier2_approved)));

        Self {
            case_id: case.case_id.clone(),
            report_date,
            institution: config.institution_name.clone(),
            filed_by: config.filed_by.clone(),
            subject,
            indicators,
            narrative,
            tier1_actions,
            tier1_actions_summary,
            analyst_escalated: actions.contains(&Tier1Action::EscalateToTier2),
            tier2_approved,
        }
    }

    /// `SAR_<case_id>`
    pub fn file_stem(&self) -> String {
        format!("SAR_{}", self.case_id)
    }

    /// `SAR_<case_id>.<ext>`
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{extension}", self.file_stem())
    }

    /// Lay the content out as a four-section document.
    pub fn to_document(&self) -> SarDocument {
        let s = &self.subject;
        let mut blocks = vec![
            Block::heading(1, format!("SUSPICIOUS ACTIVITY REPORT - Case {}", self.case_id)),
            Block::paragraph(format!("Report Date: {}", self.report_date.format("%Y-%m-%d"))),
            Block::paragraph(format!("Institution: {}", self.institution)),
            Block::paragraph(format!("Filed by: {}", self.filed_by)),
            Block::heading(2, "Section I - Subject Information"),
            Block::paragraph(format!("Sender Account ID: {}", s.sender)),
            Block::paragraph(format!("Receiver Account ID: {}", s.receiver)),
            Block::paragraph(format!("Amount: {}", s.amount)),
            Block::paragraph(format!("Channel: {}", s.channel)),
            Block::paragraph(format!("Step: {}", s.step)),
            Block::paragraph(format!("Previous Alert: {}", yes_no(s.prior_alert))),
            Block::heading(2, "Section II - Suspicious Activity Indicators"),
        ];
        blocks.extend(self.indicators.iter().cloned().map(Block::Bullet));
        blocks.push(Block::heading(2, "Section III - Narrative Explanation"));
        blocks.extend(self.narrative.iter().cloned().map(Block::Paragraph));
        blocks.push(Block::heading(2, "Section IV - Actions Taken"));
        blocks.push(Block::paragraph(format!(
            "Analyst Decision: {}",
            if self.analyst_escalated { "Escalated to Tier 2" } else { "Not escalated" }
        )));
        blocks.push(Block::paragraph(format!("Tier 1: {}", self.tier1_actions_summary)));
        blocks.push(Block::paragraph(format!("Tier 2 Approved: {}", yes_no(self.tier2_approved))));

        SarDocument {
            file_stem: self.file_stem(),
            blocks,
        }
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

fn non_empty_or_na(value: &str) -> String {
    if value.is_empty() { NOT_AVAILABLE.into() } else { value.to_string() }
}

// ── Document layout ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "block", content = "text", rename_all = "snake_case")]
pub enum Block {
    Heading1(String),
    Heading2(String),
    Paragraph(String),
    Bullet(String),
}

impl Block {
    fn heading(level: u8, text: impl Into<String>) -> Self {
        match level {
            1 => Self::Heading1(text.into()),
            _ => Self::Heading2(text.into()),
        }
    }

    fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph(text.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SarDocument {
    pub file_stem: String,
    pub blocks: Vec<Block>,
}

/// A finished, downloadable report.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// The seam to a document encoder (docx, pdf, ...).
pub trait ReportRenderer {
    fn extension(&self) -> &'static str;

    fn render(&self, document: &SarDocument) -> ReviewResult<Vec<u8>>;
}

pub fn render_report(content: &SarContent, renderer: &dyn ReportRenderer) -> ReviewResult<RenderedReport> {
    let document = content.to_document();
    let bytes = renderer.render(&document)?;
    Ok(RenderedReport {
        file_name: content.file_name(renderer.extension()),
        bytes,
    })
}

/// UTF-8 text with underlined headings and dotted bullets.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextRenderer;

impl ReportRenderer for PlainTextRenderer {
    fn extension(&self) -> &'static str {
        "txt"
    }

    fn render(&self, document: &SarDocument) -> ReviewResult<Vec<u8>> {
        let mut out = String::new();
        for block in &document.blocks {
            match block {
                Block::Heading1(text) => {
                    out.push_str(text);
                    out.push('\n');
                    out.push_str(&"=".repeat(text.chars().count()));
                    out.push_str("\n\n");
                }
                Block::Heading2(text) => {
                    if !out.ends_with("\n\n") {
                        out.push('\n');
                    }
                    out.push_str(text);
                    out.push('\n');
                    out.push_str(&"-".repeat(text.chars().count()));
                    out.push('\n');
                }
                Block::Paragraph(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                Block::Bullet(text) => {
                    out.push_str("  • ");
                    out.push_str(text);
                    out.push('\n');
                }
            }
        }
        Ok(out.into_bytes())
    }
}
