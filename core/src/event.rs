//! Workflow events: what each transition emitted.
//!
//! Every successful transition on a `WorkflowSession` returns the events it
//! produced, in order. Callers (UI adapters, the runner) render or log them;
//! the session never reads them back.

use crate::{
    types::CaseId,
    workflow::{Tier1Action, Tier1Decision, Tier2Approval},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    // ── Tier 1 ─────────────────────────────────────
    CaseSelected {
        case_id: CaseId,
        draft_reset: bool,
    },
    Tier1DecisionRecorded {
        case_id: CaseId,
        decision: Tier1Decision,
    },
    Tier1ActionsSet {
        case_id: CaseId,
        actions: Vec<Tier1Action>,
    },
    Tier1Submitted {
        case_id: CaseId,
        decision: Tier1Decision,
        actions: Vec<Tier1Action>,
    },
    EscalationQueued {
        case_id: CaseId,
        sequence: u64,
    },

    // ── Tier 2 ─────────────────────────────────────
    Tier2Decided {
        case_id: CaseId,
        approval: Tier2Approval,
    },
    ReportGenerated {
        case_id: CaseId,
        file_stem: String,
        report_date: NaiveDate,
    },
}

impl WorkflowEvent {
    pub fn case_id(&self) -> &str {
        match self {
            Self::CaseSelected { case_id, .. }
            | Self::Tier1DecisionRecorded { case_id, .. }
            | Self::Tier1ActionsSet { case_id, .. }
            | Self::Tier1Submitted { case_id, .. }
            | Self::EscalationQueued { case_id, .. }
            | Self::Tier2Decided { case_id, .. }
            | Self::ReportGenerated { case_id, .. } => case_id,
        }
    }
}

/// Stable string name of a WorkflowEvent variant, for log lines.
pub fn event_type_name(event: &WorkflowEvent) -> &'static str {
    match event {
        WorkflowEvent::CaseSelected { .. }          => "case_selected",
        WorkflowEvent::Tier1DecisionRecorded { .. } => "tier1_decision_recorded",
        WorkflowEvent::Tier1ActionsSet { .. }       => "tier1_actions_set",
        WorkflowEvent::Tier1Submitted { .. }        => "tier1_submitted",
        WorkflowEvent::EscalationQueued { .. }      => "escalation_queued",
        WorkflowEvent::Tier2Decided { .. }          => "tier2_decided",
        WorkflowEvent::ReportGenerated { .. }       => "report_generated",
    }
}
