use serde::{Deserialize, Serialize};
use crate::{types::CaseId, workflow::Tier1Action};

/// All user-issued workflow actions.
/// Tier 1 actions apply to the currently selected case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ReviewCommand {
    // ── Tier 1 analyst ────────────────────────────
    SelectCase { case_id: CaseId },
    RecordTier1Decision { suspicious: bool },
    SetTier1Actions { actions: Vec<Tier1Action> },
    SubmitTier1,

    // ── Tier 2 compliance officer ─────────────────
    DecideTier2 { case_id: CaseId, approved: bool },
    GenerateReport { case_id: CaseId },
}
