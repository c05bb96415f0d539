//! Two-tier case review state machine.
//!
//! Per-case lifecycle:
//!   New → Tier1InProgress → Tier1Submitted
//!                         → Tier2Pending → Tier2Decided → ReportReady
//!
//! RULES:
//!   - One `WorkflowSession` per loaded batch. The caller owns it.
//!   - Every transition either applies fully and returns its events, or is
//!     rejected with the session unchanged.
//!   - Escalation records are append-only. A resubmission supersedes the
//!     earlier record in the active Tier 2 queue but never edits it.
//!   - A report can only be generated for a case whose Tier 2 approval is
//!     `Approved`.

use crate::{
    command::ReviewCommand,
    config::ReviewConfig,
    error::{ReviewError, ReviewResult},
    event::WorkflowEvent,
    normalizer::{alerted_accounts, normalize, NormalizedTable, RawTable},
    report::SarContent,
    rules::{BatchWarning, Case, CaseBook},
    types::{CaseId, SessionId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ── Vocabulary ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier1Decision {
    #[default]
    Unset,
    NotSuspicious,
    Suspicious,
}

impl Tier1Decision {
    pub fn from_suspicious(suspicious: bool) -> Self {
        if suspicious { Self::Suspicious } else { Self::NotSuspicious }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier1Action {
    StopTransaction,
    TemporaryHold,
    ContactOwner,
    MonitorOnly,
    EscalateToTier2,
}

impl Tier1Action {
    pub const ALL: [Tier1Action; 5] = [
        Self::StopTransaction,
        Self::TemporaryHold,
        Self::ContactOwner,
        Self::MonitorOnly,
        Self::EscalateToTier2,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::StopTransaction => "Stop the transaction in question",
            Self::TemporaryHold   => "Place temporary hold on sender account",
            Self::ContactOwner    => "Contact Account Owner for clarification",
            Self::MonitorOnly     => "Monitor Only",
            Self::EscalateToTier2 => "Escalate to Tier 2",
        }
    }
}

pub fn join_actions(actions: &BTreeSet<Tier1Action>) -> String {
    actions.iter().map(Tier1Action::label).collect::<Vec<_>>().join(", ")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier2Approval {
    #[default]
    Unset,
    Denied,
    Approved,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStage {
    #[default]
    New,
    Tier1InProgress,
    Tier1Submitted,
    Tier2Pending,
    Tier2Decided,
    ReportReady,
}

// ── Per-case state ───────────────────────────────────────────────────────────

/// Unsubmitted Tier 1 edits. Discarded when another case is selected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tier1Draft {
    pub decision: Tier1Decision,
    pub actions: BTreeSet<Tier1Action>,
}

/// The latest submitted Tier 1 review of a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tier1Submission {
    pub decision: Tier1Decision,
    pub actions: BTreeSet<Tier1Action>,
    /// Sequence number of the escalation record this submission created.
    pub escalation: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseWorkflowState {
    pub case_id: CaseId,
    pub stage: CaseStage,
    pub draft: Tier1Draft,
    pub submission: Option<Tier1Submission>,
    pub submission_count: u32,
    pub tier2_approval: Tier2Approval,
    pub report: Option<SarContent>,
}

impl CaseWorkflowState {
    fn new(case_id: CaseId) -> Self {
        Self {
            case_id,
            stage: CaseStage::New,
            draft: Tier1Draft::default(),
            submission: None,
            submission_count: 0,
            tier2_approval: Tier2Approval::Unset,
            report: None,
        }
    }

    /// Sequence of the escalation record currently awaiting (or holding) a
    /// Tier 2 decision for this case.
    pub fn active_escalation(&self) -> Option<u64> {
        self.submission.as_ref().and_then(|s| s.escalation)
    }

    /// Actions of the latest submission, if any.
    pub fn submitted_actions(&self) -> Option<&BTreeSet<Tier1Action>> {
        self.submission.as_ref().map(|s| &s.actions)
    }
}

/// Immutable snapshot appended to the escalation history on an escalating
/// Tier 1 submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationRecord {
    /// 1-based position in the session's escalation history.
    pub sequence: u64,
    pub case_id: CaseId,
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub flags_joined: String,
    pub tier1_decision: Tier1Decision,
    pub tier1_actions: Vec<Tier1Action>,
    pub tier1_actions_joined: String,
}

/// Read-only projection for the flagged-case table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedCaseRow {
    pub case_id: CaseId,
    pub sender: String,
    pub amount: f64,
    pub flags: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "count", rename_all = "snake_case")]
pub enum Tier2QueueStatus {
    /// No Tier 1 review has been submitted in this session.
    NoSubmissions,
    /// Reviews were submitted but none is currently escalated.
    NoneEscalated,
    Pending(usize),
}

// ── Session ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct WorkflowSession {
    session_id: SessionId,
    config: ReviewConfig,
    table: NormalizedTable,
    cases: CaseBook,
    states: HashMap<CaseId, CaseWorkflowState>,
    selected: Option<CaseId>,
    escalations: Vec<EscalationRecord>,
}

impl WorkflowSession {
    /// Normalize and flag a raw batch, starting a fresh session.
    /// Input-shape errors abort before any row is flagged.
    pub fn load(
        transactions: &RawTable,
        alerts: Option<&RawTable>,
        config: ReviewConfig,
    ) -> ReviewResult<Self> {
        transactions.amount_column().ok_or(ReviewError::MissingAmountColumn)?;
        let alerted = alerts
            .map(|a| alerted_accounts(a, &config.columns))
            .transpose()?;
        let table = normalize(transactions, alerted.as_ref(), &config.columns)?;
        Ok(Self::from_table(table, config))
    }

    pub fn from_table(table: NormalizedTable, config: ReviewConfig) -> Self {
        let cases = CaseBook::build(&table, &config);
        let session_id = uuid::Uuid::new_v4().to_string();
        log::info!(
            "session={session_id} loaded {} rows (amount column '{}'), {} cases, {} warnings",
            table.len(),
            table.amount_column,
            cases.len(),
            cases.warnings.len()
        );
        Self {
            session_id,
            config,
            table,
            cases,
            states: HashMap::new(),
            selected: None,
            escalations: Vec::new(),
        }
    }

    // ── Read side ────────────────────────────────────────────

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn config(&self) -> &ReviewConfig {
        &self.config
    }

    pub fn table(&self) -> &NormalizedTable {
        &self.table
    }

    pub fn cases(&self) -> &CaseBook {
        &self.cases
    }

    pub fn warnings(&self) -> &[BatchWarning] {
        &self.cases.warnings
    }

    pub fn case(&self, case_id: &str) -> ReviewResult<&Case> {
        self.cases.get(case_id).ok_or_else(|| not_found(case_id))
    }

    /// Workflow state, present once the case has been selected at least once.
    pub fn state(&self, case_id: &str) -> Option<&CaseWorkflowState> {
        self.states.get(case_id)
    }

    pub fn stage(&self, case_id: &str) -> ReviewResult<CaseStage> {
        self.case(case_id)?;
        Ok(self.states.get(case_id).map_or(CaseStage::New, |s| s.stage))
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn report(&self, case_id: &str) -> Option<&SarContent> {
        self.states.get(case_id).and_then(|s| s.report.as_ref())
    }

    pub fn flagged_table(&self) -> Vec<FlaggedCaseRow> {
        self.cases
            .iter()
            .map(|c| FlaggedCaseRow {
                case_id: c.case_id.clone(),
                sender: c.sender.clone(),
                amount: c.amount,
                flags: c.flags_joined.clone(),
            })
            .collect()
    }

    /// Every escalation record ever created, oldest first.
    pub fn escalation_history(&self) -> &[EscalationRecord] {
        &self.escalations
    }

    /// Records awaiting or holding a Tier 2 decision: the latest submission
    /// of each case, when that submission escalated.
    pub fn tier2_queue(&self) -> Vec<&EscalationRecord> {
        self.escalations
            .iter()
            .filter(|r| {
                self.states
                    .get(&r.case_id)
                    .and_then(CaseWorkflowState::active_escalation)
                    == Some(r.sequence)
            })
            .collect()
    }

    pub fn tier2_queue_status(&self) -> Tier2QueueStatus {
        let submitted = self.states.values().any(|s| s.submission.is_some());
        match self.tier2_queue().len() {
            0 if !submitted => Tier2QueueStatus::NoSubmissions,
            0 => Tier2QueueStatus::NoneEscalated,
            n => Tier2QueueStatus::Pending(n),
        }
    }

    // ── Tier 1 ───────────────────────────────────────────────

    /// Open a case for Tier 1 review. Switching cases discards the unsubmitted
    /// draft of the newly selected case; reselecting the same case keeps it.
    /// Submitted escalations are untouched.
    pub fn select_case(&mut self, case_id: &str) -> ReviewResult<Vec<WorkflowEvent>> {
        self.case(case_id)?;
        let changed = self.selected.as_deref() != Some(case_id);
        let state = self
            .states
            .entry(case_id.to_string())
            .or_insert_with(|| CaseWorkflowState::new(case_id.to_string()));

        if changed {
            state.draft = Tier1Draft::default();
        }
        if matches!(state.stage, CaseStage::New | CaseStage::Tier1Submitted) {
            state.stage = CaseStage::Tier1InProgress;
        }
        self.selected = Some(case_id.to_string());

        log::debug!("session={} selected case={case_id} (draft_reset={changed})", self.session_id);
        Ok(vec![WorkflowEvent::CaseSelected {
            case_id: case_id.to_string(),
            draft_reset: changed,
        }])
    }

    pub fn record_tier1_decision(&mut self, suspicious: bool) -> ReviewResult<Vec<WorkflowEvent>> {
        let state = self.selected_state_mut("record a Tier 1 decision")?;
        let decision = Tier1Decision::from_suspicious(suspicious);
        state.draft.decision = decision;
        Ok(vec![WorkflowEvent::Tier1DecisionRecorded {
            case_id: state.case_id.clone(),
            decision,
        }])
    }

    /// Replace the working action set of the selected case.
    pub fn set_tier1_actions<I>(&mut self, actions: I) -> ReviewResult<Vec<WorkflowEvent>>
    where
        I: IntoIterator<Item = Tier1Action>,
    {
        let state = self.selected_state_mut("set Tier 1 actions")?;
        state.draft.actions = actions.into_iter().collect();
        Ok(vec![WorkflowEvent::Tier1ActionsSet {
            case_id: state.case_id.clone(),
            actions: state.draft.actions.iter().copied().collect(),
        }])
    }

    /// Commit the selected case's draft. A suspicious decision with no
    /// actions defaults to Monitor Only. Including Escalate to Tier 2 appends
    /// an escalation record and moves the case to Tier2Pending.
    pub fn submit_tier1(&mut self) -> ReviewResult<Vec<WorkflowEvent>> {
        const ACTION: &str = "submit Tier 1 review";
        let case_id = self
            .selected
            .clone()
            .ok_or_else(|| ReviewError::invalid(ACTION, "no case selected"))?;
        let case = self.cases.get(&case_id).ok_or_else(|| not_found(&case_id))?;
        let state = self
            .states
            .get_mut(&case_id)
            .ok_or_else(|| ReviewError::invalid(ACTION, "case was never opened"))?;

        if state.stage == CaseStage::ReportReady {
            return Err(ReviewError::invalid(ACTION, format!("report already generated for {case_id}")));
        }
        let decision = state.draft.decision;
        if decision == Tier1Decision::Unset {
            return Err(ReviewError::invalid(ACTION, "no Tier 1 decision recorded"));
        }

        let mut actions = state.draft.actions.clone();
        if decision == Tier1Decision::Suspicious && actions.is_empty() {
            actions.insert(Tier1Action::MonitorOnly);
        }

        let mut events = vec![WorkflowEvent::Tier1Submitted {
            case_id: case_id.clone(),
            decision,
            actions: actions.iter().copied().collect(),
        }];

        let escalation = if actions.contains(&Tier1Action::EscalateToTier2) {
            let sequence = self.escalations.len() as u64 + 1;
            self.escalations.push(EscalationRecord {
                sequence,
                case_id: case_id.clone(),
                sender: case.sender.clone(),
                receiver: case.receiver.clone(),
                amount: case.amount,
                flags_joined: case.flags_joined.clone(),
                tier1_decision: decision,
                tier1_actions: actions.iter().copied().collect(),
                tier1_actions_joined: join_actions(&actions),
            });
            events.push(WorkflowEvent::EscalationQueued { case_id: case_id.clone(), sequence });
            Some(sequence)
        } else {
            None
        };

        if let Some(previous) = state.active_escalation() {
            log::info!("case={case_id} resubmitted; escalation #{previous} superseded");
        }

        state.stage = if escalation.is_some() {
            CaseStage::Tier2Pending
        } else {
            CaseStage::Tier1Submitted
        };
        state.tier2_approval = Tier2Approval::Unset;
        state.submission = Some(Tier1Submission { decision, actions, escalation });
        state.submission_count += 1;

        log::info!(
            "session={} case={case_id} Tier 1 submitted ({:?}, escalated={})",
            self.session_id,
            decision,
            escalation.is_some()
        );
        Ok(events)
    }

    // ── Tier 2 ───────────────────────────────────────────────

    /// The escalation record under Tier 2 review for this case.
    pub fn review_tier2(&self, case_id: &str) -> ReviewResult<&EscalationRecord> {
        self.case(case_id)?;
        let sequence = self
            .states
            .get(case_id)
            .and_then(CaseWorkflowState::active_escalation)
            .ok_or_else(|| ReviewError::NotEscalated { case_id: case_id.to_string() })?;
        self.escalations
            .get(sequence as usize - 1)
            .ok_or_else(|| ReviewError::NotEscalated { case_id: case_id.to_string() })
    }

    pub fn decide_tier2(&mut self, case_id: &str, approved: bool) -> ReviewResult<Vec<WorkflowEvent>> {
        self.review_tier2(case_id)?;
        let state = self
            .states
            .get_mut(case_id)
            .ok_or_else(|| ReviewError::NotEscalated { case_id: case_id.to_string() })?;

        if state.stage == CaseStage::ReportReady {
            let err = ReviewError::invalid("decide Tier 2", format!("report already generated for {case_id}"));
            log::warn!("{err}");
            return Err(err);
        }

        let approval = if approved { Tier2Approval::Approved } else { Tier2Approval::Denied };
        state.tier2_approval = approval;
        state.stage = CaseStage::Tier2Decided;

        log::info!("session={} case={case_id} Tier 2 decision: {approval:?}", self.session_id);
        Ok(vec![WorkflowEvent::Tier2Decided { case_id: case_id.to_string(), approval }])
    }

    // ── Report ───────────────────────────────────────────────

    /// Build the SAR content dated today. See [`Self::generate_report_on`].
    pub fn generate_report(&mut self, case_id: &str) -> ReviewResult<Vec<WorkflowEvent>> {
        self.generate_report_on(case_id, chrono::Local::now().date_naive())
    }

    /// Build and keep the SAR content for an approved case.
    /// Rejected unless the Tier 2 approval is `Approved`, and once a report
    /// exists it is never rebuilt.
    pub fn generate_report_on(
        &mut self,
        case_id: &str,
        report_date: NaiveDate,
    ) -> ReviewResult<Vec<WorkflowEvent>> {
        let case = self.cases.get(case_id).ok_or_else(|| not_found(case_id))?;
        let approval = self.states.get(case_id).map_or(Tier2Approval::Unset, |s| s.tier2_approval);
        if approval != Tier2Approval::Approved {
            let err = ReviewError::invalid(
                "generate report",
                format!("case {case_id} requires Tier 2 approval (current: {approval:?})"),
            );
            log::warn!("{err}");
            return Err(err);
        }

        let Some(state) = self.states.get_mut(case_id) else {
            return Err(not_found(case_id));
        };
        if state.stage == CaseStage::ReportReady {
            let err = ReviewError::invalid("generate report", format!("report already generated for {case_id}"));
            log::warn!("{err}");
            return Err(err);
        }
        let content = SarContent::build(case, state, &self.config, report_date);
        let file_stem = content.file_stem();
        state.report = Some(content);
        state.stage = CaseStage::ReportReady;

        log::info!("session={} case={case_id} SAR content ready ({file_stem})", self.session_id);
        Ok(vec![WorkflowEvent::ReportGenerated {
            case_id: case_id.to_string(),
            file_stem,
            report_date,
        }])
    }

    // ── Commands ─────────────────────────────────────────────

    /// Dispatch a serialized user action.
    pub fn apply(&mut self, command: ReviewCommand) -> ReviewResult<Vec<WorkflowEvent>> {
        match command {
            ReviewCommand::SelectCase { case_id } => self.select_case(&case_id),
            ReviewCommand::RecordTier1Decision { suspicious } => self.record_tier1_decision(suspicious),
            ReviewCommand::SetTier1Actions { actions } => self.set_tier1_actions(actions),
            ReviewCommand::SubmitTier1 => self.submit_tier1(),
            ReviewCommand::DecideTier2 { case_id, approved } => self.decide_tier2(&case_id, approved),
            ReviewCommand::GenerateReport { case_id } => self.generate_report(&case_id),
        }
    }

    fn selected_state_mut(&mut self, action: &str) -> ReviewResult<&mut CaseWorkflowState> {
        let case_id = self
            .selected
            .as_deref()
            .ok_or_else(|| ReviewError::invalid(action, "no case selected"))?;
        self.states
            .get_mut(case_id)
            .ok_or_else(|| ReviewError::invalid(action, "case was never opened"))
    }
}

fn not_found(case_id: &str) -> ReviewError {
    ReviewError::CaseNotFound { case_id: case_id.to_string() }
}
