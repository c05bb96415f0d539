//! Flag rule engine.
//!
//! Rules run independently per row, in display order:
//!   1. High-value       amount > high_value_threshold
//!   2. Frequent receiver (sender, counterparty) pair count > frequent_pair_threshold
//!   3. Prior alert      sender is on the alert list
//!   4. Threshold        amount >= threshold with no other reason
//!
//! Evaluation is a pure function of the normalized table and the config.
//! Re-running it yields the same flags in the same order.

use crate::{
    config::ReviewConfig,
    normalizer::{NormalizedTable, TransactionRow},
    types::{format_currency, AccountId, CaseId},
    workflow::Tier1Action,
};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt};

/// Why a transaction was selected for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlagKind {
    HighValue { amount: f64 },
    FrequentReceiver { pair_count: usize },
    PriorAlert,
    ThresholdExceeded,
}

impl fmt::Display for FlagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighValue { amount } => write!(f, "High-value: {}", format_currency(*amount)),
            Self::FrequentReceiver { .. } => f.write_str("Frequent receiver pattern (possible mule)"),
            Self::PriorAlert => f.write_str("Previous alert on sender"),
            Self::ThresholdExceeded => f.write_str("Threshold exceeded"),
        }
    }
}

/// Counts of rows per (sender, counterparty) pair across the whole batch.
/// Rows with an unknown (empty) counterparty are not counted, so a batch with
/// no counterparty column never raises a frequent-receiver flag.
fn pair_counts(table: &NormalizedTable) -> HashMap<(&str, &str), usize> {
    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for row in &table.rows {
        if row.counterparty_account_id.is_empty() {
            continue;
        }
        *counts
            .entry((row.account_id.as_str(), row.counterparty_account_id.as_str()))
            .or_default() += 1;
    }
    counts
}

fn flags_for_row(
    row: &TransactionRow,
    counts: &HashMap<(&str, &str), usize>,
    config: &ReviewConfig,
) -> Vec<FlagKind> {
    let mut flags = Vec::new();

    if row.amount > config.high_value_threshold {
        flags.push(FlagKind::HighValue { amount: row.amount });
    }

    let pair_count = counts
        .get(&(row.account_id.as_str(), row.counterparty_account_id.as_str()))
        .copied()
        .unwrap_or(0);
    if pair_count > config.frequent_pair_threshold {
        flags.push(FlagKind::FrequentReceiver { pair_count });
    }

    if row.has_prior_alert {
        flags.push(FlagKind::PriorAlert);
    }

    if flags.is_empty() && row.amount >= config.high_value_threshold {
        flags.push(FlagKind::ThresholdExceeded);
    }

    flags
}

/// Flags for every row, index-aligned with `table.rows`.
pub fn evaluate(table: &NormalizedTable, config: &ReviewConfig) -> Vec<Vec<FlagKind>> {
    let counts = pair_counts(table);
    table
        .rows
        .iter()
        .map(|row| {
            let flags = flags_for_row(row, &counts, config);
            if !flags.is_empty() {
                log::debug!("case={} flags={}", row.case_id, join_flags(&flags));
            }
            flags
        })
        .collect()
}

pub fn join_flags(flags: &[FlagKind]) -> String {
    flags
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The review unit bound to one flagged transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    pub case_id: CaseId,
    pub sender: AccountId,
    pub receiver: AccountId,
    pub amount: f64,
    pub step: Option<String>,
    pub channel: Option<String>,
    pub has_prior_alert: bool,
    /// Never empty.
    pub flags: Vec<FlagKind>,
    pub flags_joined: String,
}

impl Case {
    fn from_row(row: &TransactionRow, flags: Vec<FlagKind>) -> Self {
        Self {
            case_id: row.case_id.clone(),
            sender: row.account_id.clone(),
            receiver: row.counterparty_account_id.clone(),
            amount: row.amount,
            step: row.step.clone(),
            channel: row.source_channel.clone(),
            has_prior_alert: row.has_prior_alert,
            flags_joined: join_flags(&flags),
            flags,
        }
    }

    pub fn has_flag(&self, pred: impl Fn(&FlagKind) -> bool) -> bool {
        self.flags.iter().any(pred)
    }

    /// Advisory first action for the Tier 1 analyst.
    pub fn suggested_action(&self) -> Tier1Action {
        if self.has_flag(|f| matches!(f, FlagKind::HighValue { .. })) {
            Tier1Action::EscalateToTier2
        } else {
            Tier1Action::MonitorOnly
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum BatchWarning {
    /// Two rows share a case id; the later flagged row replaced the earlier case.
    DuplicateCaseId { case_id: CaseId, rows: Vec<usize> },
}

/// All cases of one batch, in batch order, with lookup by id.
#[derive(Debug, Clone, Default)]
pub struct CaseBook {
    cases: Vec<Case>,
    index: HashMap<CaseId, usize>,
    pub warnings: Vec<BatchWarning>,
}

impl CaseBook {
    /// Evaluate the table and keep every row with at least one flag.
    pub fn build(table: &NormalizedTable, config: &ReviewConfig) -> Self {
        let flags = evaluate(table, config);
        let mut book = CaseBook {
            warnings: duplicate_warnings(table),
            ..Default::default()
        };

        for (row, row_flags) in table.rows.iter().zip(flags) {
            if row_flags.is_empty() {
                continue;
            }
            let case = Case::from_row(row, row_flags);
            match book.index.get(&case.case_id) {
                Some(&pos) => book.cases[pos] = case,
                None => {
                    book.index.insert(case.case_id.clone(), book.cases.len());
                    book.cases.push(case);
                }
            }
        }

        for warning in &book.warnings {
            let BatchWarning::DuplicateCaseId { case_id, rows } = warning;
            log::warn!("Duplicate case id {case_id} on rows {rows:?}; last row wins");
        }
        book
    }

    pub fn get(&self, case_id: &str) -> Option<&Case> {
        self.index.get(case_id).map(|&pos| &self.cases[pos])
    }

    pub fn contains(&self, case_id: &str) -> bool {
        self.index.contains_key(case_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Case> {
        self.cases.iter()
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

fn duplicate_warnings(table: &NormalizedTable) -> Vec<BatchWarning> {
    let mut seen: HashMap<&str, Vec<usize>> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for (i, row) in table.rows.iter().enumerate() {
        let rows = seen.entry(row.case_id.as_str()).or_default();
        if rows.len() == 1 {
            order.push(row.case_id.as_str());
        }
        rows.push(i);
    }
    order
        .into_iter()
        .map(|id| BatchWarning::DuplicateCaseId {
            case_id: id.to_string(),
            rows: seen[id].clone(),
        })
        .collect()
}
