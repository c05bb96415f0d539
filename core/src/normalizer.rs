//! Transaction normalizer: validates the raw batch schema once and produces
//! typed rows. Nothing downstream re-checks column presence.

use crate::{
    config::ColumnNames,
    error::{ReviewError, ReviewResult},
    types::{AccountId, CaseId},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A batch as handed over by the tabular-input collaborator: a header row
/// and string cells.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    /// Parse a `{ "columns": [...], "rows": [[...], ...] }` table.
    pub fn from_json(json: &str) -> ReviewResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn read_json(path: impl AsRef<Path>) -> ReviewResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let table = Self::from_json(&content)?;
        log::debug!(
            "Read {} rows x {} columns from {}",
            table.rows.len(),
            table.columns.len(),
            path.as_ref().display()
        );
        Ok(table)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// First column whose uppercased name contains "AMOUNT".
    pub fn amount_column(&self) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.to_uppercase().contains("AMOUNT"))
    }

    fn require_column(&self, name: &str) -> ReviewResult<usize> {
        self.column_index(name)
            .ok_or_else(|| ReviewError::MissingColumn { column: name.to_string() })
    }

    fn check_width(&self) -> ReviewResult<()> {
        let expected = self.columns.len();
        for (row, cells) in self.rows.iter().enumerate() {
            if cells.len() != expected {
                return Err(ReviewError::RaggedRow { row, expected, actual: cells.len() });
            }
        }
        Ok(())
    }
}

/// One validated transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionRow {
    pub case_id: CaseId,
    pub account_id: AccountId,
    /// Empty when the batch carries no counterparty column.
    pub counterparty_account_id: AccountId,
    pub amount: f64,
    pub step: Option<String>,
    pub transaction_id: String,
    pub source_channel: Option<String>,
    pub has_prior_alert: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedTable {
    /// Name of the source column the amounts were read from.
    pub amount_column: String,
    pub rows: Vec<TransactionRow>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Collect the account ids named in an alert table.
pub fn alerted_accounts(alerts: &RawTable, columns: &ColumnNames) -> ReviewResult<HashSet<AccountId>> {
    alerts.check_width()?;
    let idx = alerts.require_column(&columns.account_id)?;
    Ok(alerts
        .rows
        .iter()
        .map(|cells| cells[idx].trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

/// Build the normalized table. Every input row is kept; flagging happens later.
///
/// Without an alert set every row's `has_prior_alert` is false.
pub fn normalize(
    raw: &RawTable,
    alerted: Option<&HashSet<AccountId>>,
    columns: &ColumnNames,
) -> ReviewResult<NormalizedTable> {
    let amount_idx = raw.amount_column().ok_or(ReviewError::MissingAmountColumn)?;
    let account_idx = raw.require_column(&columns.account_id)?;
    let txn_idx = raw.require_column(&columns.transaction_id)?;
    let step_idx = raw.column_index(&columns.step);
    let counterparty_idx = raw.column_index(&columns.counterparty);
    let channel_idx = raw.column_index(&columns.channel);
    raw.check_width()?;

    if counterparty_idx.is_none() {
        log::debug!(
            "No '{}' column; counterparty defaults to empty",
            columns.counterparty
        );
    }

    let mut rows = Vec::with_capacity(raw.rows.len());
    for (row_no, cells) in raw.rows.iter().enumerate() {
        let amount = parse_amount(row_no, &cells[amount_idx])?;
        let account_id = cells[account_idx].trim().to_string();
        let transaction_id = cells[txn_idx].trim().to_string();
        let step = step_idx
            .map(|i| cells[i].trim().to_string())
            .filter(|s| !s.is_empty());
        let counterparty_account_id = counterparty_idx
            .map(|i| cells[i].trim().to_string())
            .unwrap_or_default();
        let source_channel = channel_idx
            .map(|i| cells[i].trim().to_string())
            .filter(|s| !s.is_empty());
        let has_prior_alert = alerted.is_some_and(|set| set.contains(&account_id));

        rows.push(TransactionRow {
            case_id: case_id_for(step.as_deref(), &transaction_id),
            account_id,
            counterparty_account_id,
            amount,
            step,
            transaction_id,
            source_channel,
            has_prior_alert,
        });
    }

    Ok(NormalizedTable {
        amount_column: raw.columns[amount_idx].clone(),
        rows,
    })
}

/// `step-transaction_id` when a step is known, else the transaction id alone.
/// The choice is made per row: a blank cell in a present step column yields
/// the bare transaction id, so such rows can collide and surface as
/// duplicate-id warnings.
pub fn case_id_for(step: Option<&str>, transaction_id: &str) -> CaseId {
    match step {
        Some(step) => format!("{step}-{transaction_id}"),
        None => transaction_id.to_string(),
    }
}

fn parse_amount(row: usize, cell: &str) -> ReviewResult<f64> {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ReviewError::InvalidAmount { row, value: cell.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_column_match_is_case_insensitive() {
        let raw = RawTable::new(["TXN_ID", "ACCOUNT_ID", "base_amount_usd"]);
        assert_eq!(raw.amount_column(), Some(2));
    }

    #[test]
    fn first_amount_column_wins() {
        let raw = RawTable::new(["AMOUNT_ORIG", "TXN_ID", "AMOUNT_USD"]);
        assert_eq!(raw.amount_column(), Some(0));
    }

    #[test]
    fn non_numeric_amounts_are_rejected() {
        assert!(parse_amount(0, " 12.5 ").is_ok());
        assert!(parse_amount(0, "").is_err());
        assert!(parse_amount(0, "NaN").is_err());
        assert!(parse_amount(0, "$10").is_err());
    }

    #[test]
    fn case_id_uses_step_when_present() {
        assert_eq!(case_id_for(Some("3"), "T9"), "3-T9");
        assert_eq!(case_id_for(None, "T9"), "T9");
    }
}
