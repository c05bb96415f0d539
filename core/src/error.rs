use thiserror::Error;

use crate::types::CaseId;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Missing amount column: no column name contains \"AMOUNT\"")]
    MissingAmountColumn,

    #[error("Missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Row {row}: amount '{value}' is not a number")]
    InvalidAmount { row: usize, value: String },

    #[error("Row {row}: expected {expected} cells, got {actual}")]
    RaggedRow { row: usize, expected: usize, actual: usize },

    #[error("Case '{case_id}' not found in the current batch")]
    CaseNotFound { case_id: CaseId },

    #[error("Case '{case_id}' has not been escalated to Tier 2")]
    NotEscalated { case_id: CaseId },

    #[error("Cannot {action}: {reason}")]
    InvalidTransition { action: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReviewError {
    pub(crate) fn invalid(action: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTransition {
            action: action.to_string(),
            reason: reason.into(),
        }
    }

    /// Input-shape errors halt processing of the whole batch.
    /// Everything else is a recoverable workflow rejection.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MissingAmountColumn
                | Self::MissingColumn { .. }
                | Self::InvalidAmount { .. }
                | Self::RaggedRow { .. }
        )
    }
}

pub type ReviewResult<T> = Result<T, ReviewError>;
