//! Shared primitive types used across the review workflow.

/// Identifier of a review case: `step-transaction_id`, or the transaction id alone.
pub type CaseId = String;

/// An account identifier as it appears in the source batch.
pub type AccountId = String;

/// Identifies one review session (one loaded batch).
pub type SessionId = String;

/// Format an amount as US currency with thousands separators: `$12,345.60`.
pub fn format_currency(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}
