use serde::{Deserialize, Serialize};

/// Source column names expected in the transaction and alert tables.
///
/// The amount column is deliberately absent: it is always resolved by
/// scanning for a header containing "AMOUNT".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ColumnNames {
    pub account_id: String,
    pub transaction_id: String,
    pub step: String,
    pub counterparty: String,
    pub channel: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            account_id: "ACCOUNT_ID".into(),
            transaction_id: "TXN_ID".into(),
            step: "TXN_STEP".into(),
            counterparty: "COUNTER_PARTY_ACCOUNT_NUM".into(),
            channel: "TXN_SOURCE_TYPE_CODE".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Amounts strictly above this raise a High-value flag.
    pub high_value_threshold: f64,
    /// A (sender, counterparty) pair seen more than this many times in the
    /// batch raises a Frequent receiver flag on every row of the pair.
    pub frequent_pair_threshold: usize,
    pub institution_name: String,
    pub filed_by: String,
    pub columns: ColumnNames,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            // Just under the $10k currency transaction report line.
            high_value_threshold: 9000.0,
            frequent_pair_threshold: 3,
            institution_name: "Simulated Bank Corp".into(),
            filed_by: "AML Compliance Desk".into(),
            columns: ColumnNames::default(),
        }
    }
}

impl ReviewConfig {
    /// Load from a JSON file. Missing fields fall back to their defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: ReviewConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if !config.high_value_threshold.is_finite() || config.high_value_threshold < 0.0 {
            anyhow::bail!(
                "{path}: high_value_threshold must be a non-negative number, got {}",
                config.high_value_threshold
            );
        }
        log::debug!(
            "Loaded review config from {path} (threshold={}, pair_threshold={})",
            config.high_value_threshold,
            config.frequent_pair_threshold
        );
        Ok(config)
    }

    /// Default configuration with a different high-value threshold.
    pub fn with_threshold(high_value_threshold: f64) -> Self {
        Self {
            high_value_threshold,
            ..Self::default()
        }
    }
}
