//! Engine configuration — every threshold the analyzers consult.
//!
//! Defaults match the production dashboard. A JSON file may override any
//! subset of fields (`analytics-runner --config engine.json`).

use crate::error::EngineResult;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// RFM snapshot rows inserted per transaction batch.
    pub rfm_batch_size: usize,

    // ── Classifier thresholds ──────────────────────────────
    /// Average order value above which a customer is `high-value`.
    pub high_value_aov_threshold: f64,
    /// Minimum order count for the top-decile-spend VIP override.
    pub vip_min_order_count: i64,
    /// Days since creation after which a zero-order customer is `lost`.
    pub zero_order_lost_after_days: i64,
    /// Recency ladder: `active` ≤ active, `at-risk` ≤ at_risk,
    /// `occasional` ≤ occasional, `dormant` beyond.
    pub active_window_days: i64,
    pub at_risk_window_days: i64,
    pub occasional_window_days: i64,

    // ── Purchase frequency ─────────────────────────────────
    /// Inter-purchase gaps outside [min, max] days are data errors.
    pub gap_min_days: i64,
    pub gap_max_days: i64,
    pub recommended_day_limit: usize,

    // ── Cohorts ────────────────────────────────────────────
    /// Most recent cohorts reported.
    pub cohort_limit: usize,
    /// Retention horizon in months after acquisition.
    pub cohort_horizon_months: i64,

    // ── Product affinity ───────────────────────────────────
    /// Pairs below this co-occurrence never reach the report.
    pub min_pair_cooccurrence: i64,
    pub top_pair_limit: usize,
    pub cross_sell_limit: usize,
    pub category_limit: usize,

    // ── Assembler ──────────────────────────────────────────
    pub top_customer_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rfm_batch_size: 100,
            high_value_aov_threshold: 500.0,
            vip_min_order_count: 3,
            zero_order_lost_after_days: 30,
            active_window_days: 30,
            at_risk_window_days: 90,
            occasional_window_days: 180,
            gap_min_days: 1,
            gap_max_days: 365,
            recommended_day_limit: 5,
            cohort_limit: 12,
            cohort_horizon_months: 12,
            min_pair_cooccurrence: 2,
            top_pair_limit: 10,
            cross_sell_limit: 5,
            category_limit: 5,
            top_customer_limit: 10,
        }
    }
}

impl EngineConfig {
    /// Load overrides from a JSON file; missing fields keep their defaults.
    pub fn load(path: &str) -> EngineResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config {path}: {e}"))?;
        Ok(serde_json::from_str(&text)?)
    }
}
