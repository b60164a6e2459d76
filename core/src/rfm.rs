//! RFM scorer — quintile Recency/Frequency/Monetary scoring.
//!
//! This module:
//!   1. Ranks eligible customers three independent ways
//!   2. Partitions each ranking into 5 contiguous quintiles of ceil(N/5)
//!   3. Labels each customer via an ordered decision table
//!   4. Persists one append-only snapshot batch per run
//!
//! Eligibility: a non-null last_order_date AND order_count > 0. Everyone
//! else is skipped entirely — no snapshot row is written for them.

use crate::{
    config::EngineConfig,
    model::{Customer, CustomerRfm},
    store::AnalyticsStore,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

// ── Segment decision table ───────────────────────────────────────────────────

type RfmRule = (fn(u8, u8, u8) -> bool, &'static str);

/// Evaluated top to bottom, first match wins. Everything that matches no
/// rule is Hibernating.
const RFM_SEGMENT_RULES: &[RfmRule] = &[
    (|r, f, m| r >= 4 && f >= 4 && m >= 4, "Champions"),
    (|r, f, m| r >= 3 && f >= 3 && m >= 3, "Loyal Customers"),
    (|r, f, m| r <= 2 && f >= 4 && m >= 4, "Cant Lose Them"),
    (|r, f, _| r <= 2 && f >= 3, "At Risk"),
    (|r, f, m| r >= 4 && f >= 2 && m >= 2, "Potential Loyalists"),
    (|r, f, _| r >= 4 && f <= 1, "New Customers"),
    (|r, f, _| r >= 3 && f <= 1, "Promising"),
    (|r, f, m| r >= 3 && f >= 2 && m >= 2, "Needs Attention"),
    (|r, f, _| r >= 2 && f <= 2, "About To Sleep"),
];

pub const FALLBACK_SEGMENT: &str = "Hibernating";

pub fn segment_for_scores(recency: u8, frequency: u8, monetary: u8) -> &'static str {
    RFM_SEGMENT_RULES
        .iter()
        .find(|(predicate, _)| predicate(recency, frequency, monetary))
        .map(|(_, label)| *label)
        .unwrap_or(FALLBACK_SEGMENT)
}

// ── Scoring ──────────────────────────────────────────────────────────────────

/// Score every eligible customer. All returned rows share one
/// `calculation_date` so they form a single snapshot group.
pub fn score_customers(customers: &[Customer], now: DateTime<Utc>) -> Vec<CustomerRfm> {
    let eligible: Vec<&Customer> = customers
        .iter()
        .filter(|c| c.last_order_date.is_some() && c.order_count > 0)
        .collect();

    if eligible.is_empty() {
        return Vec::new();
    }

    // Three independent rankings, each best-first. Ties break on id so
    // repeated runs over the same data produce identical scores.
    let recency = quintile_scores(&eligible, |c| {
        (c.days_since_last_order(now).unwrap_or(i64::MAX), c.customer_id.clone())
    });
    let frequency = quintile_scores(&eligible, |c| (-c.order_count, c.customer_id.clone()));
    let monetary = quintile_scores(&eligible, |c| {
        // Descending spend under a total order (NaN-safe).
        (ordered_desc(c.total_spent), c.customer_id.clone())
    });

    eligible
        .iter()
        .map(|c| {
            let r = recency[c.customer_id.as_str()];
            let f = frequency[c.customer_id.as_str()];
            let m = monetary[c.customer_id.as_str()];
            CustomerRfm {
                customer_id:      c.customer_id.clone(),
                recency_score:    r,
                frequency_score:  f,
                monetary_score:   m,
                rfm_score:        r as i64 * 100 + f as i64 * 10 + m as i64,
                rfm_segment:      segment_for_scores(r, f, m).to_string(),
                calculation_date: now,
            }
        })
        .collect()
}

/// Rank by `key` ascending (best first) and map rank position to a 1–5
/// score: positions [0, ceil(N/5)) score 5, the last quintile scores 1.
fn quintile_scores<K: Ord>(
    eligible: &[&Customer],
    key: impl Fn(&Customer) -> K,
) -> HashMap<String, u8> {
    let mut ranked: Vec<&Customer> = eligible.to_vec();
    ranked.sort_by_key(|c| key(c));

    let quintile_size = ranked.len().div_ceil(5);
    ranked
        .iter()
        .enumerate()
        .map(|(position, c)| {
            let score = 5 - (position / quintile_size) as u8;
            (c.customer_id.clone(), score.max(1))
        })
        .collect()
}

/// Total-order sort key that ranks larger f64 values first.
fn ordered_desc(value: f64) -> std::cmp::Reverse<OrderedF64> {
    std::cmp::Reverse(OrderedF64(value))
}

#[derive(PartialEq)]
struct OrderedF64(f64);

impl Eq for OrderedF64 {}

impl PartialOrd for OrderedF64 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

// ── Persistence ──────────────────────────────────────────────────────────────

/// Insert the snapshot in `rfm_batch_size` chunks. A failed chunk is
/// logged with context and must not drop the remaining chunks.
/// Returns the number of rows actually inserted.
pub fn persist_snapshot(
    store: &mut AnalyticsStore,
    rows: &[CustomerRfm],
    config: &EngineConfig,
) -> usize {
    let mut inserted = 0;
    for (batch_index, chunk) in rows.chunks(config.rfm_batch_size.max(1)).enumerate() {
        match store.insert_rfm_batch(chunk) {
            Ok(()) => inserted += chunk.len(),
            Err(err) => {
                let sample = chunk
                    .first()
                    .map(|r| r.customer_id.as_str())
                    .unwrap_or("<empty>");
                log::error!(
                    "customer_rfm batch {batch_index} failed ({} rows, first customer {sample}): {err}",
                    chunk.len(),
                );
            }
        }
    }
    inserted
}
