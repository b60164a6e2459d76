//! The analytics engine — one batch pass over a loaded dataset.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Load customers, orders, products (only hard-failure point)
//!   2. RFM scorer — write one snapshot group
//!   3. Segment classifier — reads the latest snapshot, writes segments
//!   4. Cohort / frequency / affinity / timing analyzers (pure)
//!   5. Assemble one CustomerAnalyticsData aggregate
//!
//! RULES:
//!   - The classifier always reads the snapshot back through
//!     max(calculation_date); overlapping runs degrade to
//!     last-writer-wins instead of corrupting state.
//!   - No in-memory state survives between runs; every run reloads.

use crate::{
    affinity::{self, FirstWordCategorizer, ProductAffinityData},
    classifier,
    cohort::{self, CohortData},
    config::EngineConfig,
    error::EngineResult,
    frequency::{self, PurchaseFrequencyData},
    loader,
    model::{Customer, CustomerRfm, LifecycleSegment},
    rfm,
    store::AnalyticsStore,
    timing::{self, OrderTimingData},
    types::RunId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Aggregate output ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSlice {
    pub segment:    LifecycleSegment,
    pub label:      String,
    pub color:      String,
    pub count:      i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfmScoreCount {
    pub score: u8,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RfmSegmentCount {
    pub segment: String,
    pub count:   i64,
}

/// Real per-score counts from the latest snapshot — recomputed, never
/// faked with filler values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RfmDistribution {
    pub recency:   Vec<RfmScoreCount>,
    pub frequency: Vec<RfmScoreCount>,
    pub monetary:  Vec<RfmScoreCount>,
    pub segments:  Vec<RfmSegmentCount>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopCustomer {
    pub customer_id: String,
    pub name:        String,
    pub total_spent: f64,
    pub order_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSlice {
    pub source:     String,
    pub count:      i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerAnalyticsData {
    pub run_id:       RunId,
    pub generated_at: DateTime<Utc>,

    pub total_customers:   i64,
    pub new_customers:     i64,
    pub active_customers:  i64,
    pub at_risk_customers: i64,
    pub lost_customers:    i64,

    pub segment_distribution: Vec<SegmentSlice>,
    pub rfm_distribution:     RfmDistribution,

    pub average_order_value: f64,
    /// Simple estimate: aov × avg orders per customer × 12.
    pub estimated_clv:       f64,

    pub top_customers_by_spend:     Vec<TopCustomer>,
    pub top_customers_by_frequency: Vec<TopCustomer>,
    pub acquisition_sources:        Vec<SourceSlice>,

    pub cohorts:            Vec<CohortData>,
    pub purchase_frequency: PurchaseFrequencyData,
    pub product_affinity:   ProductAffinityData,
    pub order_timing:       OrderTimingData,
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct AnalyticsEngine {
    config: EngineConfig,
    store:  AnalyticsStore,
}

impl AnalyticsEngine {
    pub fn new(store: AnalyticsStore, config: EngineConfig) -> Self {
        Self { config, store }
    }

    pub fn store(&self) -> &AnalyticsStore {
        &self.store
    }

    /// One full analytics pass anchored at the current wall clock.
    pub fn run(&mut self) -> EngineResult<CustomerAnalyticsData> {
        self.run_at(Utc::now())
    }

    /// One full analytics pass anchored at `now` (injectable for tests).
    pub fn run_at(&mut self, now: DateTime<Utc>) -> EngineResult<CustomerAnalyticsData> {
        let run_id: RunId = uuid::Uuid::new_v4().to_string();
        log::info!("run {run_id}: analytics pass starting");

        // 1. Load. The only step allowed to abort the run.
        let dataset = loader::load(&self.store)?;
        let mut customers = dataset.customers;

        // 2. Score and persist one snapshot group.
        let scored = rfm::score_customers(&customers, now);
        let inserted = rfm::persist_snapshot(&mut self.store, &scored, &self.config);
        log::info!(
            "run {run_id}: rfm scored {} customers, persisted {inserted} rows",
            scored.len(),
        );

        // 3. Classify against the authoritative snapshot read-back.
        let snapshot = self.store.latest_rfm_snapshot()?;
        classifier::classify_all(&self.store, &mut customers, &snapshot, &self.config, now);

        // 4. Analyzers. All pure; all tolerate empty inputs.
        let cohorts = cohort::analyze(&customers, &dataset.orders, &self.config, now);
        let purchase_frequency = frequency::analyze(&customers, &dataset.orders, &self.config);
        let product_affinity = affinity::analyze(
            &customers,
            &dataset.orders,
            &dataset.products,
            &self.config,
            &FirstWordCategorizer,
        );
        let order_timing = timing::analyze(&dataset.orders);

        // 5. Assemble.
        let data = assemble(
            run_id,
            now,
            &customers,
            &snapshot,
            &self.config,
            cohorts,
            purchase_frequency,
            product_affinity,
            order_timing,
        );
        log::info!(
            "run {}: analytics pass complete ({} customers)",
            data.run_id,
            data.total_customers,
        );
        Ok(data)
    }

    /// Standalone re-derivation of zero-order customers' segments.
    pub fn correct_zero_order_segments(&self) -> EngineResult<usize> {
        classifier::correct_zero_order_segments(&self.store, &self.config, Utc::now())
    }
}

// ── Assembly ─────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
fn assemble(
    run_id: RunId,
    now: DateTime<Utc>,
    customers: &[Customer],
    snapshot: &[CustomerRfm],
    config: &EngineConfig,
    cohorts: Vec<CohortData>,
    purchase_frequency: PurchaseFrequencyData,
    product_affinity: ProductAffinityData,
    order_timing: OrderTimingData,
) -> CustomerAnalyticsData {
    let total_customers = customers.len() as i64;

    let mut segment_counts: HashMap<LifecycleSegment, i64> = HashMap::new();
    for customer in customers {
        if let Some(segment) = customer.customer_segment {
            *segment_counts.entry(segment).or_insert(0) += 1;
        }
    }
    let count_of = |segment| segment_counts.get(&segment).copied().unwrap_or(0);

    let segment_distribution = LifecycleSegment::ALL
        .iter()
        .filter_map(|&segment| {
            let count = *segment_counts.get(&segment)?;
            Some(SegmentSlice {
                segment,
                label: segment.label().to_string(),
                color: segment.color().to_string(),
                count,
                percentage: count as f64 / total_customers.max(1) as f64 * 100.0,
            })
        })
        .collect();

    let total_orders: i64 = customers.iter().map(|c| c.order_count).sum();
    let total_spent: f64 = customers.iter().map(|c| c.total_spent).sum();
    let average_order_value = if total_orders > 0 {
        total_spent / total_orders as f64
    } else {
        0.0
    };
    let avg_order_frequency = if total_customers > 0 {
        total_orders as f64 / total_customers as f64
    } else {
        0.0
    };
    let estimated_clv = average_order_value * avg_order_frequency * 12.0;

    let mut by_spend: Vec<&Customer> = customers.iter().collect();
    by_spend.sort_by(|a, b| {
        b.total_spent
            .total_cmp(&a.total_spent)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    let top_customers_by_spend = by_spend
        .iter()
        .take(config.top_customer_limit)
        .map(|c| top_customer(c))
        .collect();

    let mut by_frequency: Vec<&Customer> = customers.iter().collect();
    by_frequency.sort_by(|a, b| {
        b.order_count
            .cmp(&a.order_count)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    let top_customers_by_frequency = by_frequency
        .iter()
        .take(config.top_customer_limit)
        .map(|c| top_customer(c))
        .collect();

    CustomerAnalyticsData {
        run_id,
        generated_at: now,
        total_customers,
        new_customers: count_of(LifecycleSegment::New),
        active_customers: count_of(LifecycleSegment::Active),
        at_risk_customers: count_of(LifecycleSegment::AtRisk),
        lost_customers: count_of(LifecycleSegment::Lost),
        segment_distribution,
        rfm_distribution: rfm_distribution(snapshot),
        average_order_value,
        estimated_clv,
        top_customers_by_spend,
        top_customers_by_frequency,
        acquisition_sources: acquisition_sources(customers),
        cohorts,
        purchase_frequency,
        product_affinity,
        order_timing,
    }
}

fn top_customer(c: &Customer) -> TopCustomer {
    let name = format!("{} {}", c.first_name, c.last_name);
    let name = name.trim().to_string();
    TopCustomer {
        customer_id: c.customer_id.clone(),
        name: if name.is_empty() {
            c.email.clone().unwrap_or_else(|| c.customer_id.clone())
        } else {
            name
        },
        total_spent: c.total_spent,
        order_count: c.order_count,
    }
}

fn rfm_distribution(snapshot: &[CustomerRfm]) -> RfmDistribution {
    let count_scores = |pick: fn(&CustomerRfm) -> u8| -> Vec<RfmScoreCount> {
        (1..=5u8)
            .map(|score| RfmScoreCount {
                score,
                count: snapshot.iter().filter(|r| pick(r) == score).count() as i64,
            })
            .collect()
    };

    let mut segment_counts: HashMap<&str, i64> = HashMap::new();
    for row in snapshot {
        *segment_counts.entry(row.rfm_segment.as_str()).or_insert(0) += 1;
    }
    let mut segments: Vec<RfmSegmentCount> = segment_counts
        .into_iter()
        .map(|(segment, count)| RfmSegmentCount {
            segment: segment.to_string(),
            count,
        })
        .collect();
    segments.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.segment.cmp(&b.segment)));

    RfmDistribution {
        recency:   count_scores(|r| r.recency_score),
        frequency: count_scores(|r| r.frequency_score),
        monetary:  count_scores(|r| r.monetary_score),
        segments,
    }
}

fn acquisition_sources(customers: &[Customer]) -> Vec<SourceSlice> {
    let total = customers.len() as i64;
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for customer in customers {
        let source = customer.acquisition_source.as_deref().unwrap_or("unknown");
        *counts.entry(source).or_insert(0) += 1;
    }

    let mut sources: Vec<SourceSlice> = counts
        .into_iter()
        .map(|(source, count)| SourceSlice {
            source:     source.to_string(),
            count,
            percentage: count as f64 / total.max(1) as f64 * 100.0,
        })
        .collect();
    sources.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.source.cmp(&b.source)));
    sources
}
