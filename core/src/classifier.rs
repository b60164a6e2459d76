//! Segment classifier — maps customers onto lifecycle segments.
//!
//! Two-tier resolution per customer:
//!   1. Customers present in the latest RFM snapshot: lookup table from
//!      the RFM label, then five ordered override rules (first match wins).
//!   2. Customers without an RFM row: raw order-count / recency heuristics.
//!
//! Side effects: `customer_segment` (and occasionally `notes`) are written
//! back per customer. One failed update is logged and never aborts the
//! remaining classifications.

use crate::{
    config::EngineConfig,
    error::EngineResult,
    model::{Customer, CustomerRfm, LifecycleSegment},
    store::AnalyticsStore,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Marker appended to `notes` for freshly created customers with no
/// orders. Appended at most once across repeated runs.
pub const NO_ORDERS_MARKER: &str = "No orders yet";

#[derive(Debug, Default, Clone)]
pub struct ClassifierReport {
    pub classified: usize,
    pub persisted:  usize,
    pub failed:     usize,
}

// ── Override rules (tier 1) ──────────────────────────────────────────────────

/// Everything an override predicate may consult.
struct OverrideCtx {
    total_spent:          f64,
    order_count:          i64,
    average_order_value:  f64,
    days_since_last:      i64,
    vip_spend_threshold:  Option<f64>,
    vip_min_order_count:  i64,
    high_value_aov:       f64,
    active_window:        i64,
    at_risk_window:       i64,
    occasional_window:    i64,
}

type OverrideRule = (fn(&OverrideCtx) -> bool, LifecycleSegment);

/// Ordered, first match wins: a customer matching both the VIP and the
/// high-value condition resolves to VIP.
const SEGMENT_OVERRIDES: &[OverrideRule] = &[
    (
        |ctx| {
            ctx.vip_spend_threshold.is_some_and(|t| ctx.total_spent >= t)
                && ctx.order_count >= ctx.vip_min_order_count
        },
        LifecycleSegment::Vip,
    ),
    (
        |ctx| ctx.average_order_value > ctx.high_value_aov,
        LifecycleSegment::HighValue,
    ),
    (
        |ctx| ctx.order_count == 1 && ctx.days_since_last > ctx.active_window,
        LifecycleSegment::OneTime,
    ),
    (
        |ctx| {
            ctx.order_count > 1
                && ctx.order_count < 4
                && ctx.days_since_last > ctx.at_risk_window
                && ctx.days_since_last <= ctx.occasional_window
        },
        LifecycleSegment::Occasional,
    ),
    (
        |ctx| ctx.days_since_last > ctx.occasional_window,
        LifecycleSegment::Dormant,
    ),
];

/// Base lifecycle segment for an RFM label, before overrides.
fn lifecycle_for_rfm_label(label: &str) -> LifecycleSegment {
    match label {
        "Champions"           => LifecycleSegment::Vip,
        "Loyal Customers"     => LifecycleSegment::Loyal,
        "Potential Loyalists" => LifecycleSegment::Active,
        "New Customers"       => LifecycleSegment::New,
        "Promising"           => LifecycleSegment::Active,
        "Needs Attention"     => LifecycleSegment::AtRisk,
        "About To Sleep"      => LifecycleSegment::AtRisk,
        "At Risk"             => LifecycleSegment::AtRisk,
        "Cant Lose Them"      => LifecycleSegment::AtRisk,
        "Hibernating"         => LifecycleSegment::Dormant,
        other => {
            log::warn!("unknown RFM segment label {other:?}, treating as active");
            LifecycleSegment::Active
        }
    }
}

// ── Resolution ───────────────────────────────────────────────────────────────

/// Resolve one customer's lifecycle segment. The second return value is
/// true when the "No orders yet" marker should be present in notes.
pub fn resolve_segment(
    customer: &Customer,
    rfm: Option<&CustomerRfm>,
    vip_spend_threshold: Option<f64>,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> (LifecycleSegment, bool) {
    match rfm {
        Some(row) => (
            resolve_with_rfm(customer, row, vip_spend_threshold, config, now),
            false,
        ),
        None => resolve_without_rfm(customer, config, now),
    }
}

fn resolve_with_rfm(
    customer: &Customer,
    rfm: &CustomerRfm,
    vip_spend_threshold: Option<f64>,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> LifecycleSegment {
    let ctx = OverrideCtx {
        total_spent:         customer.total_spent,
        order_count:         customer.order_count,
        average_order_value: customer.average_order_value,
        // Scored customers always had a last order; 0 disables the
        // recency overrides if the date has since gone missing.
        days_since_last:     customer.days_since_last_order(now).unwrap_or(0),
        vip_spend_threshold,
        vip_min_order_count: config.vip_min_order_count,
        high_value_aov:      config.high_value_aov_threshold,
        active_window:       config.active_window_days,
        at_risk_window:      config.at_risk_window_days,
        occasional_window:   config.occasional_window_days,
    };

    for (predicate, segment) in SEGMENT_OVERRIDES {
        if predicate(&ctx) {
            return *segment;
        }
    }
    lifecycle_for_rfm_label(&rfm.rfm_segment)
}

fn resolve_without_rfm(
    customer: &Customer,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> (LifecycleSegment, bool) {
    if customer.order_count == 0 {
        return zero_order_segment(customer, config, now);
    }

    let days = customer.days_since_last_order(now).unwrap_or(i64::MAX);

    if customer.order_count == 1 {
        return if days <= config.active_window_days {
            (LifecycleSegment::Active, false)
        } else {
            (LifecycleSegment::OneTime, false)
        };
    }
    if customer.average_order_value > config.high_value_aov_threshold {
        return (LifecycleSegment::HighValue, false);
    }
    if customer.order_count >= 4 && days <= config.active_window_days {
        return (LifecycleSegment::Loyal, false);
    }

    let segment = if days <= config.active_window_days {
        LifecycleSegment::Active
    } else if days <= config.at_risk_window_days {
        LifecycleSegment::AtRisk
    } else if days <= config.occasional_window_days {
        LifecycleSegment::Occasional
    } else {
        LifecycleSegment::Dormant
    };
    (segment, false)
}

/// Creation-date rule for customers with zero orders. Shared between the
/// main pass and the standalone correction pass.
fn zero_order_segment(
    customer: &Customer,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> (LifecycleSegment, bool) {
    match customer.days_since_created(now) {
        // No creation date on record: nothing proves they are new.
        None => (LifecycleSegment::Lost, false),
        Some(days) if days > config.zero_order_lost_after_days => (LifecycleSegment::Lost, false),
        Some(_) => (LifecycleSegment::New, true),
    }
}

/// The VIP override threshold: the top decile of scored customers'
/// total spend (at-or-above qualifies). None when nobody was scored.
pub fn vip_spend_threshold(customers: &[Customer], snapshot: &[CustomerRfm]) -> Option<f64> {
    let scored: std::collections::HashSet<&str> =
        snapshot.iter().map(|r| r.customer_id.as_str()).collect();

    let mut spends: Vec<f64> = customers
        .iter()
        .filter(|c| scored.contains(c.customer_id.as_str()))
        .map(|c| c.total_spent)
        .collect();
    if spends.is_empty() {
        return None;
    }
    spends.sort_by(|a, b| b.total_cmp(a));

    let index = spends.len().div_ceil(10) - 1;
    Some(spends[index])
}

// ── Batch classification ─────────────────────────────────────────────────────

/// Classify every customer and persist each verdict independently. The
/// in-memory records are updated too, so downstream analyzers see the
/// fresh segments without a reload.
pub fn classify_all(
    store: &AnalyticsStore,
    customers: &mut [Customer],
    snapshot: &[CustomerRfm],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> ClassifierReport {
    let by_customer: HashMap<&str, &CustomerRfm> = snapshot
        .iter()
        .map(|r| (r.customer_id.as_str(), r))
        .collect();
    let vip_threshold = vip_spend_threshold(customers, snapshot);

    let mut report = ClassifierReport::default();

    for customer in customers.iter_mut() {
        let rfm = by_customer.get(customer.customer_id.as_str()).copied();
        let (segment, wants_marker) =
            resolve_segment(customer, rfm, vip_threshold, config, now);

        customer.customer_segment = Some(segment);
        if wants_marker && !customer.notes.contains(NO_ORDERS_MARKER) {
            if customer.notes.is_empty() {
                customer.notes = NO_ORDERS_MARKER.to_string();
            } else {
                customer.notes.push_str("; ");
                customer.notes.push_str(NO_ORDERS_MARKER);
            }
        }
        report.classified += 1;

        match store.update_customer_segment(&customer.customer_id, segment, &customer.notes) {
            Ok(()) => report.persisted += 1,
            Err(err) => {
                report.failed += 1;
                log::error!(
                    "segment update failed for customer {} ({}): {err}",
                    customer.customer_id,
                    segment.as_str(),
                );
            }
        }
    }

    log::info!(
        "classified {} customers ({} persisted, {} failed)",
        report.classified,
        report.persisted,
        report.failed,
    );
    report
}

/// Standalone correction pass: re-derive the segment of every customer
/// currently showing zero orders and write back only actual changes.
/// Running it twice in a row is a no-op.
pub fn correct_zero_order_segments(
    store: &AnalyticsStore,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> EngineResult<usize> {
    let customers = store.all_customers()?;
    let mut corrected = 0;

    for customer in customers.iter().filter(|c| c.order_count == 0) {
        let (segment, _) = zero_order_segment(customer, config, now);
        if customer.customer_segment == Some(segment) {
            continue;
        }
        match store.update_customer_segment(&customer.customer_id, segment, &customer.notes) {
            Ok(()) => corrected += 1,
            Err(err) => {
                log::error!(
                    "zero-order correction failed for customer {}: {err}",
                    customer.customer_id,
                );
            }
        }
    }

    if corrected > 0 {
        log::info!("zero-order correction updated {corrected} customers");
    }
    Ok(corrected)
}
