//! Purchase-frequency analyzer — inter-purchase interval statistics.
//!
//! Consecutive day gaps per customer feed a seven-bucket histogram,
//! overall mean/median, per-segment averages, and a short list of
//! recommended re-engagement day offsets. Gaps outside [1, 365] days are
//! data errors and are dropped before any aggregation.

use crate::{
    config::EngineConfig,
    model::{Customer, LifecycleSegment, Order},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const HISTOGRAM_RANGES: &[(i64, i64)] = &[
    (0, 7),
    (8, 14),
    (15, 30),
    (31, 60),
    (61, 90),
    (91, 180),
    (181, 365),
];

/// Fallback recommendations when no customer has two dated orders.
const DEFAULT_CAMPAIGN_DAYS: [i64; 3] = [7, 14, 30];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrequencyBucket {
    /// Human label, e.g. `"15-30"`.
    pub range:      String,
    pub min_days:   i64,
    pub max_days:   i64,
    pub count:      i64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentFrequency {
    pub segment:                 LifecycleSegment,
    pub avg_days_between_orders: f64,
    pub customer_count:          i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseFrequencyData {
    pub histogram:                 Vec<FrequencyBucket>,
    pub mean_days:                 f64,
    pub median_days:               f64,
    pub per_segment:               Vec<SegmentFrequency>,
    pub recommended_campaign_days: Vec<i64>,
}

pub fn analyze(
    customers: &[Customer],
    orders: &[Order],
    config: &EngineConfig,
) -> PurchaseFrequencyData {
    // Chronological order dates per attributed customer.
    let mut dates_by_customer: HashMap<&str, Vec<chrono::DateTime<chrono::Utc>>> = HashMap::new();
    for order in orders {
        if let (Some(customer_id), Some(date)) = (order.customer_id.as_deref(), order.date_created)
        {
            dates_by_customer.entry(customer_id).or_default().push(date);
        }
    }

    let mut all_gaps: Vec<i64> = Vec::new();
    let mut avg_by_customer: HashMap<&str, f64> = HashMap::new();

    for (customer_id, dates) in dates_by_customer.iter_mut() {
        dates.sort();
        let gaps: Vec<i64> = dates
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .filter(|gap| (config.gap_min_days..=config.gap_max_days).contains(gap))
            .collect();
        if gaps.is_empty() {
            continue;
        }
        let avg = gaps.iter().sum::<i64>() as f64 / gaps.len() as f64;
        avg_by_customer.insert(*customer_id, avg);
        all_gaps.extend(gaps);
    }

    if all_gaps.is_empty() {
        return empty_default();
    }

    all_gaps.sort_unstable();
    let mean = all_gaps.iter().sum::<i64>() as f64 / all_gaps.len() as f64;
    let median = all_gaps[all_gaps.len() / 2] as f64;

    let histogram = build_histogram(&all_gaps);
    let per_segment = segment_averages(customers, &avg_by_customer);
    let recommended =
        recommend_campaign_days(mean, median, &histogram, &per_segment, config);

    PurchaseFrequencyData {
        histogram,
        mean_days: mean,
        median_days: median,
        per_segment,
        recommended_campaign_days: recommended,
    }
}

fn build_histogram(gaps: &[i64]) -> Vec<FrequencyBucket> {
    let total = gaps.len() as i64;
    HISTOGRAM_RANGES
        .iter()
        .map(|&(min_days, max_days)| {
            let count = gaps
                .iter()
                .filter(|g| (min_days..=max_days).contains(*g))
                .count() as i64;
            FrequencyBucket {
                range:      format!("{min_days}-{max_days}"),
                min_days,
                max_days,
                count,
                percentage: count as f64 / total as f64 * 100.0,
            }
        })
        .collect()
}

/// Average of the per-customer averages within each segment, ascending
/// by interval. Segments with no measurable customer are omitted.
fn segment_averages(
    customers: &[Customer],
    avg_by_customer: &HashMap<&str, f64>,
) -> Vec<SegmentFrequency> {
    let mut sums: HashMap<LifecycleSegment, (f64, i64)> = HashMap::new();
    for customer in customers {
        let (Some(segment), Some(avg)) = (
            customer.customer_segment,
            avg_by_customer.get(customer.customer_id.as_str()),
        ) else {
            continue;
        };
        let slot = sums.entry(segment).or_default();
        slot.0 += avg;
        slot.1 += 1;
    }

    let mut result: Vec<SegmentFrequency> = sums
        .into_iter()
        .map(|(segment, (sum, count))| SegmentFrequency {
            segment,
            avg_days_between_orders: sum / count as f64,
            customer_count: count,
        })
        .collect();
    result.sort_by(|a, b| a.avg_days_between_orders.total_cmp(&b.avg_days_between_orders));
    result
}

/// Candidate days: the median, the mean when it diverges from the median
/// by more than 5 days, the midpoint of the busiest histogram bucket, and
/// each segment's rounded average — deduplicated, ascending, capped.
fn recommend_campaign_days(
    mean: f64,
    median: f64,
    histogram: &[FrequencyBucket],
    per_segment: &[SegmentFrequency],
    config: &EngineConfig,
) -> Vec<i64> {
    let mut days: Vec<i64> = vec![median.round() as i64];
    if (mean - median).abs() > 5.0 {
        days.push(mean.round() as i64);
    }
    if let Some(busiest) = histogram.iter().max_by_key(|b| b.count) {
        days.push((busiest.min_days + busiest.max_days) / 2);
    }
    for seg in per_segment {
        days.push(seg.avg_days_between_orders.round() as i64);
    }

    days.sort_unstable();
    days.dedup();
    days.truncate(config.recommended_day_limit);
    days
}

fn empty_default() -> PurchaseFrequencyData {
    let histogram = HISTOGRAM_RANGES[..3]
        .iter()
        .map(|&(min_days, max_days)| FrequencyBucket {
            range:      format!("{min_days}-{max_days}"),
            min_days,
            max_days,
            count:      0,
            percentage: 0.0,
        })
        .collect();

    PurchaseFrequencyData {
        histogram,
        mean_days: 0.0,
        median_days: 0.0,
        per_segment: Vec::new(),
        recommended_campaign_days: DEFAULT_CAMPAIGN_DAYS.to_vec(),
    }
}
