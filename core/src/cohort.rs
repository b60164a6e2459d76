//! Cohort analyzer — acquisition-month retention.
//!
//! Customers are grouped by the calendar month of their first order.
//! Month 0 is 100% retention by construction (the acquisition itself),
//! later offsets count distinct cohort members ordering in that calendar
//! month. Only months that have already started are emitted.

use crate::{
    config::EngineConfig,
    model::{Customer, Order},
};
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortMonth {
    pub month_offset:     i64,
    pub retention_rate:   f64,
    pub active_customers: i64,
    pub retained_value:   f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortData {
    /// Acquisition month, `YYYY-MM`.
    pub cohort_month:           String,
    pub cohort_size:            i64,
    pub total_value:            f64,
    pub avg_value_per_customer: f64,
    pub retention:              Vec<CohortMonth>,
}

pub fn analyze(
    customers: &[Customer],
    orders: &[Order],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Vec<CohortData> {
    // (year, month) BTreeMap keys keep cohorts chronological for free.
    let mut cohorts: BTreeMap<(i32, u32), Vec<&Customer>> = BTreeMap::new();
    for customer in customers {
        if let Some(first) = customer.first_order_date {
            cohorts.entry(month_of(first)).or_default().push(customer);
        }
    }
    if cohorts.is_empty() {
        return Vec::new();
    }

    // Most recent N cohorts, still chronologically ordered.
    let keys: Vec<(i32, u32)> = cohorts.keys().copied().collect();
    let start = keys.len().saturating_sub(config.cohort_limit);

    keys[start..]
        .iter()
        .map(|key| build_cohort(*key, &cohorts[key], orders, config, now))
        .collect()
}

fn build_cohort(
    cohort_key: (i32, u32),
    members: &[&Customer],
    orders: &[Order],
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> CohortData {
    let member_ids: HashSet<&str> = members.iter().map(|c| c.customer_id.as_str()).collect();
    let cohort_size = members.len() as i64;

    // Member orders bucketed by calendar month: distinct customers + value.
    let mut by_month: HashMap<(i32, u32), (HashSet<&str>, f64)> = HashMap::new();
    for order in orders {
        let (Some(customer_id), Some(date)) = (order.customer_id.as_deref(), order.date_created)
        else {
            continue;
        };
        if !member_ids.contains(customer_id) {
            continue;
        }
        let slot = by_month.entry(month_of(date)).or_default();
        slot.0.insert(customer_id);
        slot.1 += order.total;
    }

    let current_month = month_of(now);
    let mut retention = Vec::new();

    for offset in 0..=config.cohort_horizon_months {
        let target = add_months(cohort_key, offset);
        if target > current_month {
            break;
        }

        let (active, value) = match by_month.get(&target) {
            Some((who, value)) => (who.len() as i64, *value),
            None => (0, 0.0),
        };

        if offset == 0 {
            // Acquisition month: every member is active by construction.
            retention.push(CohortMonth {
                month_offset:     0,
                retention_rate:   100.0,
                active_customers: cohort_size,
                retained_value:   value,
            });
            continue;
        }

        let rate = if cohort_size > 0 {
            active as f64 / cohort_size as f64 * 100.0
        } else {
            0.0
        };
        retention.push(CohortMonth {
            month_offset:     offset,
            retention_rate:   rate,
            active_customers: active,
            retained_value:   value,
        });
    }

    let total_value: f64 = members.iter().map(|c| c.total_spent).sum();
    let avg_value_per_customer = if cohort_size > 0 {
        total_value / cohort_size as f64
    } else {
        0.0
    };

    CohortData {
        cohort_month: format!("{:04}-{:02}", cohort_key.0, cohort_key.1),
        cohort_size,
        total_value,
        avg_value_per_customer,
        retention,
    }
}

fn month_of(date: DateTime<Utc>) -> (i32, u32) {
    (date.year(), date.month())
}

fn add_months((year, month): (i32, u32), offset: i64) -> (i32, u32) {
    let zero_based = year as i64 * 12 + (month as i64 - 1) + offset;
    ((zero_based.div_euclid(12)) as i32, (zero_based.rem_euclid(12) + 1) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_arithmetic_wraps_years() {
        assert_eq!(add_months((2024, 11), 3), (2025, 2));
        assert_eq!(add_months((2024, 1), 0), (2024, 1));
        assert_eq!(add_months((2024, 12), 1), (2025, 1));
    }
}
