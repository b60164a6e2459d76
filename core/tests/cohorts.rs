use chrono::{DateTime, TimeZone, Utc};
use shopdesk_core::{
    cohort,
    config::EngineConfig,
    model::{Customer, Order},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
}

fn member(id: &str, first_order: DateTime<Utc>, total_spent: f64) -> Customer {
    Customer {
        customer_id:         id.to_string(),
        first_name:          String::new(),
        last_name:           String::new(),
        email:               None,
        date_created:        Some(first_order),
        first_order_date:    Some(first_order),
        last_order_date:     Some(first_order),
        total_spent,
        order_count:         1,
        average_order_value: total_spent,
        customer_segment:    None,
        acquisition_source:  None,
        notes:               String::new(),
    }
}

fn order(id: &str, customer: &str, date: DateTime<Utc>, total: f64) -> Order {
    Order {
        order_id:     id.to_string(),
        customer_id:  Some(customer.to_string()),
        date_created: Some(date),
        total,
        line_items:   Vec::new(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Month 0 is 100% retention with every member counted active by
/// construction, even when no order actually falls in that month.
#[test]
fn month_zero_is_always_fully_retained() {
    let customers = vec![member("m1", at(2025, 3, 10), 300.0)];
    // No orders at all — month 0 must still read 100%.
    let cohorts = cohort::analyze(&customers, &[], &EngineConfig::default(), anchor());

    assert_eq!(cohorts.len(), 1);
    let month0 = &cohorts[0].retention[0];
    assert_eq!(month0.month_offset, 0);
    assert_eq!(month0.retention_rate, 100.0);
    assert_eq!(month0.active_customers, 1);
}

/// Later offsets count distinct cohort members with at least one order in
/// the target calendar month, and sum those orders' totals as value.
#[test]
fn retention_counts_distinct_members_per_month() {
    let customers = vec![
        member("m1", at(2025, 3, 10), 300.0),
        member("m2", at(2025, 3, 20), 100.0),
    ];
    let orders = vec![
        order("o1", "m1", at(2025, 3, 10), 100.0),
        order("o2", "m2", at(2025, 3, 20), 50.0),
        // April: only m1 comes back, twice — still one distinct member.
        order("o3", "m1", at(2025, 4, 5), 60.0),
        order("o4", "m1", at(2025, 4, 25), 40.0),
        // May: both return.
        order("o5", "m1", at(2025, 5, 2), 80.0),
        order("o6", "m2", at(2025, 5, 9), 20.0),
    ];

    let cohorts = cohort::analyze(&customers, &orders, &EngineConfig::default(), anchor());
    assert_eq!(cohorts.len(), 1);
    let cohort = &cohorts[0];
    assert_eq!(cohort.cohort_month, "2025-03");
    assert_eq!(cohort.cohort_size, 2);
    assert_eq!(cohort.total_value, 400.0);
    assert_eq!(cohort.avg_value_per_customer, 200.0);

    // Offsets 0..=3: June (offset 3) is the current month, July is not emitted.
    assert_eq!(cohort.retention.len(), 4);

    let april = &cohort.retention[1];
    assert_eq!(april.retention_rate, 50.0);
    assert_eq!(april.active_customers, 1);
    assert_eq!(april.retained_value, 100.0);

    let may = &cohort.retention[2];
    assert_eq!(may.retention_rate, 100.0);
    assert_eq!(may.active_customers, 2);

    let june = &cohort.retention[3];
    assert_eq!(june.retention_rate, 0.0);
    assert_eq!(june.active_customers, 0);
}

/// Customers without a first order date never form or join a cohort.
#[test]
fn customers_without_first_order_are_excluded() {
    let mut no_first = member("ghost", at(2025, 3, 1), 0.0);
    no_first.first_order_date = None;

    let customers = vec![no_first, member("m1", at(2025, 4, 1), 50.0)];
    let cohorts = cohort::analyze(&customers, &[], &EngineConfig::default(), anchor());

    assert_eq!(cohorts.len(), 1);
    assert_eq!(cohorts[0].cohort_month, "2025-04");
    assert_eq!(cohorts[0].cohort_size, 1);
}

/// Only the most recent 12 cohorts are returned, chronologically.
#[test]
fn cohort_list_caps_at_twelve_most_recent() {
    // 14 monthly cohorts: Jan 2024 .. Feb 2025.
    let customers: Vec<Customer> = (0..14u32)
        .map(|i| {
            let (year, month) = if i < 12 { (2024, i + 1) } else { (2025, i - 11) };
            member(&format!("m-{i:02}"), at(year, month, 5), 10.0)
        })
        .collect();

    let cohorts = cohort::analyze(&customers, &[], &EngineConfig::default(), anchor());
    assert_eq!(cohorts.len(), 12);
    assert_eq!(cohorts.first().unwrap().cohort_month, "2024-03");
    assert_eq!(cohorts.last().unwrap().cohort_month, "2025-02");

    for pair in cohorts.windows(2) {
        assert!(pair[0].cohort_month < pair[1].cohort_month);
    }
}

/// Unattributed and undated orders never count toward retention.
#[test]
fn stray_orders_are_ignored() {
    let customers = vec![member("m1", at(2025, 3, 10), 100.0)];
    let mut unattributed = order("o1", "m1", at(2025, 4, 5), 50.0);
    unattributed.customer_id = None;
    let mut undated = order("o2", "m1", at(2025, 4, 6), 50.0);
    undated.date_created = None;

    let cohorts = cohort::analyze(
        &customers,
        &[unattributed, undated],
        &EngineConfig::default(),
        anchor(),
    );
    let april = &cohorts[0].retention[1];
    assert_eq!(april.active_customers, 0);
    assert_eq!(april.retained_value, 0.0);
}
