use chrono::{DateTime, Duration, TimeZone, Utc};
use shopdesk_core::{
    config::EngineConfig,
    model::{Customer, CustomerRfm},
    rfm,
    store::AnalyticsStore,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap()
}

fn customer(id: &str, orders: i64, days_since_last: i64, spent: f64) -> Customer {
    let now = anchor();
    Customer {
        customer_id:         id.to_string(),
        first_name:          "Test".to_string(),
        last_name:           id.to_string(),
        email:               None,
        date_created:        Some(now - Duration::days(400)),
        first_order_date:    Some(now - Duration::days(390)),
        last_order_date:     if orders > 0 {
            Some(now - Duration::days(days_since_last))
        } else {
            None
        },
        total_spent:         spent,
        order_count:         orders,
        average_order_value: if orders > 0 { spent / orders as f64 } else { 0.0 },
        customer_segment:    None,
        acquisition_source:  None,
        notes:               String::new(),
    }
}

fn score_counts(rows: &[CustomerRfm], pick: fn(&CustomerRfm) -> u8) -> [usize; 5] {
    let mut counts = [0usize; 5];
    for row in rows {
        counts[pick(row) as usize - 1] += 1;
    }
    counts
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// 23 eligible customers partition into quintiles of ceil(23/5) = 5 per
/// metric: sizes [5, 5, 5, 5, 3] from score 5 down to score 1.
#[test]
fn quintiles_partition_into_ceil_n_over_5_buckets() {
    let customers: Vec<Customer> = (0..23i64)
        .map(|i| {
            customer(
                &format!("c-{i:02}"),
                i + 1,                    // distinct frequency ranking
                (i + 1) * 3,              // distinct recency ranking
                100.0 * (i + 1) as f64,   // distinct monetary ranking
            )
        })
        .collect();

    let rows = rfm::score_customers(&customers, anchor());
    assert_eq!(rows.len(), 23);

    for pick in [
        (|r: &CustomerRfm| r.recency_score) as fn(&CustomerRfm) -> u8,
        |r| r.frequency_score,
        |r| r.monetary_score,
    ] {
        let counts = score_counts(&rows, pick);
        assert_eq!(counts, [3, 5, 5, 5, 5], "bucket sizes from score 1 to 5");
    }

    for row in &rows {
        assert!((1..=5).contains(&row.recency_score));
        assert!((1..=5).contains(&row.frequency_score));
        assert!((1..=5).contains(&row.monetary_score));
    }
}

/// The most recent / most frequent / highest-spending customer scores 5
/// on the corresponding metric; the worst scores 1.
#[test]
fn best_rank_scores_five_worst_scores_one() {
    let customers: Vec<Customer> = (0..10i64)
        .map(|i| {
            customer(
                &format!("c-{i:02}"),
                10 - i,
                (i + 1) * 10,
                1000.0 - 50.0 * i as f64,
            )
        })
        .collect();

    let rows = rfm::score_customers(&customers, anchor());
    let best = rows.iter().find(|r| r.customer_id == "c-00").unwrap();
    let worst = rows.iter().find(|r| r.customer_id == "c-09").unwrap();

    assert_eq!(best.recency_score, 5);
    assert_eq!(best.frequency_score, 5);
    assert_eq!(best.monetary_score, 5);
    assert_eq!(worst.recency_score, 1);
    assert_eq!(worst.frequency_score, 1);
    assert_eq!(worst.monetary_score, 1);
}

/// rfm_score concatenates as recency*100 + frequency*10 + monetary, and
/// every row of one run shares the same calculation_date.
#[test]
fn rfm_score_is_weighted_concatenation() {
    let customers: Vec<Customer> = (0..7i64)
        .map(|i| customer(&format!("c-{i}"), i + 1, (i + 1) * 20, 50.0 * (i + 1) as f64))
        .collect();

    let rows = rfm::score_customers(&customers, anchor());
    for row in &rows {
        assert_eq!(
            row.rfm_score,
            row.recency_score as i64 * 100
                + row.frequency_score as i64 * 10
                + row.monetary_score as i64,
        );
        assert_eq!(row.calculation_date, anchor());
    }
}

/// Customers with zero orders or no last_order_date are skipped entirely:
/// no snapshot row is written for them.
#[test]
fn ineligible_customers_get_no_rfm_row() {
    let mut customers = vec![
        customer("eligible-1", 3, 10, 300.0),
        customer("eligible-2", 5, 40, 800.0),
        customer("zero-orders", 0, 0, 0.0),
    ];
    // Orders on record but the last-order date went missing.
    let mut dateless = customer("dateless", 4, 5, 400.0);
    dateless.last_order_date = None;
    customers.push(dateless);

    let rows = rfm::score_customers(&customers, anchor());
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.customer_id.starts_with("eligible")));
}

/// Snapshot persistence is append-only: a second run adds a second
/// calculation_date group and the latest-snapshot read returns only it.
#[test]
fn snapshot_log_is_append_only_latest_wins() {
    let mut store = AnalyticsStore::in_memory().unwrap();
    store.migrate().unwrap();
    let config = EngineConfig::default();

    let customers: Vec<Customer> = (0..6i64)
        .map(|i| customer(&format!("c-{i}"), i + 1, (i + 1) * 15, 100.0 * (i + 1) as f64))
        .collect();

    let first_run = rfm::score_customers(&customers, anchor());
    assert_eq!(rfm::persist_snapshot(&mut store, &first_run, &config), 6);

    let later = anchor() + Duration::hours(2);
    let second_run = rfm::score_customers(&customers, later);
    assert_eq!(rfm::persist_snapshot(&mut store, &second_run, &config), 6);

    assert_eq!(store.rfm_row_count().unwrap(), 12);
    assert_eq!(store.rfm_run_count().unwrap(), 2);

    let latest = store.latest_rfm_snapshot().unwrap();
    assert_eq!(latest.len(), 6);
    assert!(latest.iter().all(|r| r.calculation_date == later));
}

/// A batch whose insert fails is logged and skipped; the batches after
/// it still insert, and the snapshot read returns only the good rows.
#[test]
fn failed_batch_does_not_drop_later_batches() {
    let mut store = AnalyticsStore::in_memory().unwrap();
    store.migrate().unwrap();
    let config = EngineConfig {
        rfm_batch_size: 1,
        ..EngineConfig::default()
    };

    let mut rows = rfm::score_customers(
        &[
            customer("c-0", 1, 10, 100.0),
            customer("c-1", 2, 20, 200.0),
            customer("c-2", 3, 30, 300.0),
        ],
        anchor(),
    );
    // Corrupt the middle row so its single-row batch violates the
    // score CHECK constraint on insert.
    rows[1].recency_score = 0;

    assert_eq!(rfm::persist_snapshot(&mut store, &rows, &config), 2);
    assert_eq!(store.rfm_row_count().unwrap(), 2);

    let latest = store.latest_rfm_snapshot().unwrap();
    assert_eq!(latest.len(), 2);
    assert!(latest.iter().all(|r| r.customer_id != rows[1].customer_id));
}

/// Batches insert in rfm_batch_size chunks; a tiny batch size still
/// persists every row.
#[test]
fn chunked_persistence_covers_all_rows() {
    let mut store = AnalyticsStore::in_memory().unwrap();
    store.migrate().unwrap();
    let config = EngineConfig {
        rfm_batch_size: 2,
        ..EngineConfig::default()
    };

    let customers: Vec<Customer> = (0..9i64)
        .map(|i| customer(&format!("c-{i}"), i + 1, (i + 1) * 11, 75.0 * (i + 1) as f64))
        .collect();

    let rows = rfm::score_customers(&customers, anchor());
    assert_eq!(rfm::persist_snapshot(&mut store, &rows, &config), 9);
    assert_eq!(store.rfm_row_count().unwrap(), 9);
}
