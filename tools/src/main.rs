//! analytics-runner: headless analytics pass for the shopdesk dashboard.
//!
//! Usage:
//!   analytics-runner --db shop.db
//!   analytics-runner --db shop.db --seed-demo --json
//!   analytics-runner --db shop.db --fix-zero-orders
//!   analytics-runner --db shop.db --config engine.json

use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::json;
use shopdesk_core::{
    config::EngineConfig,
    engine::{AnalyticsEngine, CustomerAnalyticsData},
    model::{Customer, Product},
    store::AnalyticsStore,
};
use std::env;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let config_path = flag_value(&args, "--config");
    let seed_demo = args.iter().any(|a| a == "--seed-demo");
    let as_json = args.iter().any(|a| a == "--json");
    let fix_zero_orders = args.iter().any(|a| a == "--fix-zero-orders");

    let config = match config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let store = AnalyticsStore::open(db)?;
    store.migrate()?;

    if seed_demo {
        seed_demo_data(&store)?;
        log::info!("demo dataset seeded into {db}");
    }

    let mut engine = AnalyticsEngine::new(store, config);

    if fix_zero_orders {
        let corrected = engine.correct_zero_order_segments()?;
        println!("zero-order correction: {corrected} customers updated");
        return Ok(());
    }

    let data = engine.run()?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        print_summary(&data);
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn print_summary(data: &CustomerAnalyticsData) {
    println!("shopdesk analytics — run {}", data.run_id);
    println!("  customers:        {}", data.total_customers);
    println!(
        "  new/active:       {} / {}",
        data.new_customers, data.active_customers
    );
    println!(
        "  at-risk/lost:     {} / {}",
        data.at_risk_customers, data.lost_customers
    );
    println!("  avg order value:  {:.2}", data.average_order_value);
    println!("  estimated CLV:    {:.2}", data.estimated_clv);

    println!("  segments:");
    for slice in &data.segment_distribution {
        println!(
            "    {:<12} {:>5}  ({:.1}%)",
            slice.label, slice.count, slice.percentage
        );
    }

    println!("  cohorts:          {}", data.cohorts.len());
    println!(
        "  median gap:       {:.1} days (campaign days {:?})",
        data.purchase_frequency.median_days,
        data.purchase_frequency.recommended_campaign_days,
    );

    if let Some(pair) = data.product_affinity.frequently_bought_together.first() {
        println!(
            "  top pair:         {} + {} (lift {:.2})",
            pair.product1_name, pair.product2_name, pair.lift_score
        );
    }
    if let Some(day) = data.order_timing.best_days.first() {
        println!(
            "  busiest day:      {} ({} orders)",
            day.stats.label, day.stats.order_count
        );
    }
}

/// Small deterministic storefront snapshot for demos and smoke runs.
fn seed_demo_data(store: &AnalyticsStore) -> Result<()> {
    let now = Utc::now();

    let products = [
        ("p-100", "Espresso Beans 1kg"),
        ("p-101", "Espresso Tamper"),
        ("p-102", "Filter Papers 100pk"),
        ("p-103", "Ceramic Pour-Over Dripper"),
        ("p-104", "Milk Frothing Pitcher"),
        ("p-105", "Ceramic Mug Set"),
    ];
    for (product_id, name) in products {
        store.upsert_product(&Product {
            product_id: product_id.into(),
            name: name.into(),
        })?;
    }

    // (id, first, last, source, created days ago, order day-offsets, basket, spend per order)
    let seed: &[(&str, &str, &str, &str, i64, &[i64], &[&str], f64)] = &[
        ("c-001", "Ada", "Moreno", "referral", 400, &[365, 200, 90, 30, 8], &["p-100", "p-101"], 120.0),
        ("c-002", "Ben", "Okafor", "organic", 380, &[300, 150, 60, 12], &["p-100", "p-102"], 85.0),
        ("c-003", "Cleo", "Park", "ads", 360, &[340, 180, 95], &["p-103", "p-102"], 640.0),
        ("c-004", "Dora", "Silva", "organic", 300, &[280, 140, 70, 20, 5], &["p-100", "p-101"], 95.0),
        ("c-005", "Eli", "Novak", "ads", 250, &[240], &["p-104"], 45.0),
        ("c-006", "Fay", "Osei", "referral", 220, &[130, 100], &["p-100", "p-105"], 60.0),
        ("c-007", "Gus", "Ryan", "organic", 200, &[190], &["p-105"], 30.0),
        ("c-008", "Hana", "Ito", "organic", 150, &[110, 75, 40, 10], &["p-100", "p-102"], 150.0),
        ("c-009", "Ivan", "Reyes", "ads", 90, &[60, 25], &["p-103", "p-104"], 75.0),
        ("c-010", "June", "Wang", "referral", 45, &[], &[], 0.0),
        ("c-011", "Kofi", "Asante", "organic", 20, &[], &[], 0.0),
        ("c-012", "Lena", "Berg", "ads", 500, &[470, 420], &["p-101", "p-102"], 55.0),
    ];

    let mut order_seq = 0;
    for (id, first, last, source, created_days, order_days, basket, per_order) in seed {
        let order_dates: Vec<_> = order_days
            .iter()
            .map(|days_ago| now - Duration::days(*days_ago))
            .collect();
        let order_count = order_dates.len() as i64;
        let total_spent = per_order * order_count as f64;

        store.upsert_customer(&Customer {
            customer_id: id.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: Some(format!("{id}@example.com")),
            date_created: Some(now - Duration::days(*created_days)),
            first_order_date: order_dates.iter().min().copied(),
            last_order_date: order_dates.iter().max().copied(),
            total_spent,
            order_count,
            average_order_value: if order_count > 0 { *per_order } else { 0.0 },
            customer_segment: None,
            acquisition_source: Some(source.to_string()),
            notes: String::new(),
        })?;

        for date in &order_dates {
            order_seq += 1;
            let line_items: Vec<_> = basket
                .iter()
                .map(|product_id| {
                    json!({
                        "product_id": product_id,
                        "quantity": 1,
                        "total": format!("{:.2}", per_order / basket.len().max(1) as f64),
                    })
                })
                .collect();
            store.insert_order_raw(
                &format!("o-{order_seq:04}"),
                Some(*id),
                Some(&date.to_rfc3339()),
                Some(&format!("{per_order:.2}")),
                Some(&serde_json::to_string(&line_items)?),
            )?;
        }
    }

    Ok(())
}
