use chrono::{DateTime, TimeZone, Utc};
use shopdesk_core::{
    affinity::{self, Categorizer, FirstWordCategorizer},
    config::EngineConfig,
    model::{Customer, LifecycleSegment, LineItem, Order, Product},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn when() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 10, 0, 0).unwrap()
}

fn customer(id: &str, segment: LifecycleSegment) -> Customer {
    Customer {
        customer_id:         id.to_string(),
        first_name:          String::new(),
        last_name:           String::new(),
        email:               None,
        date_created:        Some(when()),
        first_order_date:    Some(when()),
        last_order_date:     Some(when()),
        total_spent:         100.0,
        order_count:         1,
        average_order_value: 100.0,
        customer_segment:    Some(segment),
        acquisition_source:  None,
        notes:               String::new(),
    }
}

fn order(id: &str, customer_id: &str, product_ids: &[&str]) -> Order {
    Order {
        order_id:     id.to_string(),
        customer_id:  Some(customer_id.to_string()),
        date_created: Some(when()),
        total:        50.0,
        line_items:   product_ids
            .iter()
            .map(|pid| LineItem {
                product_id: pid.to_string(),
                quantity:   1,
                total:      10.0,
            })
            .collect(),
    }
}

fn catalog() -> Vec<Product> {
    vec![
        Product { product_id: "A".into(), name: "Espresso Beans".into() },
        Product { product_id: "B".into(), name: "Espresso Tamper".into() },
        Product { product_id: "C".into(), name: "Ceramic Mug".into() },
    ]
}

fn analyze(customers: &[Customer], orders: &[Order]) -> affinity::ProductAffinityData {
    affinity::analyze(
        customers,
        orders,
        &catalog(),
        &EngineConfig::default(),
        &FirstWordCategorizer,
    )
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Two orders {A,B}, one order {A,C}. Pair (A,B) has
/// co-occurrence 2 and support 2/3; pair (A,C) sits below the strict ≥2
/// threshold and never appears.
#[test]
fn cooccurrence_threshold_is_strict() {
    let customers = vec![customer("c1", LifecycleSegment::Active)];
    let orders = vec![
        order("o1", "c1", &["A", "B"]),
        order("o2", "c1", &["A", "B"]),
        order("o3", "c1", &["A", "C"]),
    ];

    let data = analyze(&customers, &orders);
    assert_eq!(data.frequently_bought_together.len(), 1);

    let pair = &data.frequently_bought_together[0];
    assert_eq!((pair.product1_id.as_str(), pair.product2_id.as_str()), ("A", "B"));
    assert_eq!(pair.cooccurrence_count, 2);
    assert!((pair.support_percentage - 200.0 / 3.0).abs() < 1e-9);
    // Confidence reports the stronger direction: B→A is 2/2.
    assert!((pair.confidence_percentage - 100.0).abs() < 1e-9);
    // lift = support / (support_A * support_B) = (2/3) / (1 * 2/3) = 1.
    assert!((pair.lift_score - 1.0).abs() < 1e-9);
}

/// Duplicate line items for the same product count once per order, so a
/// product cannot pair with itself and counts stay per-order.
#[test]
fn duplicate_line_items_count_once_per_order() {
    let customers = vec![customer("c1", LifecycleSegment::Active)];
    let orders = vec![
        order("o1", "c1", &["A", "A", "B"]),
        order("o2", "c1", &["A", "B", "B"]),
    ];

    let data = analyze(&customers, &orders);
    assert_eq!(data.frequently_bought_together.len(), 1);
    let pair = &data.frequently_bought_together[0];
    assert_eq!(pair.cooccurrence_count, 2);
    // support_A = support_B = 1 → lift = 1/(1*1) = 1, finite and NaN-free.
    assert!((pair.lift_score - 1.0).abs() < 1e-9);
}

/// Per-segment cross-sell: top products ranked by the share of that
/// segment's orders containing them.
#[test]
fn cross_sell_scores_per_segment_order_share() {
    let customers = vec![
        customer("c1", LifecycleSegment::Loyal),
        customer("c2", LifecycleSegment::Loyal),
        customer("c3", LifecycleSegment::New),
    ];
    let orders = vec![
        order("o1", "c1", &["A", "B"]),
        order("o2", "c2", &["A"]),
        order("o3", "c3", &["C"]),
    ];

    let data = analyze(&customers, &orders);
    let loyal = data
        .cross_sell
        .iter()
        .find(|s| s.segment == LifecycleSegment::Loyal)
        .unwrap();

    assert_eq!(loyal.recommendations[0].product_id, "A");
    assert_eq!(loyal.recommendations[0].order_count, 2);
    assert!((loyal.recommendations[0].score - 100.0).abs() < 1e-9);
    assert!((loyal.recommendations[1].score - 50.0).abs() < 1e-9);

    let new = data
        .cross_sell
        .iter()
        .find(|s| s.segment == LifecycleSegment::New)
        .unwrap();
    assert_eq!(new.recommendations.len(), 1);
    assert_eq!(new.recommendations[0].product_id, "C");
}

/// Category preference uses the first word of the product name,
/// lowercased, and shares are per line item.
#[test]
fn category_preference_uses_first_word_proxy() {
    assert_eq!(FirstWordCategorizer.category("Espresso Beans 1kg"), "espresso");
    assert_eq!(FirstWordCategorizer.category(""), "uncategorized");

    let customers = vec![customer("c1", LifecycleSegment::Active)];
    let orders = vec![
        order("o1", "c1", &["A", "B"]), // espresso ×2
        order("o2", "c1", &["C"]),      // ceramic ×1
    ];

    let data = analyze(&customers, &orders);
    let active = data
        .category_preferences
        .iter()
        .find(|s| s.segment == LifecycleSegment::Active)
        .unwrap();

    assert_eq!(active.categories[0].category, "espresso");
    assert_eq!(active.categories[0].line_item_count, 2);
    assert!((active.categories[0].share_percentage - 200.0 / 3.0).abs() < 1e-9);
    assert_eq!(active.categories[1].category, "ceramic");
}

/// Empty inputs — no orders, or no products — yield empty outputs for
/// all three reports, never an error.
#[test]
fn empty_inputs_yield_empty_outputs() {
    let customers = vec![customer("c1", LifecycleSegment::Active)];

    let no_orders = analyze(&customers, &[]);
    assert!(no_orders.frequently_bought_together.is_empty());
    assert!(no_orders.cross_sell.is_empty());
    assert!(no_orders.category_preferences.is_empty());

    let no_products = affinity::analyze(
        &customers,
        &[order("o1", "c1", &["A", "B"])],
        &[],
        &EngineConfig::default(),
        &FirstWordCategorizer,
    );
    assert!(no_products.frequently_bought_together.is_empty());
    assert!(no_products.cross_sell.is_empty());
    assert!(no_products.category_preferences.is_empty());
}
