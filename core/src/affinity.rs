//! Product-affinity analyzer — market-basket statistics.
//!
//! This module:
//!   1. Counts unordered product-pair co-occurrence across orders
//!   2. Derives support / confidence / lift per qualifying pair
//!   3. Ranks per-segment cross-sell products
//!   4. Ranks per-segment category shares via a pluggable Categorizer
//!
//! Pairs seen together in fewer than `min_pair_cooccurrence` orders never
//! appear in the report. Empty inputs yield empty outputs, never errors.

use crate::{
    config::EngineConfig,
    model::{Customer, LifecycleSegment, Order, Product},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

// ── Categorization ───────────────────────────────────────────────────────────

/// Maps a product name onto a category label. The storefront has no real
/// taxonomy, so the default is a crude first-word proxy; swapping in a
/// real classification is a one-impl change.
pub trait Categorizer {
    fn category(&self, product_name: &str) -> String;
}

/// First word of the product name, lowercased.
pub struct FirstWordCategorizer;

impl Categorizer for FirstWordCategorizer {
    fn category(&self, product_name: &str) -> String {
        product_name
            .split_whitespace()
            .next()
            .unwrap_or("uncategorized")
            .to_lowercase()
    }
}

// ── Output types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPair {
    pub product1_id:           String,
    pub product2_id:           String,
    pub product1_name:         String,
    pub product2_name:         String,
    pub cooccurrence_count:    i64,
    pub support_percentage:    f64,
    /// The stronger of the two conditional directions.
    pub confidence_percentage: f64,
    pub lift_score:            f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossSellItem {
    pub product_id:   String,
    pub product_name: String,
    pub order_count:  i64,
    /// Share of the segment's orders containing this product, 0–100.
    pub score:        f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentCrossSell {
    pub segment:         LifecycleSegment,
    pub recommendations: Vec<CrossSellItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category:         String,
    pub line_item_count:  i64,
    pub share_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentCategoryPreference {
    pub segment:    LifecycleSegment,
    pub categories: Vec<CategoryShare>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductAffinityData {
    pub frequently_bought_together: Vec<ProductPair>,
    pub cross_sell:                 Vec<SegmentCrossSell>,
    pub category_preferences:       Vec<SegmentCategoryPreference>,
}

// ── Analysis ─────────────────────────────────────────────────────────────────

pub fn analyze(
    customers: &[Customer],
    orders: &[Order],
    products: &[Product],
    config: &EngineConfig,
    categorizer: &dyn Categorizer,
) -> ProductAffinityData {
    if orders.is_empty() || products.is_empty() {
        return ProductAffinityData::default();
    }

    let names: HashMap<&str, &str> = products
        .iter()
        .map(|p| (p.product_id.as_str(), p.name.as_str()))
        .collect();

    ProductAffinityData {
        frequently_bought_together: frequently_bought_together(orders, &names, config),
        cross_sell:                 cross_sell(customers, orders, &names, config),
        category_preferences:       category_preferences(customers, orders, &names, config, categorizer),
    }
}

fn frequently_bought_together(
    orders: &[Order],
    names: &HashMap<&str, &str>,
    config: &EngineConfig,
) -> Vec<ProductPair> {
    let total_orders = orders.len() as f64;
    let mut pair_counts: HashMap<(String, String), i64> = HashMap::new();
    let mut product_counts: HashMap<&str, i64> = HashMap::new();

    for order in orders {
        // Distinct ids; BTreeSet gives each unordered pair a canonical
        // (low, high) orientation.
        let distinct: BTreeSet<&str> =
            order.line_items.iter().map(|li| li.product_id.as_str()).collect();

        for id in &distinct {
            *product_counts.entry(*id).or_insert(0) += 1;
        }
        let ids: Vec<&str> = distinct.into_iter().collect();
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                *pair_counts
                    .entry((ids[i].to_string(), ids[j].to_string()))
                    .or_insert(0) += 1;
            }
        }
    }

    let mut pairs: Vec<ProductPair> = pair_counts
        .into_iter()
        .filter(|(_, count)| *count >= config.min_pair_cooccurrence)
        .map(|((id1, id2), count)| {
            let count1 = product_counts.get(id1.as_str()).copied().unwrap_or(0);
            let count2 = product_counts.get(id2.as_str()).copied().unwrap_or(0);

            let support = count as f64 / total_orders;
            let confidence = if count1 > 0 && count2 > 0 {
                (count as f64 / count1 as f64).max(count as f64 / count2 as f64)
            } else {
                0.0
            };
            let lift = lift_score(
                support,
                count1 as f64 / total_orders,
                count2 as f64 / total_orders,
            );

            ProductPair {
                product1_name: lookup_name(names, &id1),
                product2_name: lookup_name(names, &id2),
                product1_id: id1,
                product2_id: id2,
                cooccurrence_count: count,
                support_percentage: support * 100.0,
                confidence_percentage: confidence * 100.0,
                lift_score: lift,
            }
        })
        .collect();

    pairs.sort_by(|a, b| {
        b.lift_score
            .total_cmp(&a.lift_score)
            .then_with(|| a.product1_id.cmp(&b.product1_id))
            .then_with(|| a.product2_id.cmp(&b.product2_id))
    });
    pairs.truncate(config.top_pair_limit);
    pairs
}

/// A zero individual support yields lift 0 instead of dividing by zero.
/// The counting above never produces one for a qualifying pair, so this
/// only matters for hand-fed inputs.
fn lift_score(support: f64, support1: f64, support2: f64) -> f64 {
    if support1 > 0.0 && support2 > 0.0 {
        support / (support1 * support2)
    } else {
        0.0
    }
}

fn cross_sell(
    customers: &[Customer],
    orders: &[Order],
    names: &HashMap<&str, &str>,
    config: &EngineConfig,
) -> Vec<SegmentCrossSell> {
    let segment_of = segment_lookup(customers);

    let mut order_counts: HashMap<LifecycleSegment, i64> = HashMap::new();
    let mut product_counts: HashMap<LifecycleSegment, HashMap<&str, i64>> = HashMap::new();

    for order in orders {
        let Some(segment) = order
            .customer_id
            .as_deref()
            .and_then(|id| segment_of.get(id).copied())
        else {
            continue;
        };
        *order_counts.entry(segment).or_insert(0) += 1;

        let distinct: BTreeSet<&str> =
            order.line_items.iter().map(|li| li.product_id.as_str()).collect();
        let per_product = product_counts.entry(segment).or_default();
        for id in distinct {
            *per_product.entry(id).or_insert(0) += 1;
        }
    }

    LifecycleSegment::ALL
        .iter()
        .filter_map(|&segment| {
            let segment_orders = *order_counts.get(&segment)?;
            let per_product = product_counts.get(&segment)?;

            let mut items: Vec<CrossSellItem> = per_product
                .iter()
                .map(|(id, count)| CrossSellItem {
                    product_id:   id.to_string(),
                    product_name: lookup_name(names, id),
                    order_count:  *count,
                    score:        *count as f64 / segment_orders as f64 * 100.0,
                })
                .collect();
            items.sort_by(|a, b| {
                b.order_count
                    .cmp(&a.order_count)
                    .then_with(|| a.product_id.cmp(&b.product_id))
            });
            items.truncate(config.cross_sell_limit);

            Some(SegmentCrossSell { segment, recommendations: items })
        })
        .collect()
}

fn category_preferences(
    customers: &[Customer],
    orders: &[Order],
    names: &HashMap<&str, &str>,
    config: &EngineConfig,
    categorizer: &dyn Categorizer,
) -> Vec<SegmentCategoryPreference> {
    let segment_of = segment_lookup(customers);

    let mut line_totals: HashMap<LifecycleSegment, i64> = HashMap::new();
    let mut category_counts: HashMap<LifecycleSegment, HashMap<String, i64>> = HashMap::new();

    for order in orders {
        let Some(segment) = order
            .customer_id
            .as_deref()
            .and_then(|id| segment_of.get(id).copied())
        else {
            continue;
        };
        for item in &order.line_items {
            let category = categorizer.category(&lookup_name(names, &item.product_id));
            *line_totals.entry(segment).or_insert(0) += 1;
            *category_counts
                .entry(segment)
                .or_default()
                .entry(category)
                .or_insert(0) += 1;
        }
    }

    LifecycleSegment::ALL
        .iter()
        .filter_map(|&segment| {
            let total = *line_totals.get(&segment)?;
            let per_category = category_counts.get(&segment)?;

            let mut categories: Vec<CategoryShare> = per_category
                .iter()
                .map(|(category, count)| CategoryShare {
                    category:         category.clone(),
                    line_item_count:  *count,
                    share_percentage: *count as f64 / total as f64 * 100.0,
                })
                .collect();
            categories.sort_by(|a, b| {
                b.line_item_count
                    .cmp(&a.line_item_count)
                    .then_with(|| a.category.cmp(&b.category))
            });
            categories.truncate(config.category_limit);

            Some(SegmentCategoryPreference { segment, categories })
        })
        .collect()
}

fn segment_lookup(customers: &[Customer]) -> HashMap<&str, LifecycleSegment> {
    customers
        .iter()
        .filter_map(|c| c.customer_segment.map(|s| (c.customer_id.as_str(), s)))
        .collect()
}

/// Product name, falling back to the raw id for products the sync has
/// not delivered yet.
fn lookup_name(names: &HashMap<&str, &str>, product_id: &str) -> String {
    names.get(product_id).unwrap_or(&product_id).to_string()
}
