//! Input loader — pulls one full dataset and normalizes it.
//!
//! This is the only place where a failure is allowed to abort a run:
//! if the store cannot be read at all, no analysis can proceed.
//! Everything past this boundary recovers locally.

use crate::{
    error::{EngineError, EngineResult},
    model::{normalize_line_items, parse_amount_str, parse_date, Customer, Order, Product},
    store::{AnalyticsStore, OrderRow},
};

/// One freshly loaded, fully normalized dataset. Analyzers never see
/// raw rows and never re-parse shapes.
#[derive(Debug, Clone)]
pub struct AnalyticsDataset {
    pub customers: Vec<Customer>,
    pub orders:    Vec<Order>,
    pub products:  Vec<Product>,
}

pub fn load(store: &AnalyticsStore) -> EngineResult<AnalyticsDataset> {
    // A failure on the very first read means the store itself is
    // unusable (missing schema, locked file), not a bad row.
    let customers = store
        .all_customers()
        .map_err(|err| EngineError::StoreUnavailable(err.to_string()))?;
    let orders = store
        .all_order_rows()?
        .into_iter()
        .map(normalize_order)
        .collect::<Vec<_>>();
    let products = store.all_products()?;

    log::debug!(
        "loaded dataset: {} customers, {} orders, {} products",
        customers.len(),
        orders.len(),
        products.len(),
    );

    Ok(AnalyticsDataset { customers, orders, products })
}

fn normalize_order(row: OrderRow) -> Order {
    Order {
        date_created: row.date_created.as_deref().and_then(parse_date),
        total:        parse_amount_str(row.total.as_deref()),
        line_items:   normalize_line_items(row.line_items.as_deref()),
        customer_id:  row.customer_id,
        order_id:     row.order_id,
    }
}
