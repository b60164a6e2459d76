//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! Engine components call store methods — they never execute SQL directly.
//!
//! The customer/order/product tables are owned by the storefront sync
//! collaborator; this engine reads them and writes back exactly two
//! customer fields (`customer_segment`, `notes`) plus the append-only
//! `customer_rfm` snapshot log.

use crate::{
    error::EngineResult,
    model::{Customer, CustomerRfm, LifecycleSegment, Product, parse_date},
};
use rusqlite::{params, Connection};

/// A raw order row, exactly as the sync job stored it. The loader owns
/// normalization of `total` and `line_items`.
#[derive(Debug, Clone)]
pub struct OrderRow {
    pub order_id:     String,
    pub customer_id:  Option<String>,
    pub date_created: Option<String>,
    pub total:        Option<String>,
    pub line_items:   Option<String>,
}

pub struct AnalyticsStore {
    conn: Connection,
}

impl AnalyticsStore {
    /// Open (or create) the dashboard database at `path`.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: better concurrent read performance for the dashboard.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../migrations/002_rfm_snapshots.sql"))?;
        Ok(())
    }

    // ── Customers ──────────────────────────────────────────────

    pub fn upsert_customer(&self, c: &Customer) -> EngineResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO customer (
                customer_id, first_name, last_name, email, date_created,
                first_order_date, last_order_date, total_spent, order_count,
                average_order_value, customer_segment, acquisition_source, notes
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                c.customer_id,
                c.first_name,
                c.last_name,
                c.email,
                c.date_created.map(|d| d.to_rfc3339()),
                c.first_order_date.map(|d| d.to_rfc3339()),
                c.last_order_date.map(|d| d.to_rfc3339()),
                c.total_spent,
                c.order_count,
                c.average_order_value,
                c.customer_segment.map(|s| s.as_str()),
                c.acquisition_source,
                c.notes,
            ],
        )?;
        Ok(())
    }

    pub fn all_customers(&self) -> EngineResult<Vec<Customer>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, first_name, last_name, email, date_created,
                    first_order_date, last_order_date, total_spent, order_count,
                    average_order_value, customer_segment, acquisition_source, notes
             FROM customer ORDER BY customer_id ASC",
        )?;
        let customers = stmt
            .query_map([], |row| {
                Ok(Customer {
                    customer_id:         row.get(0)?,
                    first_name:          row.get(1)?,
                    last_name:           row.get(2)?,
                    email:               row.get(3)?,
                    date_created:        row.get::<_, Option<String>>(4)?.as_deref().and_then(parse_date),
                    first_order_date:    row.get::<_, Option<String>>(5)?.as_deref().and_then(parse_date),
                    last_order_date:     row.get::<_, Option<String>>(6)?.as_deref().and_then(parse_date),
                    total_spent:         row.get(7)?,
                    order_count:         row.get(8)?,
                    average_order_value: row.get(9)?,
                    customer_segment:    row
                        .get::<_, Option<String>>(10)?
                        .as_deref()
                        .and_then(LifecycleSegment::parse),
                    acquisition_source:  row.get(11)?,
                    notes:               row.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(customers)
    }

    pub fn customer(&self, customer_id: &str) -> EngineResult<Option<Customer>> {
        Ok(self
            .all_customers()?
            .into_iter()
            .find(|c| c.customer_id == customer_id))
    }

    /// Persist the classifier's verdict for one customer. The engine
    /// never touches any other customer column.
    pub fn update_customer_segment(
        &self,
        customer_id: &str,
        segment: LifecycleSegment,
        notes: &str,
    ) -> EngineResult<()> {
        self.conn.execute(
            "UPDATE customer SET customer_segment = ?2, notes = ?3 WHERE customer_id = ?1",
            params![customer_id, segment.as_str(), notes],
        )?;
        Ok(())
    }

    // ── Orders ─────────────────────────────────────────────────

    /// Insert an order exactly as the storefront API delivered it —
    /// `total` and `line_items` stay raw text until the loader runs.
    pub fn insert_order_raw(
        &self,
        order_id: &str,
        customer_id: Option<&str>,
        date_created: Option<&str>,
        total: Option<&str>,
        line_items: Option<&str>,
    ) -> EngineResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO shop_order
                (order_id, customer_id, date_created, total, line_items)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![order_id, customer_id, date_created, total, line_items],
        )?;
        Ok(())
    }

    pub fn all_order_rows(&self) -> EngineResult<Vec<OrderRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT order_id, customer_id, date_created, total, line_items
             FROM shop_order ORDER BY date_created ASC, order_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OrderRow {
                    order_id:     row.get(0)?,
                    customer_id:  row.get(1)?,
                    date_created: row.get(2)?,
                    total:        row.get(3)?,
                    line_items:   row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Products ───────────────────────────────────────────────

    pub fn upsert_product(&self, p: &Product) -> EngineResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO product (product_id, name) VALUES (?1, ?2)",
            params![p.product_id, p.name],
        )?;
        Ok(())
    }

    pub fn all_products(&self) -> EngineResult<Vec<Product>> {
        let mut stmt = self
            .conn
            .prepare("SELECT product_id, name FROM product ORDER BY product_id ASC")?;
        let products = stmt
            .query_map([], |row| {
                Ok(Product {
                    product_id: row.get(0)?,
                    name:       row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    // ── RFM snapshot log ───────────────────────────────────────

    /// Insert one batch of snapshot rows in a single transaction.
    /// Append-only: existing rows are never touched.
    pub fn insert_rfm_batch(&mut self, rows: &[CustomerRfm]) -> EngineResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO customer_rfm (
                    customer_id, recency_score, frequency_score, monetary_score,
                    rfm_score, rfm_segment, calculation_date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for r in rows {
                stmt.execute(params![
                    r.customer_id,
                    r.recency_score as i64,
                    r.frequency_score as i64,
                    r.monetary_score as i64,
                    r.rfm_score,
                    r.rfm_segment,
                    r.calculation_date.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// The authoritative snapshot: all rows from the most recent
    /// calculation run. Append-only log + max(calculation_date) read is
    /// what makes overlapping runs degrade to last-writer-wins.
    pub fn latest_rfm_snapshot(&self) -> EngineResult<Vec<CustomerRfm>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, recency_score, frequency_score, monetary_score,
                    rfm_score, rfm_segment, calculation_date
             FROM customer_rfm
             WHERE calculation_date = (SELECT MAX(calculation_date) FROM customer_rfm)
             ORDER BY customer_id ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(customer_id, r, f, m, score, segment, calc)| {
                let calculation_date = parse_date(&calc)?;
                Some(CustomerRfm {
                    customer_id,
                    recency_score: r as u8,
                    frequency_score: f as u8,
                    monetary_score: m as u8,
                    rfm_score: score,
                    rfm_segment: segment,
                    calculation_date,
                })
            })
            .collect())
    }

    /// Total snapshot rows across every calculation run (tests, tooling).
    pub fn rfm_row_count(&self) -> EngineResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM customer_rfm", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Distinct calculation runs present in the snapshot log.
    pub fn rfm_run_count(&self) -> EngineResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(DISTINCT calculation_date) FROM customer_rfm",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
