//! Domain records and the load-boundary normalization helpers.
//!
//! RULE: storefront payloads are messy — order totals arrive as decimal
//! strings or numbers, `line_items` as a native JSON array or a
//! JSON-encoded string of one. Normalization happens HERE, once, at the
//! load boundary. Analyzers always see typed, guaranteed values and
//! never re-check shapes.

use crate::types::{DayCount, EntityId};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Lifecycle segments ───────────────────────────────────────────────────────

/// The fixed set of lifecycle labels the classifier may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleSegment {
    New,
    Active,
    AtRisk,
    Lost,
    Loyal,
    Vip,
    HighValue,
    OneTime,
    Occasional,
    Dormant,
}

impl LifecycleSegment {
    pub const ALL: [LifecycleSegment; 10] = [
        LifecycleSegment::New,
        LifecycleSegment::Active,
        LifecycleSegment::AtRisk,
        LifecycleSegment::Lost,
        LifecycleSegment::Loyal,
        LifecycleSegment::Vip,
        LifecycleSegment::HighValue,
        LifecycleSegment::OneTime,
        LifecycleSegment::Occasional,
        LifecycleSegment::Dormant,
    ];

    /// Stable wire/database form.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleSegment::New        => "new",
            LifecycleSegment::Active     => "active",
            LifecycleSegment::AtRisk     => "at-risk",
            LifecycleSegment::Lost       => "lost",
            LifecycleSegment::Loyal      => "loyal",
            LifecycleSegment::Vip        => "vip",
            LifecycleSegment::HighValue  => "high-value",
            LifecycleSegment::OneTime    => "one-time",
            LifecycleSegment::Occasional => "occasional",
            LifecycleSegment::Dormant    => "dormant",
        }
    }

    pub fn parse(s: &str) -> Option<LifecycleSegment> {
        LifecycleSegment::ALL.iter().copied().find(|seg| seg.as_str() == s)
    }

    /// Human label used in dashboard charts.
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleSegment::New        => "New",
            LifecycleSegment::Active     => "Active",
            LifecycleSegment::AtRisk     => "At Risk",
            LifecycleSegment::Lost       => "Lost",
            LifecycleSegment::Loyal      => "Loyal",
            LifecycleSegment::Vip        => "VIP",
            LifecycleSegment::HighValue  => "High Value",
            LifecycleSegment::OneTime    => "One-Time",
            LifecycleSegment::Occasional => "Occasional",
            LifecycleSegment::Dormant    => "Dormant",
        }
    }

    /// Fixed chart color per segment.
    pub fn color(&self) -> &'static str {
        match self {
            LifecycleSegment::New        => "#22c55e",
            LifecycleSegment::Active     => "#3b82f6",
            LifecycleSegment::AtRisk     => "#f59e0b",
            LifecycleSegment::Lost       => "#6b7280",
            LifecycleSegment::Loyal      => "#8b5cf6",
            LifecycleSegment::Vip        => "#eab308",
            LifecycleSegment::HighValue  => "#14b8a6",
            LifecycleSegment::OneTime    => "#f97316",
            LifecycleSegment::Occasional => "#0ea5e9",
            LifecycleSegment::Dormant    => "#64748b",
        }
    }
}

// ── Records ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id:         EntityId,
    pub first_name:          String,
    pub last_name:           String,
    pub email:               Option<String>,
    pub date_created:        Option<DateTime<Utc>>,
    pub first_order_date:    Option<DateTime<Utc>>,
    pub last_order_date:     Option<DateTime<Utc>>,
    pub total_spent:         f64,
    pub order_count:         i64,
    pub average_order_value: f64,
    pub customer_segment:    Option<LifecycleSegment>,
    pub acquisition_source:  Option<String>,
    pub notes:               String,
}

impl Customer {
    /// Full days elapsed between the last order and `now`.
    pub fn days_since_last_order(&self, now: DateTime<Utc>) -> Option<DayCount> {
        self.last_order_date.map(|d| (now - d).num_days())
    }

    pub fn days_since_created(&self, now: DateTime<Utc>) -> Option<DayCount> {
        self.date_created.map(|d| (now - d).num_days())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: EntityId,
    pub quantity:   i64,
    pub total:      f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id:     EntityId,
    pub customer_id:  Option<EntityId>,
    pub date_created: Option<DateTime<Utc>>,
    pub total:        f64,
    pub line_items:   Vec<LineItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub product_id: EntityId,
    pub name:       String,
}

/// One row of the append-only RFM snapshot log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRfm {
    pub customer_id:      EntityId,
    pub recency_score:    u8,
    pub frequency_score:  u8,
    pub monetary_score:   u8,
    pub rfm_score:        i64,
    pub rfm_segment:      String,
    pub calculation_date: DateTime<Utc>,
}

// ── Normalization ────────────────────────────────────────────────────────────

/// Parse a storefront date string. Accepts RFC 3339, the storefront's
/// un-zoned `YYYY-MM-DDTHH:MM:SS` form, a space-separated variant, and
/// bare dates (treated as midnight UTC). Anything else is `None`.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// Parse a monetary amount that may be a JSON number or a decimal string.
/// Unparsable values collapse to 0.0 — a data-shape error never aborts a run.
pub fn parse_amount(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or_else(|_| {
            if !s.trim().is_empty() {
                log::warn!("unparsable amount {s:?}, substituting 0");
            }
            0.0
        }),
        _ => 0.0,
    }
}

/// Defensive string-to-amount parse for raw database columns.
pub fn parse_amount_str(raw: Option<&str>) -> f64 {
    match raw {
        Some(s) => parse_amount(&Value::String(s.to_string())),
        None => 0.0,
    }
}

/// Normalize a raw `line_items` column into a typed vec.
///
/// The column may hold a JSON array, a JSON-encoded STRING containing an
/// array (double encoding from the sync job), or garbage. Garbage and
/// non-array shapes yield an empty vec — never an error — so the owning
/// order still counts for revenue and timing aggregation.
pub fn normalize_line_items(raw: Option<&str>) -> Vec<LineItem> {
    let text = match raw {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Vec::new(),
    };

    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(err) => {
            log::warn!("unparsable line_items ({err}), substituting empty list");
            return Vec::new();
        }
    };

    // Double-encoded: the array itself arrived as a JSON string.
    let value = match value {
        Value::String(inner) => match serde_json::from_str(&inner) {
            Ok(v) => v,
            Err(err) => {
                log::warn!("unparsable nested line_items ({err}), substituting empty list");
                return Vec::new();
            }
        },
        other => other,
    };

    let items = match value {
        Value::Array(items) => items,
        other => {
            log::warn!("line_items is not an array (got {other}), substituting empty list");
            return Vec::new();
        }
    };

    items.iter().filter_map(line_item_from_value).collect()
}

/// A single line item; ids may arrive numeric, amounts as strings.
/// Items without any product id are dropped.
fn line_item_from_value(value: &Value) -> Option<LineItem> {
    let obj = value.as_object()?;

    let product_id = match obj.get("product_id") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return None,
    };

    let quantity = match obj.get("quantity") {
        Some(Value::Number(n)) => n.as_i64().unwrap_or(1),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(1),
        _ => 1,
    };

    let total = obj.get("total").map(parse_amount).unwrap_or(0.0);

    Some(LineItem { product_id, quantity, total })
}
