//! Shared primitive types used across the entire engine.

/// A stable storefront identifier (customers, orders, products).
pub type EntityId = String;

/// Identifier for one analytics pass. Used for log context only.
pub type RunId = String;

/// A whole number of days between two events.
pub type DayCount = i64;
