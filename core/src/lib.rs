//! shopdesk-core — the customer analytics engine behind the operations
//! dashboard.
//!
//! One synchronous batch pass per invocation: load → RFM score →
//! classify → analyze (cohorts, purchase frequency, product affinity,
//! order timing) → assemble a single [`engine::CustomerAnalyticsData`].
//! The CRUD dashboard, storefront sync, and UI live elsewhere; they feed
//! the tables this engine reads and consume the aggregate it returns.

pub mod affinity;
pub mod classifier;
pub mod cohort;
pub mod config;
pub mod engine;
pub mod error;
pub mod frequency;
pub mod loader;
pub mod model;
pub mod rfm;
pub mod store;
pub mod timing;
pub mod types;
